//! Parse and decode errors for the fundamental types.

use thiserror::Error;

/// Failure to parse a [`crate::ChainHash`] from its string form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashParseError {
    #[error("hash string is {0} characters, want at most 64")]
    TooLong(usize),

    #[error("invalid hex in hash string: {0}")]
    InvalidHex(String),
}

/// Failure to decode a wire transaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxDecodeError {
    #[error("invalid transaction hex: {0}")]
    InvalidHex(String),

    #[error("unexpected end of data reading {0}")]
    UnexpectedEof(&'static str),

    #[error("unsupported serialization type {0}")]
    UnsupportedSerType(u16),

    #[error("{field} count {count} exceeds maximum {max}")]
    TooMany {
        field: &'static str,
        count: u64,
        max: u64,
    },

    #[error("non-canonical varint encoding")]
    NonCanonicalVarInt,

    #[error("witness count {witness} does not match input count {inputs}")]
    WitnessMismatch { witness: u64, inputs: u64 },

    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),
}
