//! Chain hash type for transactions and blocks.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::HashParseError;

/// Size of a chain hash in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte double-BLAKE hash identifying a transaction or block.
///
/// The string form is the byte-reversed hex encoding used by the node and
/// wallet RPC interfaces, so `Display` and `FromStr` reverse the bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainHash([u8; HASH_SIZE]);

impl ChainHash {
    pub const ZERO: Self = Self([0u8; HASH_SIZE]);

    pub fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw bytes in internal (little-endian) order.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_SIZE]
    }
}

impl FromStr for ChainHash {
    type Err = HashParseError;

    /// Parse a byte-reversed hex string. Short strings are left-padded with
    /// zeros, matching how the RPC servers accept abbreviated hashes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > HASH_SIZE * 2 {
            return Err(HashParseError::TooLong(s.len()));
        }
        let padded = if s.len() % 2 == 1 {
            format!("0{s}")
        } else {
            s.to_string()
        };
        let decoded =
            hex::decode(&padded).map_err(|e| HashParseError::InvalidHex(e.to_string()))?;

        let mut bytes = [0u8; HASH_SIZE];
        for (i, b) in decoded.iter().rev().enumerate() {
            bytes[i] = *b;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter().rev() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainHash({self})")
    }
}

impl Serialize for ChainHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChainHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
