//! Wire transaction decoding and encoding.
//!
//! A serialized transaction starts with a 32-bit version word whose upper 16
//! bits carry the serialization type. The prefix (inputs without witness
//! data, outputs, lock time, expiry) is followed, for full serializations, by
//! one witness record per input.

use serde::{Deserialize, Serialize};

use crate::error::TxDecodeError;
use crate::hash::{ChainHash, HASH_SIZE};

/// Smallest possible serialized prefix input: outpoint (32 + 4 + 1) + sequence.
const MIN_TX_IN_PREFIX_SIZE: usize = HASH_SIZE + 4 + 1 + 4;
/// Smallest possible serialized output: value + script version + empty script.
const MIN_TX_OUT_SIZE: usize = 8 + 2 + 1;
/// Smallest possible witness record: value + height + index + empty script.
const MIN_TX_IN_WITNESS_SIZE: usize = 8 + 4 + 4 + 1;

/// How much of the transaction a serialization carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxSerializeType {
    Full,
    NoWitness,
    OnlyWitness,
}

impl TxSerializeType {
    fn from_u16(v: u16) -> Result<Self, TxDecodeError> {
        match v {
            0 => Ok(Self::Full),
            1 => Ok(Self::NoWitness),
            2 => Ok(Self::OnlyWitness),
            other => Err(TxDecodeError::UnsupportedSerType(other)),
        }
    }

    fn as_u16(self) -> u16 {
        match self {
            Self::Full => 0,
            Self::NoWitness => 1,
            Self::OnlyWitness => 2,
        }
    }
}

/// Reference to a previous transaction output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: ChainHash,
    pub index: u32,
    pub tree: i8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub previous_out_point: OutPoint,
    pub sequence: u32,
    // Witness fields; zero/empty when decoded from a prefix-only encoding.
    pub value_in: i64,
    pub block_height: u32,
    pub block_index: u32,
    pub signature_script: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: i64,
    pub version: u16,
    pub pk_script: Vec<u8>,
}

/// A decoded transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgTx {
    pub ser_type: TxSerializeType,
    pub version: u16,
    pub tx_in: Vec<TxIn>,
    pub tx_out: Vec<TxOut>,
    pub lock_time: u32,
    pub expiry: u32,
}

impl MsgTx {
    /// Decode a transaction from the hex string returned by `gettransaction`.
    pub fn from_hex(s: &str) -> Result<Self, TxDecodeError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TxDecodeError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Decode a full or prefix-only serialization. Trailing bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxDecodeError> {
        let mut r = Reader::new(bytes);
        let word = r.u32("version")?;
        let version = (word & 0xffff) as u16;
        let ser_type = TxSerializeType::from_u16((word >> 16) as u16)?;
        if ser_type == TxSerializeType::OnlyWitness {
            return Err(TxDecodeError::UnsupportedSerType(ser_type.as_u16()));
        }

        let in_count = r.count("inputs", MIN_TX_IN_PREFIX_SIZE)?;
        let mut tx_in = Vec::with_capacity(in_count);
        for _ in 0..in_count {
            let mut hash = [0u8; HASH_SIZE];
            hash.copy_from_slice(r.take(HASH_SIZE, "outpoint hash")?);
            let index = r.u32("outpoint index")?;
            let tree = r.u8("outpoint tree")? as i8;
            let sequence = r.u32("sequence")?;
            tx_in.push(TxIn {
                previous_out_point: OutPoint {
                    hash: ChainHash::new(hash),
                    index,
                    tree,
                },
                sequence,
                value_in: 0,
                block_height: 0,
                block_index: 0,
                signature_script: Vec::new(),
            });
        }

        let out_count = r.count("outputs", MIN_TX_OUT_SIZE)?;
        let mut tx_out = Vec::with_capacity(out_count);
        for _ in 0..out_count {
            let value = r.u64("output value")? as i64;
            let version = r.u16("script version")?;
            let pk_script = r.var_bytes("pk script")?;
            tx_out.push(TxOut {
                value,
                version,
                pk_script,
            });
        }

        let lock_time = r.u32("lock time")?;
        let expiry = r.u32("expiry")?;

        if ser_type == TxSerializeType::Full {
            let witness_count = r.count("witnesses", MIN_TX_IN_WITNESS_SIZE)?;
            if witness_count != tx_in.len() {
                return Err(TxDecodeError::WitnessMismatch {
                    witness: witness_count as u64,
                    inputs: tx_in.len() as u64,
                });
            }
            for input in tx_in.iter_mut() {
                input.value_in = r.u64("value in")? as i64;
                input.block_height = r.u32("block height")?;
                input.block_index = r.u32("block index")?;
                input.signature_script = r.var_bytes("signature script")?;
            }
        }

        if r.remaining() != 0 {
            return Err(TxDecodeError::TrailingBytes(r.remaining()));
        }

        Ok(Self {
            ser_type,
            version,
            tx_in,
            tx_out,
            lock_time,
            expiry,
        })
    }

    /// Encode using the transaction's serialization type.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Vec::new();
        let word = (self.version as u32) | ((self.ser_type.as_u16() as u32) << 16);
        w.extend_from_slice(&word.to_le_bytes());

        write_var_int(&mut w, self.tx_in.len() as u64);
        for input in &self.tx_in {
            w.extend_from_slice(input.previous_out_point.hash.as_bytes());
            w.extend_from_slice(&input.previous_out_point.index.to_le_bytes());
            w.push(input.previous_out_point.tree as u8);
            w.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_var_int(&mut w, self.tx_out.len() as u64);
        for output in &self.tx_out {
            w.extend_from_slice(&output.value.to_le_bytes());
            w.extend_from_slice(&output.version.to_le_bytes());
            write_var_bytes(&mut w, &output.pk_script);
        }

        w.extend_from_slice(&self.lock_time.to_le_bytes());
        w.extend_from_slice(&self.expiry.to_le_bytes());

        if self.ser_type == TxSerializeType::Full {
            write_var_int(&mut w, self.tx_in.len() as u64);
            for input in &self.tx_in {
                w.extend_from_slice(&input.value_in.to_le_bytes());
                w.extend_from_slice(&input.block_height.to_le_bytes());
                w.extend_from_slice(&input.block_index.to_le_bytes());
                write_var_bytes(&mut w, &input.signature_script);
            }
        }
        w
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], TxDecodeError> {
        if self.remaining() < n {
            return Err(TxDecodeError::UnexpectedEof(what));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, TxDecodeError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, TxDecodeError> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, TxDecodeError> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, TxDecodeError> {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(self.take(8, what)?);
        Ok(u64::from_le_bytes(arr))
    }

    fn var_int(&mut self, what: &'static str) -> Result<u64, TxDecodeError> {
        let (value, min) = match self.u8(what)? {
            0xfd => (self.u16(what)? as u64, 0xfd),
            0xfe => (self.u32(what)? as u64, 0x1_0000),
            0xff => (self.u64(what)?, 0x1_0000_0000),
            b => return Ok(b as u64),
        };
        if value < min {
            return Err(TxDecodeError::NonCanonicalVarInt);
        }
        Ok(value)
    }

    /// Read an element count, bounded by how many minimum-size elements the
    /// remaining buffer could possibly hold.
    fn count(&mut self, field: &'static str, min_size: usize) -> Result<usize, TxDecodeError> {
        let count = self.var_int(field)?;
        let max = (self.remaining() / min_size) as u64;
        if count > max {
            return Err(TxDecodeError::TooMany { field, count, max });
        }
        Ok(count as usize)
    }

    fn var_bytes(&mut self, what: &'static str) -> Result<Vec<u8>, TxDecodeError> {
        let len = self.var_int(what)?;
        if len > self.remaining() as u64 {
            return Err(TxDecodeError::UnexpectedEof(what));
        }
        Ok(self.take(len as usize, what)?.to_vec())
    }
}

fn write_var_int(w: &mut Vec<u8>, v: u64) {
    if v < 0xfd {
        w.push(v as u8);
    } else if v <= 0xffff {
        w.push(0xfd);
        w.extend_from_slice(&(v as u16).to_le_bytes());
    } else if v <= 0xffff_ffff {
        w.push(0xfe);
        w.extend_from_slice(&(v as u32).to_le_bytes());
    } else {
        w.push(0xff);
        w.extend_from_slice(&v.to_le_bytes());
    }
}

fn write_var_bytes(w: &mut Vec<u8>, bytes: &[u8]) {
    write_var_int(w, bytes.len() as u64);
    w.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> MsgTx {
        MsgTx {
            ser_type: TxSerializeType::Full,
            version: 1,
            tx_in: vec![TxIn {
                previous_out_point: OutPoint {
                    hash: ChainHash::new([7u8; 32]),
                    index: 2,
                    tree: 0,
                },
                sequence: u32::MAX,
                value_in: 150_000_000,
                block_height: 90,
                block_index: 3,
                signature_script: vec![0x51; 4],
            }],
            tx_out: vec![
                TxOut {
                    value: 140_000_000,
                    version: 0,
                    pk_script: vec![0xba, 0x76, 0xa9],
                },
                TxOut {
                    value: 0,
                    version: 0,
                    pk_script: vec![0x6a; 32],
                },
            ],
            lock_time: 0,
            expiry: 120,
        }
    }

    #[test]
    fn full_encoding_decodes_to_same_transaction() {
        let tx = sample_tx();
        let decoded = MsgTx::from_hex(&tx.to_hex()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn prefix_only_encoding_has_no_witness() {
        let mut tx = sample_tx();
        tx.ser_type = TxSerializeType::NoWitness;
        let decoded = MsgTx::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(decoded.ser_type, TxSerializeType::NoWitness);
        assert_eq!(decoded.tx_in[0].value_in, 0);
        assert!(decoded.tx_in[0].signature_script.is_empty());
        assert_eq!(decoded.tx_out, tx.tx_out);
    }

    #[test]
    fn version_word_carries_ser_type() {
        let mut tx = sample_tx();
        tx.ser_type = TxSerializeType::NoWitness;
        let bytes = tx.to_bytes();
        assert_eq!(&bytes[..4], &[1, 0, 1, 0]);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = sample_tx().to_bytes();
        let err = MsgTx::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, TxDecodeError::UnexpectedEof(_)));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = sample_tx().to_bytes();
        bytes.push(0);
        assert_eq!(
            MsgTx::from_bytes(&bytes).unwrap_err(),
            TxDecodeError::TrailingBytes(1)
        );
    }

    #[test]
    fn absurd_counts_are_rejected() {
        // version 1, full serialization, then an input count of 0xffff
        let bytes = [1, 0, 0, 0, 0xfd, 0xff, 0xff];
        assert!(matches!(
            MsgTx::from_bytes(&bytes),
            Err(TxDecodeError::TooMany { field: "inputs", .. })
        ));
    }

    #[test]
    fn non_canonical_varint_is_rejected() {
        let bytes = [1, 0, 0, 0, 0xfd, 0x01, 0x00];
        assert_eq!(
            MsgTx::from_bytes(&bytes),
            Err(TxDecodeError::NonCanonicalVarInt)
        );
    }

    #[test]
    fn bad_hex_is_rejected() {
        assert!(matches!(
            MsgTx::from_hex("not hex"),
            Err(TxDecodeError::InvalidHex(_))
        ));
    }

    #[test]
    fn witness_only_is_unsupported() {
        let bytes = [1, 0, 2, 0];
        assert_eq!(
            MsgTx::from_bytes(&bytes),
            Err(TxDecodeError::UnsupportedSerType(2))
        );
    }
}
