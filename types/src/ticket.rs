//! Ticket commitment outputs.
//!
//! Every odd-indexed output of a ticket purchase is a null-data commitment:
//! `OP_RETURN OP_DATA_30 <hash160:20> <amount:8> <fee limits:2>`. The most
//! significant bit of the amount flags a pay-to-script-hash commitment.

use serde::{Deserialize, Serialize};

const OP_RETURN: u8 = 0x6a;
const OP_DATA_30: u8 = 0x1e;
const COMMITMENT_SCRIPT_LEN: usize = 32;
const P2SH_FLAG: u64 = 1 << 63;

/// A parsed ticket commitment output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCommitment {
    pub hash160: [u8; 20],
    pub amount: i64,
    pub is_p2sh: bool,
    pub fee_limits: u16,
}

impl TicketCommitment {
    /// Parse a commitment script. Returns `None` for anything that is not a
    /// well-formed commitment.
    pub fn from_pk_script(script: &[u8]) -> Option<Self> {
        if script.len() != COMMITMENT_SCRIPT_LEN || script[0] != OP_RETURN || script[1] != OP_DATA_30
        {
            return None;
        }
        let mut hash160 = [0u8; 20];
        hash160.copy_from_slice(&script[2..22]);

        let mut amount_bytes = [0u8; 8];
        amount_bytes.copy_from_slice(&script[22..30]);
        let raw = u64::from_le_bytes(amount_bytes);

        Some(Self {
            hash160,
            amount: (raw & !P2SH_FLAG) as i64,
            is_p2sh: raw & P2SH_FLAG != 0,
            fee_limits: u16::from_le_bytes([script[30], script[31]]),
        })
    }

    /// Build the script for this commitment.
    pub fn to_pk_script(&self) -> Vec<u8> {
        let mut raw = self.amount as u64 & !P2SH_FLAG;
        if self.is_p2sh {
            raw |= P2SH_FLAG;
        }
        let mut script = Vec::with_capacity(COMMITMENT_SCRIPT_LEN);
        script.push(OP_RETURN);
        script.push(OP_DATA_30);
        script.extend_from_slice(&self.hash160);
        script.extend_from_slice(&raw.to_le_bytes());
        script.extend_from_slice(&self.fee_limits.to_le_bytes());
        script
    }

    /// Hex form of the committed key hash.
    pub fn hash160_hex(&self) -> String {
        hex::encode(self.hash160)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_p2sh_flag_out_of_amount() {
        let commitment = TicketCommitment {
            hash160: [9u8; 20],
            amount: 5_000_000,
            is_p2sh: true,
            fee_limits: 0x5800,
        };
        let script = commitment.to_pk_script();
        assert_eq!(script.len(), 32);
        let parsed = TicketCommitment::from_pk_script(&script).unwrap();
        assert_eq!(parsed.amount, 5_000_000);
        assert!(parsed.is_p2sh);
        assert_eq!(parsed.fee_limits, 0x5800);
    }

    #[test]
    fn rejects_other_scripts() {
        assert!(TicketCommitment::from_pk_script(&[OP_RETURN]).is_none());
        let mut script = vec![0x76; 32];
        assert!(TicketCommitment::from_pk_script(&script).is_none());
        script[0] = OP_RETURN;
        script[1] = 0x14;
        assert!(TicketCommitment::from_pk_script(&script).is_none());
    }

    #[test]
    fn hash160_hex_is_lowercase() {
        let commitment = TicketCommitment {
            hash160: [0xab; 20],
            amount: 1,
            is_p2sh: false,
            fee_limits: 0,
        };
        assert_eq!(commitment.hash160_hex(), "ab".repeat(20));
    }
}
