//! Pool fee policy.
//!
//! A ticket pays the pool by committing part of its purchase to one of the
//! pool's fee addresses in its first commitment output.

use std::collections::HashSet;

use thiserror::Error;

use stakepool_types::{MsgTx, TicketCommitment};

use crate::config::FeeConfig;
use crate::StakepoolError;

/// Index of the ticket's first commitment output; output 0 is the stake
/// submission paying the ticket price.
const POOL_COMMITMENT_OUTPUT: usize = 1;

#[derive(Debug, Error)]
pub enum FeeError {
    #[error("ticket has no output {0}")]
    MissingCommitment(usize),

    #[error("output {0} is not a ticket commitment")]
    MalformedCommitment(usize),

    #[error("unknown pool commitment address {0}")]
    NotPoolFeeAddress(String),

    #[error("invalid purchase height {0}")]
    InvalidHeight(i64),

    #[error("{0}")]
    Other(String),
}

/// Decides whether a ticket pays the pool fee.
///
/// `Ok(false)` is a fee violation. Callers treat `Err` the same way.
pub trait FeePolicy: Send + Sync {
    fn evaluate(&self, tx: &MsgTx, purchase_height: i64) -> Result<bool, FeeError>;
}

impl<F> FeePolicy for F
where
    F: Fn(&MsgTx, i64) -> Result<bool, FeeError> + Send + Sync,
{
    fn evaluate(&self, tx: &MsgTx, purchase_height: i64) -> Result<bool, FeeError> {
        self(tx, purchase_height)
    }
}

/// Requires the pool commitment to go to a known fee address and to cover
/// `pool_fees` percent of the ticket price.
///
/// This is a flat-percentage approximation. The pool fee rule a production
/// pool applies also depends on the vote subsidy at the purchase height;
/// here the height is only required to be positive. Supply a different
/// [`FeePolicy`] when the exact rule matters.
#[derive(Clone, Debug)]
pub struct PoolFeeCommitmentPolicy {
    pool_fees: f64,
    fee_key_hashes: HashSet<[u8; 20]>,
}

impl PoolFeeCommitmentPolicy {
    pub fn new(pool_fees: f64, fee_key_hashes: impl IntoIterator<Item = [u8; 20]>) -> Self {
        Self {
            pool_fees,
            fee_key_hashes: fee_key_hashes.into_iter().collect(),
        }
    }

    pub fn from_config(config: &FeeConfig) -> Result<Self, StakepoolError> {
        let mut hashes = Vec::with_capacity(config.fee_key_hashes.len());
        for s in &config.fee_key_hashes {
            let bytes = hex::decode(s)
                .map_err(|e| StakepoolError::Config(format!("fee key hash {s:?}: {e}")))?;
            let hash: [u8; 20] = bytes.try_into().map_err(|_| {
                StakepoolError::Config(format!("fee key hash {s:?} is not 20 bytes"))
            })?;
            hashes.push(hash);
        }
        Ok(Self::new(config.pool_fees, hashes))
    }

    /// Minimum commitment, in atoms, for a ticket costing `ticket_price`.
    pub fn fee_needed(&self, ticket_price: i64) -> i64 {
        (ticket_price as f64 * self.pool_fees / 100.0).ceil() as i64
    }
}

impl FeePolicy for PoolFeeCommitmentPolicy {
    fn evaluate(&self, tx: &MsgTx, purchase_height: i64) -> Result<bool, FeeError> {
        let commitment_out = tx
            .tx_out
            .get(POOL_COMMITMENT_OUTPUT)
            .ok_or(FeeError::MissingCommitment(POOL_COMMITMENT_OUTPUT))?;
        let commitment = TicketCommitment::from_pk_script(&commitment_out.pk_script)
            .ok_or(FeeError::MalformedCommitment(POOL_COMMITMENT_OUTPUT))?;

        if !self.fee_key_hashes.contains(&commitment.hash160) {
            return Err(FeeError::NotPoolFeeAddress(commitment.hash160_hex()));
        }
        if purchase_height <= 0 {
            return Err(FeeError::InvalidHeight(purchase_height));
        }

        let ticket_price = tx.tx_out[0].value;
        let needed = self.fee_needed(ticket_price);
        if commitment.amount < needed {
            tracing::debug!(
                committed = commitment.amount,
                needed,
                purchase_height,
                "pool commitment below required fee"
            );
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakepool_types::{TxOut, TxSerializeType};

    const POOL_KEY: [u8; 20] = [0xaa; 20];

    fn ticket(price: i64, commitment: TicketCommitment) -> MsgTx {
        MsgTx {
            ser_type: TxSerializeType::Full,
            version: 1,
            tx_in: vec![],
            tx_out: vec![
                TxOut {
                    value: price,
                    version: 0,
                    pk_script: vec![0xba, 0x76, 0xa9, 0x14],
                },
                TxOut {
                    value: 0,
                    version: 0,
                    pk_script: commitment.to_pk_script(),
                },
            ],
            lock_time: 0,
            expiry: 0,
        }
    }

    fn commitment(hash160: [u8; 20], amount: i64) -> TicketCommitment {
        TicketCommitment {
            hash160,
            amount,
            is_p2sh: false,
            fee_limits: 0x5800,
        }
    }

    #[test]
    fn sufficient_commitment_is_valid() {
        let policy = PoolFeeCommitmentPolicy::new(5.0, [POOL_KEY]);
        let tx = ticket(100_000_000, commitment(POOL_KEY, 5_000_000));
        assert!(policy.evaluate(&tx, 100).unwrap());
    }

    #[test]
    fn short_commitment_is_invalid() {
        let policy = PoolFeeCommitmentPolicy::new(5.0, [POOL_KEY]);
        let tx = ticket(100_000_000, commitment(POOL_KEY, 4_999_999));
        assert!(!policy.evaluate(&tx, 100).unwrap());
    }

    #[test]
    fn foreign_commitment_address_is_an_error() {
        let policy = PoolFeeCommitmentPolicy::new(5.0, [POOL_KEY]);
        let tx = ticket(100_000_000, commitment([0x11; 20], 50_000_000));
        assert!(matches!(
            policy.evaluate(&tx, 100),
            Err(FeeError::NotPoolFeeAddress(_))
        ));
    }

    #[test]
    fn missing_or_malformed_commitment_is_an_error() {
        let policy = PoolFeeCommitmentPolicy::new(5.0, [POOL_KEY]);

        let mut tx = ticket(100_000_000, commitment(POOL_KEY, 5_000_000));
        tx.tx_out[1].pk_script = vec![0x76, 0xa9];
        assert!(matches!(
            policy.evaluate(&tx, 100),
            Err(FeeError::MalformedCommitment(1))
        ));

        tx.tx_out.truncate(1);
        assert!(matches!(
            policy.evaluate(&tx, 100),
            Err(FeeError::MissingCommitment(1))
        ));
    }

    #[test]
    fn non_positive_height_is_an_error() {
        let policy = PoolFeeCommitmentPolicy::new(5.0, [POOL_KEY]);
        let tx = ticket(100_000_000, commitment(POOL_KEY, 5_000_000));
        assert!(matches!(
            policy.evaluate(&tx, 0),
            Err(FeeError::InvalidHeight(0))
        ));
    }

    #[test]
    fn verdict_is_flat_across_heights() {
        let policy = PoolFeeCommitmentPolicy::new(5.0, [POOL_KEY]);
        let exact = ticket(100_000_000, commitment(POOL_KEY, 5_000_000));
        let short = ticket(100_000_000, commitment(POOL_KEY, 4_999_999));
        for height in [1, 4_096, 1_000_000] {
            assert!(policy.evaluate(&exact, height).unwrap());
            assert!(!policy.evaluate(&short, height).unwrap());
        }
    }

    #[test]
    fn from_config_rejects_bad_hashes() {
        let mut config = FeeConfig::default();
        config.fee_key_hashes = vec!["aa".repeat(20)];
        let policy = PoolFeeCommitmentPolicy::from_config(&config).unwrap();
        assert_eq!(policy.fee_needed(1_000), 75);

        config.fee_key_hashes = vec!["abcd".into()];
        assert!(matches!(
            PoolFeeCommitmentPolicy::from_config(&config),
            Err(StakepoolError::Config(_))
        ));

        config.fee_key_hashes = vec!["zz".repeat(20)];
        assert!(PoolFeeCommitmentPolicy::from_config(&config).is_err());
    }

    #[test]
    fn closures_are_policies() {
        let reject_all = |_: &MsgTx, _: i64| -> Result<bool, FeeError> { Ok(false) };
        let tx = ticket(1, commitment(POOL_KEY, 1));
        assert!(!reject_all.evaluate(&tx, 1).unwrap());
    }
}
