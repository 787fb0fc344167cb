//! Nullable fee policy: scripted verdicts per transaction.

use std::collections::HashMap;
use std::sync::Mutex;

use stakepool_core::{FeeError, FeePolicy};
use stakepool_types::MsgTx;

#[derive(Clone, Copy)]
enum Verdict {
    Valid,
    Invalid,
    Error,
}

/// A fee policy that answers from a table and records what it was asked.
pub struct NullFeePolicy {
    default_valid: bool,
    verdicts: Mutex<HashMap<Vec<u8>, Verdict>>,
    evaluations: Mutex<Vec<(MsgTx, i64)>>,
}

impl NullFeePolicy {
    /// A policy that returns `default_valid` for unscripted transactions.
    pub fn new(default_valid: bool) -> Self {
        Self {
            default_valid,
            verdicts: Mutex::new(HashMap::new()),
            evaluations: Mutex::new(Vec::new()),
        }
    }

    pub fn accept_all() -> Self {
        Self::new(true)
    }

    pub fn set_valid(&self, tx: &MsgTx, valid: bool) {
        let verdict = if valid { Verdict::Valid } else { Verdict::Invalid };
        self.verdicts.lock().unwrap().insert(tx.to_bytes(), verdict);
    }

    /// Make evaluation of `tx` return an error.
    pub fn set_error(&self, tx: &MsgTx) {
        self.verdicts
            .lock()
            .unwrap()
            .insert(tx.to_bytes(), Verdict::Error);
    }

    /// Every `(transaction, purchase height)` evaluated so far.
    pub fn evaluations(&self) -> Vec<(MsgTx, i64)> {
        self.evaluations.lock().unwrap().clone()
    }

    pub fn evaluation_count(&self) -> usize {
        self.evaluations.lock().unwrap().len()
    }

    /// Whether `tx` has been evaluated.
    pub fn was_evaluated(&self, tx: &MsgTx) -> bool {
        self.evaluations.lock().unwrap().iter().any(|(t, _)| t == tx)
    }
}

impl Default for NullFeePolicy {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl FeePolicy for NullFeePolicy {
    fn evaluate(&self, tx: &MsgTx, purchase_height: i64) -> Result<bool, FeeError> {
        self.evaluations
            .lock()
            .unwrap()
            .push((tx.clone(), purchase_height));

        match self.verdicts.lock().unwrap().get(&tx.to_bytes()) {
            Some(Verdict::Valid) => Ok(true),
            Some(Verdict::Invalid) => Ok(false),
            Some(Verdict::Error) => Err(FeeError::Other("scripted fee evaluation error".into())),
            None => Ok(self.default_valid),
        }
    }
}
