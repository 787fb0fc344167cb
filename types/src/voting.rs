//! Per-user voting configuration.

use serde::{Deserialize, Serialize};

/// Voting preferences of one pool user.
///
/// The pool keys these records by the user's ticket address; the multisig
/// address is the 1-of-2 script the pool votes with on the user's behalf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserVotingConfig {
    pub userid: i64,
    pub multisig_address: String,
    #[serde(default)]
    pub vote_bits: u16,
    #[serde(default)]
    pub vote_bits_version: u32,
}

impl UserVotingConfig {
    pub fn new(userid: i64, multisig_address: impl Into<String>) -> Self {
        Self {
            userid,
            multisig_address: multisig_address.into(),
            vote_bits: 1,
            vote_bits_version: 0,
        }
    }
}
