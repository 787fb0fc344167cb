//! Fundamental types for the stake pool daemon.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! chain hashes, API versions, network parameters, wire transactions, ticket
//! commitments and per-user voting configuration.

pub mod error;
pub mod hash;
pub mod network;
pub mod semver;
pub mod ticket;
pub mod tx;
pub mod voting;

pub use error::{HashParseError, TxDecodeError};
pub use hash::ChainHash;
pub use network::NetworkId;
pub use semver::{semver_compatible, SemVer};
pub use ticket::TicketCommitment;
pub use tx::{MsgTx, OutPoint, TxIn, TxOut, TxSerializeType};
pub use voting::UserVotingConfig;
