//! Nullable infrastructure for deterministic testing.
//!
//! The reconciler talks to the node, the wallet and the fee policy through
//! traits. This crate provides in-memory implementations that:
//! - Return scripted values
//! - Count every call so tests can assert on RPC traffic
//! - Never touch the network
//!
//! Usage: build a [`NullNode`] and a [`NullWallet`], script the tickets and
//! blocks, and hand them to a `TicketReconciler`.

pub mod fee;
pub mod node;
pub mod wallet;

pub use fee::NullFeePolicy;
pub use node::NullNode;
pub use wallet::{null_ticket_tx, ticket_transaction, NullWallet};
