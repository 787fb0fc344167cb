//! Stake pool daemon core.
//!
//! The core keeps the pool's view of its tickets in step with two RPC peers:
//! - Opens version-checked sessions to the chain node and the wallet
//! - Re-establishes either session when it drops
//! - Periodically reconciles the wallet's tickets against the users' voting
//!   configuration and the pool fee policy, partitioning them into live and
//!   ignored-low-fee sets

pub mod config;
pub mod connect;
pub mod error;
pub mod fee;
pub mod height_cache;
pub mod logging;
pub mod metrics;
pub mod notifications;
pub mod reconcile;
pub mod rpc;
pub mod service;
pub mod session;
pub mod shutdown;
pub mod state;
pub mod tracing_spans;

pub use config::{EndpointConfig, FeeConfig, StakepooldConfig, VotingUserEntry};
pub use connect::{
    connect_node_rpc, connect_wallet_rpc, NodeSession, WalletSession, REQUIRED_NODE_API,
    REQUIRED_WALLET_API,
};
pub use error::{StakepoolError, TicketError};
pub use fee::{FeeError, FeePolicy, PoolFeeCommitmentPolicy};
pub use height_cache::BlockHeightCache;
pub use logging::{init_logging, LogFormat};
pub use metrics::{serve_metrics, ReconcileMetrics};
pub use notifications::{NodeNotifications, WalletNotifications};
pub use reconcile::{ReconcileResult, ReconcileStats, TicketReconciler, DEFAULT_MAX_IN_FLIGHT};
pub use rpc::{NodeRpc, WalletRpc};
pub use service::run_reconcile_loop;
pub use session::{maintain_session, Backoff, LiveSession, Reconnectable};
pub use shutdown::ShutdownController;
pub use state::PoolState;
