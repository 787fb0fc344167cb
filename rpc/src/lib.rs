//! Websocket JSON-RPC client for the chain node and the wallet.
//!
//! Provides:
//! - An authenticated streaming session ([`RpcClient`]) over TLS pinned to
//!   the server's own certificate
//! - Requests that are sent immediately and resolved later ([`PendingCall`])
//! - Notification dispatch to a registered [`NotificationHandler`]
//! - Typed node ([`NodeClient`]) and wallet ([`WalletClient`]) calls

pub mod client;
pub mod config;
pub mod error;
pub mod messages;
pub mod node;
pub mod notifications;
pub mod tls;
pub mod wallet;

pub use client::{PendingCall, RpcClient};
pub use config::{ConnConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use error::RpcError;
pub use messages::{
    BlockHeaderResult, GetTicketsResult, GetTransactionDetails, GetTransactionResult,
    VersionResult,
};
pub use node::{NodeClient, NODE_API_NAME};
pub use notifications::{IgnoreNotifications, Notification, NotificationHandler};
pub use wallet::{FutureGetTransaction, WalletClient, WALLET_API_NAME};
