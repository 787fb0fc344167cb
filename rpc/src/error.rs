//! RPC transport error types.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection closed")]
    Disconnected,

    #[error("no {method} response within {after:?}")]
    Timeout { method: String, after: Duration },

    #[error("server error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("failed to encode request: {0}")]
    Serialize(String),

    #[error("failed to decode {method} response: {reason}")]
    Decode { method: String, reason: String },

    #[error("version response has no {0} entry")]
    MissingVersion(String),
}

impl RpcError {
    /// Whether the error means the session is gone, rather than a single
    /// request having failed.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, RpcError::Disconnected)
    }
}
