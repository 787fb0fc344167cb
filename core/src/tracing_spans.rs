//! Named spans for the daemon's long-running operations.
//!
//! Keeping names and fields consistent lets log pipelines group every line
//! of one pass or one connection attempt.

use tracing::{debug_span, info_span, Span};

/// One reconciliation pass, numbered from 1 since startup.
pub fn reconcile_span(pass: u64) -> Span {
    info_span!("reconcile", pass)
}

/// Session establishment with the node or the wallet.
pub fn connect_span(service: &str, host: &str) -> Span {
    info_span!("connect", service = %service, host = %host)
}

/// A reconnect attempt after the session was lost.
pub fn reconnect_span(service: &str, attempt: u32) -> Span {
    info_span!("reconnect", service = %service, attempt)
}

/// A single RPC round-trip.
pub fn rpc_call_span(service: &str, method: &str) -> Span {
    debug_span!("rpc_call", service = %service, method = %method)
}
