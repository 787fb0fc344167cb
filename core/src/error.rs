use std::path::PathBuf;

use thiserror::Error;

use stakepool_rpc::RpcError;
use stakepool_types::{ChainHash, SemVer, TxDecodeError};

use crate::fee::FeeError;

/// Errors that abort startup or a whole reconciliation pass.
#[derive(Debug, Error)]
pub enum StakepoolError {
    #[error("failed to read {service} certificate at {}: {source}{}", .path.display(), hint_suffix(.hint))]
    CertificateRead {
        service: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
        hint: Option<String>,
    },

    #[error("failed to connect to {service} RPC at {host}: {source}{}", hint_suffix(.hint))]
    Connection {
        service: &'static str,
        host: String,
        #[source]
        source: RpcError,
        hint: Option<String>,
    },

    #[error("unable to get {service} RPC version: {source}")]
    VersionQuery {
        service: &'static str,
        #[source]
        source: RpcError,
    },

    #[error(
        "{service} JSON-RPC server does not have a compatible API version: \
         advertises {actual} but requires {required}"
    )]
    IncompatibleVersion {
        service: &'static str,
        required: SemVer,
        actual: SemVer,
    },

    #[error("gettickets failed: {0}")]
    TicketListing(#[source] RpcError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_deref().map(|h| format!("; {h}")).unwrap_or_default()
}

/// Reasons a single ticket is skipped during a pass. Never fatal to the pass.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("gettransaction failed: {0}")]
    Detail(#[source] RpcError),

    #[error("invalid {what} hash {value:?}: {reason}")]
    InvalidHash {
        what: &'static str,
        value: String,
        reason: String,
    },

    #[error("could not map ticket {ticket} to a user; addresses {addresses:?} not in voting config")]
    AddressResolution {
        ticket: String,
        addresses: Vec<String>,
    },

    #[error("ticket is not mined yet")]
    Unmined,

    #[error("failed to decode ticket transaction: {0}")]
    TransactionDecode(#[from] TxDecodeError),

    #[error("getblockheader failed for {block}: {source}")]
    BlockHeaderLookup {
        block: ChainHash,
        #[source]
        source: RpcError,
    },

    #[error("fee evaluation failed: {0}")]
    FeeEvaluation(#[from] FeeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incompatible_version_names_both_versions() {
        let err = StakepoolError::IncompatibleVersion {
            service: "wallet",
            required: SemVer::new(6, 2, 0),
            actual: SemVer::new(5, 9, 1),
        };
        let msg = err.to_string();
        assert!(msg.contains("advertises 5.9.1"));
        assert!(msg.contains("requires 6.2.0"));
    }

    #[test]
    fn connection_error_appends_hint() {
        let err = StakepoolError::Connection {
            service: "wallet",
            host: "127.0.0.1:9110".into(),
            source: RpcError::Disconnected,
            hint: Some("check the certificate".into()),
        };
        assert!(err.to_string().ends_with("connection closed; check the certificate"));

        let plain = StakepoolError::Connection {
            service: "node",
            host: "127.0.0.1:9109".into(),
            source: RpcError::Disconnected,
            hint: None,
        };
        assert!(plain.to_string().ends_with("connection closed"));
    }
}
