//! Network identifier and per-network RPC parameters.

use serde::{Deserialize, Serialize};

/// Identifies which network the pool daemon operates on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production network.
    #[default]
    MainNet,
    /// The public test network (version 3).
    TestNet3,
    /// Local simulation network.
    SimNet,
}

impl NetworkId {
    /// Default port of the node's JSON-RPC server.
    ///
    /// The node port deliberately differs from the wallet port: the wallet
    /// listens on the well-known port and forwards chain requests to the node.
    pub fn node_rpc_port(&self) -> u16 {
        match self {
            Self::MainNet => 9109,
            Self::TestNet3 => 19109,
            Self::SimNet => 19556,
        }
    }

    /// Default port of the wallet's JSON-RPC server.
    pub fn wallet_rpc_port(&self) -> u16 {
        match self {
            Self::MainNet => 9110,
            Self::TestNet3 => 19110,
            Self::SimNet => 19557,
        }
    }

    /// Default port of the pool daemon's own RPC server.
    pub fn pool_rpc_port(&self) -> u16 {
        match self {
            Self::MainNet => 9113,
            Self::TestNet3 => 19113,
            Self::SimNet => 19560,
        }
    }

    /// Name used for data and log directories.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MainNet => "mainnet",
            Self::TestNet3 => "testnet3",
            Self::SimNet => "simnet",
        }
    }

    /// Parse a user-supplied network name. Accepts the directory names plus
    /// the short forms `main`, `test` and `sim`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Some(Self::MainNet),
            "testnet3" | "testnet" | "test" => Some(Self::TestNet3),
            "simnet" | "sim" => Some(Self::SimNet),
            _ => None,
        }
    }
}
