//! Typed calls against the chain node.

use std::sync::Arc;

use serde_json::{json, Value};

use stakepool_types::{ChainHash, SemVer};

use crate::client::RpcClient;
use crate::config::ConnConfig;
use crate::error::RpcError;
use crate::messages::BlockHeaderResult;
use crate::notifications::NotificationHandler;

/// Key of the node's JSON-RPC API in the `version` response.
pub const NODE_API_NAME: &str = "ecrdjsonrpcapi";

/// A session with the chain node.
pub struct NodeClient {
    rpc: RpcClient,
}

impl NodeClient {
    pub async fn connect(
        config: &ConnConfig,
        handler: Arc<dyn NotificationHandler>,
    ) -> Result<Self, RpcError> {
        Ok(Self {
            rpc: RpcClient::connect(config, handler).await?,
        })
    }

    /// The underlying session, for calls without a typed wrapper.
    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub async fn api_version(&self) -> Result<SemVer, RpcError> {
        self.rpc.api_version(NODE_API_NAME).await
    }

    /// Verbose header of the block with the given hash.
    pub async fn get_block_header(&self, hash: &ChainHash) -> Result<BlockHeaderResult, RpcError> {
        self.rpc
            .call_as("getblockheader", vec![json!(hash.to_string()), Value::Bool(true)])
            .await
    }

    /// Subscribe to `blockconnected` / `blockdisconnected` notifications.
    pub async fn notify_blocks(&self) -> Result<(), RpcError> {
        self.rpc.call("notifyblocks", vec![]).await.map(|_| ())
    }
}
