//! Typed calls against the wallet.

use std::sync::Arc;

use serde_json::{json, Value};

use stakepool_types::{ChainHash, SemVer};

use crate::client::{PendingCall, RpcClient};
use crate::config::ConnConfig;
use crate::error::RpcError;
use crate::messages::{GetTicketsResult, GetTransactionResult};
use crate::notifications::NotificationHandler;

/// Key of the wallet's JSON-RPC API in the `version` response.
pub const WALLET_API_NAME: &str = "eacrwalletjsonrpcapi";

/// A session with the wallet.
pub struct WalletClient {
    rpc: RpcClient,
}

impl WalletClient {
    pub async fn connect(
        config: &ConnConfig,
        handler: Arc<dyn NotificationHandler>,
    ) -> Result<Self, RpcError> {
        Ok(Self {
            rpc: RpcClient::connect(config, handler).await?,
        })
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub async fn api_version(&self) -> Result<SemVer, RpcError> {
        self.rpc.api_version(WALLET_API_NAME).await
    }

    /// Hashes of the wallet's tickets. Immature tickets are included only
    /// when asked for.
    pub async fn get_tickets(&self, include_immature: bool) -> Result<Vec<ChainHash>, RpcError> {
        let result: GetTicketsResult = self
            .rpc
            .call_as("gettickets", vec![Value::Bool(include_immature)])
            .await?;
        result
            .hashes
            .iter()
            .map(|h| {
                h.parse().map_err(|e| RpcError::Decode {
                    method: "gettickets".into(),
                    reason: format!("bad hash {h}: {e}"),
                })
            })
            .collect()
    }

    pub async fn get_transaction(&self, hash: &ChainHash) -> Result<GetTransactionResult, RpcError> {
        self.get_transaction_async(hash)?.receive().await
    }

    /// Send `gettransaction` now; collect the result later.
    pub fn get_transaction_async(&self, hash: &ChainHash) -> Result<FutureGetTransaction, RpcError> {
        let call = self
            .rpc
            .send_request("gettransaction", vec![json!(hash.to_string())])?;
        Ok(FutureGetTransaction(call))
    }
}

/// An in-flight `gettransaction` request.
pub struct FutureGetTransaction(PendingCall);

impl FutureGetTransaction {
    pub async fn receive(self) -> Result<GetTransactionResult, RpcError> {
        self.0.receive_as().await
    }
}
