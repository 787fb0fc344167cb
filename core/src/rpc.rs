//! The RPC surface the reconciler needs from the node and the wallet.
//!
//! Implemented by the live websocket clients and by the test doubles in
//! `stakepool-nullables`.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::Instrument;

use stakepool_rpc::{BlockHeaderResult, GetTransactionResult, NodeClient, RpcError, WalletClient};
use stakepool_types::ChainHash;

use crate::tracing_spans::rpc_call_span;

/// Node calls used during reconciliation.
pub trait NodeRpc: Send + Sync {
    fn get_block_header<'a>(
        &'a self,
        hash: &'a ChainHash,
    ) -> BoxFuture<'a, Result<BlockHeaderResult, RpcError>>;
}

/// Wallet calls used during reconciliation.
pub trait WalletRpc: Send + Sync {
    fn get_tickets(&self, include_immature: bool) -> BoxFuture<'_, Result<Vec<ChainHash>, RpcError>>;

    /// Issue `gettransaction` immediately.
    ///
    /// The request is on the wire once this returns; the future only waits
    /// for the reply and dropping it abandons the request.
    fn get_transaction_async(
        &self,
        hash: &ChainHash,
    ) -> BoxFuture<'static, Result<GetTransactionResult, RpcError>>;
}

impl NodeRpc for NodeClient {
    fn get_block_header<'a>(
        &'a self,
        hash: &'a ChainHash,
    ) -> BoxFuture<'a, Result<BlockHeaderResult, RpcError>> {
        NodeClient::get_block_header(self, hash)
            .instrument(rpc_call_span("node", "getblockheader"))
            .boxed()
    }
}

impl WalletRpc for WalletClient {
    fn get_tickets(&self, include_immature: bool) -> BoxFuture<'_, Result<Vec<ChainHash>, RpcError>> {
        WalletClient::get_tickets(self, include_immature)
            .instrument(rpc_call_span("wallet", "gettickets"))
            .boxed()
    }

    fn get_transaction_async(
        &self,
        hash: &ChainHash,
    ) -> BoxFuture<'static, Result<GetTransactionResult, RpcError>> {
        match WalletClient::get_transaction_async(self, hash) {
            Ok(pending) => pending
                .receive()
                .instrument(rpc_call_span("wallet", "gettransaction"))
                .boxed(),
            Err(e) => futures_util::future::ready(Err(e)).boxed(),
        }
    }
}

impl<T: NodeRpc + ?Sized> NodeRpc for Arc<T> {
    fn get_block_header<'a>(
        &'a self,
        hash: &'a ChainHash,
    ) -> BoxFuture<'a, Result<BlockHeaderResult, RpcError>> {
        (**self).get_block_header(hash)
    }
}

impl<T: WalletRpc + ?Sized> WalletRpc for Arc<T> {
    fn get_tickets(&self, include_immature: bool) -> BoxFuture<'_, Result<Vec<ChainHash>, RpcError>> {
        (**self).get_tickets(include_immature)
    }

    fn get_transaction_async(
        &self,
        hash: &ChainHash,
    ) -> BoxFuture<'static, Result<GetTransactionResult, RpcError>> {
        (**self).get_transaction_async(hash)
    }
}
