//! Session establishment with the chain node and the wallet.
//!
//! Both establishers read the server certificate, open an authenticated
//! websocket session with the caller's notification handler attached, query
//! the server's API version and refuse servers outside the supported major
//! version.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::{debug, error, info, Instrument};

use stakepool_rpc::{
    BlockHeaderResult, GetTransactionResult, NodeClient, NotificationHandler, RpcError,
    WalletClient,
};
use stakepool_types::{semver_compatible, ChainHash, SemVer};

use crate::config::EndpointConfig;
use crate::rpc::{NodeRpc, WalletRpc};
use crate::session::Reconnectable;
use crate::tracing_spans::connect_span;
use crate::StakepoolError;

/// Oldest node JSON-RPC API this daemon works with.
pub const REQUIRED_NODE_API: SemVer = SemVer::new(6, 1, 1);
/// Oldest wallet JSON-RPC API this daemon works with.
pub const REQUIRED_WALLET_API: SemVer = SemVer::new(6, 2, 0);

/// A version-checked node session.
///
/// Notifications keep arriving for as long as this value is alive.
pub struct NodeSession {
    client: NodeClient,
    version: SemVer,
}

impl NodeSession {
    pub fn client(&self) -> &NodeClient {
        &self.client
    }

    /// API version the node advertised when the session was opened.
    pub fn version(&self) -> SemVer {
        self.version
    }
}

/// A version-checked wallet session.
pub struct WalletSession {
    client: WalletClient,
    version: SemVer,
}

impl WalletSession {
    pub fn client(&self) -> &WalletClient {
        &self.client
    }

    pub fn version(&self) -> SemVer {
        self.version
    }
}

fn check_version(
    service: &'static str,
    required: SemVer,
    actual: SemVer,
) -> Result<(), StakepoolError> {
    if semver_compatible(required, actual) {
        Ok(())
    } else {
        Err(StakepoolError::IncompatibleVersion {
            service,
            required,
            actual,
        })
    }
}

/// Connect to the chain node and check its API version against `required`.
pub async fn connect_node_rpc(
    endpoint: &EndpointConfig,
    required: SemVer,
    handler: Arc<dyn NotificationHandler>,
) -> Result<NodeSession, StakepoolError> {
    async move {
        let conn = endpoint.conn_config("node", None).await.map_err(|e| {
            error!("{e}");
            e
        })?;

        debug!(
            user = %endpoint.user,
            cert = %endpoint.cert.display(),
            "attempting to connect to node RPC"
        );
        let client = NodeClient::connect(&conn, handler)
            .await
            .map_err(|source| StakepoolError::Connection {
                service: "node",
                host: endpoint.host.clone(),
                source,
                hint: None,
            })?;

        let version = client
            .api_version()
            .await
            .map_err(|source| StakepoolError::VersionQuery {
                service: "node",
                source,
            })?;
        check_version("node", required, version)?;

        info!(%version, "connected to node RPC");
        Ok(NodeSession { client, version })
    }
    .instrument(connect_span("node", &endpoint.host))
    .await
}

/// Connect to the wallet and check its API version against `required`.
///
/// The transport never reconnects by itself; a lost session is observed
/// through [`Reconnectable::closed`] and re-established by the caller.
pub async fn connect_wallet_rpc(
    endpoint: &EndpointConfig,
    required: SemVer,
    handler: Arc<dyn NotificationHandler>,
) -> Result<WalletSession, StakepoolError> {
    async move {
        let hint = format!(
            "verify that the username and password are correct and that the \
             certificate at {} belongs to this wallet",
            endpoint.cert.display()
        );

        let conn = endpoint
            .conn_config("wallet", Some(hint.clone()))
            .await
            .map_err(|e| {
                error!("{e}");
                e
            })?;

        info!(
            user = %endpoint.user,
            cert = %endpoint.cert.display(),
            "attempting to connect to wallet RPC"
        );
        let client = WalletClient::connect(&conn, handler).await.map_err(|source| {
            StakepoolError::Connection {
                service: "wallet",
                host: endpoint.host.clone(),
                source,
                hint: Some(hint),
            }
        })?;

        let version = client
            .api_version()
            .await
            .map_err(|source| StakepoolError::VersionQuery {
                service: "wallet",
                source,
            })?;
        if let Err(e) = check_version("wallet", required, version) {
            error!(host = %endpoint.host, "{e}");
            return Err(e);
        }

        info!(%version, "connected to wallet RPC");
        Ok(WalletSession { client, version })
    }
    .instrument(connect_span("wallet", &endpoint.host))
    .await
}

impl NodeRpc for NodeSession {
    fn get_block_header<'a>(
        &'a self,
        hash: &'a ChainHash,
    ) -> BoxFuture<'a, Result<BlockHeaderResult, RpcError>> {
        NodeRpc::get_block_header(&self.client, hash)
    }
}

impl WalletRpc for WalletSession {
    fn get_tickets(&self, include_immature: bool) -> BoxFuture<'_, Result<Vec<ChainHash>, RpcError>> {
        WalletRpc::get_tickets(&self.client, include_immature)
    }

    fn get_transaction_async(
        &self,
        hash: &ChainHash,
    ) -> BoxFuture<'static, Result<GetTransactionResult, RpcError>> {
        WalletRpc::get_transaction_async(&self.client, hash)
    }
}

impl Reconnectable for NodeSession {
    fn closed(&self) -> BoxFuture<'_, ()> {
        self.client.rpc().closed().boxed()
    }
}

impl Reconnectable for WalletSession {
    fn closed(&self) -> BoxFuture<'_, ()> {
        self.client.rpc().closed().boxed()
    }
}
