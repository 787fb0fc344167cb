//! Keeping a session alive across connection loss.
//!
//! A [`LiveSession`] holds the current session; [`maintain_session`] waits
//! for it to close and swaps in a fresh one, backing off between attempts.
//! Users of the slot always see the latest session on their next call.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::broadcast;
use tracing::{info, warn, Instrument};

use stakepool_rpc::{BlockHeaderResult, GetTransactionResult, RpcError};
use stakepool_types::ChainHash;

use crate::rpc::{NodeRpc, WalletRpc};
use crate::tracing_spans::reconnect_span;
use crate::StakepoolError;

/// A session whose loss can be awaited.
pub trait Reconnectable: Send + Sync {
    /// Resolves once the underlying connection has gone away.
    fn closed(&self) -> BoxFuture<'_, ()>;
}

/// The current session of one service, replaceable in place.
pub struct LiveSession<T> {
    current: RwLock<Arc<T>>,
}

impl<T> LiveSession<T> {
    pub fn new(session: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(session)),
        }
    }

    pub fn current(&self) -> Arc<T> {
        let guard = self.current.read().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&guard)
    }

    /// Install a new session. Calls already issued on the old one finish or
    /// fail on their own.
    pub fn replace(&self, session: T) {
        let mut guard = self.current.write().unwrap_or_else(|p| p.into_inner());
        *guard = Arc::new(session);
    }
}

/// Reconnect delays: doubling from `initial`, capped at `max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

/// Re-establish the session in `slot` whenever it closes, until shutdown.
pub async fn maintain_session<T, C, Fut>(
    slot: Arc<LiveSession<T>>,
    service: &'static str,
    backoff: Backoff,
    mut connect: C,
    mut shutdown: broadcast::Receiver<()>,
) where
    T: Reconnectable,
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StakepoolError>>,
{
    loop {
        let current = slot.current();
        tokio::select! {
            _ = current.closed() => {}
            _ = shutdown.recv() => return,
        }
        drop(current);
        warn!(service, "RPC connection lost, reconnecting");

        let mut delay = backoff.initial;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match connect().instrument(reconnect_span(service, attempt)).await {
                Ok(session) => {
                    slot.replace(session);
                    info!(service, attempt, "RPC connection re-established");
                    break;
                }
                Err(e) => warn!(service, attempt, "reconnect failed, retrying in {delay:?}: {e}"),
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => return,
            }
            delay = backoff.next(delay);
        }
    }
}

impl<T: NodeRpc> NodeRpc for LiveSession<T> {
    fn get_block_header<'a>(
        &'a self,
        hash: &'a ChainHash,
    ) -> BoxFuture<'a, Result<BlockHeaderResult, RpcError>> {
        let session = self.current();
        async move { session.get_block_header(hash).await }.boxed()
    }
}

impl<T: WalletRpc> WalletRpc for LiveSession<T> {
    fn get_tickets(&self, include_immature: bool) -> BoxFuture<'_, Result<Vec<ChainHash>, RpcError>> {
        let session = self.current();
        async move { session.get_tickets(include_immature).await }.boxed()
    }

    fn get_transaction_async(
        &self,
        hash: &ChainHash,
    ) -> BoxFuture<'static, Result<GetTransactionResult, RpcError>> {
        self.current().get_transaction_async(hash)
    }
}
