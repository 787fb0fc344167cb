//! The steady-state reconcile loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::fee::FeePolicy;
use crate::reconcile::TicketReconciler;
use crate::rpc::{NodeRpc, WalletRpc};

/// Reconcile at startup, on every `interval` tick and whenever
/// `block_connected` fires, publishing each result into the pool state.
///
/// Returns on shutdown. A pass still in flight is dropped, which abandons
/// its outstanding requests.
pub async fn run_reconcile_loop<N, W, F>(
    reconciler: Arc<TicketReconciler<N, W, F>>,
    interval: Duration,
    block_connected: Arc<Notify>,
    mut shutdown: broadcast::Receiver<()>,
) where
    N: NodeRpc + ?Sized,
    W: WalletRpc + ?Sized,
    F: FeePolicy + ?Sized,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {}
            _ = block_connected.notified() => {}
        }

        tokio::select! {
            _ = shutdown.recv() => {
                info!("shutdown requested, abandoning reconciliation pass");
                break;
            }
            outcome = reconciler.reconcile() => match outcome {
                Ok(result) => reconciler.state().record_reconciliation(&result).await,
                Err(e) => warn!("reconciliation pass failed: {e}"),
            },
        }
    }
    info!("reconcile loop stopped");
}
