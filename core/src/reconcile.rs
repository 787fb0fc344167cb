//! Ticket reconciliation.
//!
//! A pass lists the wallet's tickets, fetches every ticket transaction, maps
//! each ticket to a user through the voting table and sorts it into the live
//! or the ignored-low-fee set:
//!
//! 1. Snapshot the voting table and the confirmed-low-fee set.
//! 2. `gettickets`. A failure here aborts the pass with no partial result.
//! 3. Issue `gettransaction` for every ticket, at most `max_in_flight` at a
//!    time, and harvest the replies in listing order.
//! 4. The first output address found in the voting table owns the ticket.
//! 5. Tickets in the confirmed-low-fee set are live without a fee check.
//! 6. Everything else is decoded, its purchase height resolved through a
//!    [`BlockHeightCache`], and handed to the [`FeePolicy`]. A policy error
//!    counts as a low fee.
//!
//! Problems with a single ticket are logged and the ticket skipped; they
//! never fail the pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn, Instrument};

use stakepool_rpc::GetTransactionResult;
use stakepool_types::{ChainHash, MsgTx, UserVotingConfig};

use crate::fee::{FeeError, FeePolicy};
use crate::height_cache::BlockHeightCache;
use crate::metrics::ReconcileMetrics;
use crate::rpc::{NodeRpc, WalletRpc};
use crate::state::{PoolState, TicketMap};
use crate::tracing_spans::reconcile_span;
use crate::{StakepoolError, TicketError};

/// Default bound on concurrent `gettransaction` requests.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Outcome of one pass. A ticket appears in at most one map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    pub live_tickets: TicketMap,
    pub ignored_low_fee_tickets: TicketMap,
}

/// Per-pass counters, logged at the end of every pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Tickets returned by `gettickets`.
    pub total: usize,
    pub live: usize,
    pub ignored_low_fee: usize,
    /// Live tickets taken from the confirmed-low-fee set.
    pub carried_over: usize,
    /// Live tickets that passed the fee policy.
    pub normal_fee: usize,
    /// Ignored tickets whose fee evaluation errored.
    pub fee_errors: usize,
    pub skipped: usize,
    pub header_lookups: usize,
}

enum Verdict {
    CarriedOver,
    NormalFee,
    LowFee,
    FeeError(FeeError),
}

pub struct TicketReconciler<N: ?Sized, W: ?Sized, F: ?Sized> {
    node: Arc<N>,
    wallet: Arc<W>,
    fee_policy: Arc<F>,
    state: Arc<PoolState>,
    max_in_flight: usize,
    metrics: Option<Arc<ReconcileMetrics>>,
    passes: AtomicU64,
}

impl<N, W, F> TicketReconciler<N, W, F>
where
    N: NodeRpc + ?Sized,
    W: WalletRpc + ?Sized,
    F: FeePolicy + ?Sized,
{
    pub fn new(node: Arc<N>, wallet: Arc<W>, fee_policy: Arc<F>, state: Arc<PoolState>) -> Self {
        Self {
            node,
            wallet,
            fee_policy,
            state,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            metrics: None,
            passes: AtomicU64::new(0),
        }
    }

    /// Bound on concurrent detail requests. Zero is treated as one.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ReconcileMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> &Arc<PoolState> {
        &self.state
    }

    /// Run one pass. Only a ticket listing failure is returned as an error.
    pub async fn reconcile(&self) -> Result<ReconcileResult, StakepoolError> {
        self.reconcile_with_stats().await.map(|(result, _)| result)
    }

    pub async fn reconcile_with_stats(
        &self,
    ) -> Result<(ReconcileResult, ReconcileStats), StakepoolError> {
        let pass = self.passes.fetch_add(1, Ordering::Relaxed) + 1;
        self.run_pass().instrument(reconcile_span(pass)).await
    }

    async fn run_pass(&self) -> Result<(ReconcileResult, ReconcileStats), StakepoolError> {
        let started = Instant::now();

        let voting = self.state.voting_config_snapshot().await;
        let added_low_fee = self.state.added_low_fee_snapshot().await;

        info!("calling gettickets");
        let listing_started = Instant::now();
        let listing = self.wallet.get_tickets(false).await;
        info!(elapsed_ms = listing_started.elapsed().as_millis() as u64, "gettickets returned");

        let tickets = match listing {
            Ok(tickets) => tickets,
            Err(e) => {
                warn!("gettickets failed: {e}");
                if let Some(metrics) = &self.metrics {
                    metrics.failed_passes.inc();
                }
                return Err(StakepoolError::TicketListing(e));
            }
        };

        let total = tickets.len();
        debug!(total, max_in_flight = self.max_in_flight, "fetching ticket transactions");

        let wallet = &self.wallet;
        let mut replies = stream::iter(tickets)
            .map(|ticket| {
                let reply = wallet.get_transaction_async(&ticket);
                async move { (ticket, reply.await) }
            })
            .buffered(self.max_in_flight);

        let mut cache = BlockHeightCache::new();
        let mut result = ReconcileResult::default();
        let mut stats = ReconcileStats {
            total,
            ..Default::default()
        };

        let mut received = 0usize;
        while let Some((ticket, reply)) = replies.next().await {
            received += 1;
            debug!("received gettransaction result for ticket {received}/{total}");

            let outcome = match reply {
                Ok(tx) => self.classify(&ticket, &tx, &voting, &added_low_fee, &mut cache).await,
                Err(e) => Err(TicketError::Detail(e)),
            };

            match outcome {
                Ok((address, Verdict::CarriedOver)) => {
                    stats.carried_over += 1;
                    result.live_tickets.insert(ticket, address);
                }
                Ok((address, Verdict::NormalFee)) => {
                    stats.normal_fee += 1;
                    result.live_tickets.insert(ticket, address);
                }
                Ok((address, Verdict::LowFee)) => {
                    warn!(%ticket, multisig = %address, "ignoring ticket due to invalid fee");
                    result.ignored_low_fee_tickets.insert(ticket, address);
                }
                Ok((address, Verdict::FeeError(e))) => {
                    let err = TicketError::FeeEvaluation(e);
                    warn!(%ticket, multisig = %address, "ignoring ticket due to error: {err}");
                    stats.fee_errors += 1;
                    result.ignored_low_fee_tickets.insert(ticket, address);
                }
                Err(err) => {
                    warn!(%ticket, "skipping ticket: {err}");
                    stats.skipped += 1;
                }
            }
        }

        stats.live = result.live_tickets.len();
        stats.ignored_low_fee = result.ignored_low_fee_tickets.len();
        stats.header_lookups = cache.lookups();

        info!(
            added_low_fee = added_low_fee.len(),
            ignored_low_fee = stats.ignored_low_fee,
            normal_fee = stats.normal_fee,
            live = stats.live,
            skipped = stats.skipped,
            total,
            "tickets loaded"
        );

        if let Some(metrics) = &self.metrics {
            metrics.observe_pass(&stats, started.elapsed());
        }
        Ok((result, stats))
    }

    /// Decide one ticket. Returns the owning multisig address and verdict.
    async fn classify(
        &self,
        ticket: &ChainHash,
        tx: &GetTransactionResult,
        voting: &HashMap<String, UserVotingConfig>,
        added_low_fee: &TicketMap,
        cache: &mut BlockHeightCache,
    ) -> Result<(String, Verdict), TicketError> {
        let user = tx
            .details
            .iter()
            .find_map(|detail| voting.get(&detail.address))
            .ok_or_else(|| TicketError::AddressResolution {
                ticket: ticket.to_string(),
                addresses: tx.details.iter().map(|d| d.address.clone()).collect(),
            })?;
        let address = user.multisig_address.clone();

        if added_low_fee.contains_key(ticket) {
            return Ok((address, Verdict::CarriedOver));
        }

        let msg_tx = MsgTx::from_hex(&tx.hex)?;

        if tx.block_hash.is_empty() {
            return Err(TicketError::Unmined);
        }
        let block: ChainHash = tx
            .block_hash
            .parse()
            .map_err(|e: stakepool_types::HashParseError| TicketError::InvalidHash {
                what: "block",
                value: tx.block_hash.clone(),
                reason: e.to_string(),
            })?;
        let height = cache.height_of(&*self.node, &block).await?;

        let verdict = match self.fee_policy.evaluate(&msg_tx, height) {
            Ok(true) => Verdict::NormalFee,
            Ok(false) => Verdict::LowFee,
            Err(e) => Verdict::FeeError(e),
        };
        Ok((address, verdict))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use stakepool_rpc::{BlockHeaderResult, GetTransactionDetails, RpcError};
    use stakepool_types::{TxOut, TxSerializeType};

    struct FixedNode;

    impl NodeRpc for FixedNode {
        fn get_block_header<'a>(
            &'a self,
            _hash: &'a ChainHash,
        ) -> BoxFuture<'a, Result<BlockHeaderResult, RpcError>> {
            async {
                Ok(BlockHeaderResult {
                    height: 100,
                    ..Default::default()
                })
            }
            .boxed()
        }
    }

    struct OneTicketWallet {
        tx: GetTransactionResult,
    }

    impl WalletRpc for OneTicketWallet {
        fn get_tickets(&self, _: bool) -> BoxFuture<'_, Result<Vec<ChainHash>, RpcError>> {
            async { Ok(vec![ChainHash::new([1; 32])]) }.boxed()
        }

        fn get_transaction_async(
            &self,
            _hash: &ChainHash,
        ) -> BoxFuture<'static, Result<GetTransactionResult, RpcError>> {
            futures_util::future::ready(Ok(self.tx.clone())).boxed()
        }
    }

    fn ticket_tx(address: &str, block_hash: &str) -> GetTransactionResult {
        let msg = MsgTx {
            ser_type: TxSerializeType::Full,
            version: 1,
            tx_in: vec![],
            tx_out: vec![TxOut {
                value: 1,
                version: 0,
                pk_script: vec![],
            }],
            lock_time: 0,
            expiry: 0,
        };
        GetTransactionResult {
            txid: ChainHash::new([1; 32]).to_string(),
            block_hash: block_hash.to_string(),
            details: vec![GetTransactionDetails {
                address: address.to_string(),
                ..Default::default()
            }],
            hex: msg.to_hex(),
            ..Default::default()
        }
    }

    fn reconciler(
        tx: GetTransactionResult,
        policy: impl Fn(&MsgTx, i64) -> Result<bool, FeeError> + Send + Sync + 'static,
    ) -> TicketReconciler<FixedNode, OneTicketWallet, dyn FeePolicy> {
        let state = Arc::new(PoolState::new(HashMap::from([(
            "addrA".to_string(),
            UserVotingConfig::new(1, "msA"),
        )])));
        let policy: Arc<dyn FeePolicy> = Arc::new(policy);
        TicketReconciler::new(
            Arc::new(FixedNode),
            Arc::new(OneTicketWallet { tx }),
            policy,
            state,
        )
    }

    #[tokio::test]
    async fn policy_sees_purchase_height() {
        let r = reconciler(ticket_tx("addrA", &"22".repeat(32)), |_, height| Ok(height == 100));
        let (result, stats) = r.reconcile_with_stats().await.unwrap();
        assert_eq!(result.live_tickets.len(), 1);
        assert_eq!(stats.normal_fee, 1);
        assert_eq!(stats.header_lookups, 1);
    }

    #[tokio::test]
    async fn policy_error_is_fail_closed() {
        let r = reconciler(ticket_tx("addrA", &"22".repeat(32)), |_, _| {
            Err(FeeError::Other("boom".into()))
        });
        let (result, stats) = r.reconcile_with_stats().await.unwrap();
        assert!(result.live_tickets.is_empty());
        assert_eq!(
            result.ignored_low_fee_tickets.get(&ChainHash::new([1; 32])).map(String::as_str),
            Some("msA")
        );
        assert_eq!(stats.fee_errors, 1);
    }

    #[tokio::test]
    async fn unmined_and_undecodable_tickets_are_skipped() {
        let r = reconciler(ticket_tx("addrA", ""), |_, _| Ok(true));
        let (result, stats) = r.reconcile_with_stats().await.unwrap();
        assert_eq!(result, ReconcileResult::default());
        assert_eq!(stats.skipped, 1);

        let mut bad = ticket_tx("addrA", &"22".repeat(32));
        bad.hex = "zz".into();
        let r = reconciler(bad, |_, _| Ok(true));
        let (result, stats) = r.reconcile_with_stats().await.unwrap();
        assert_eq!(result, ReconcileResult::default());
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.header_lookups, 0);
    }

    #[tokio::test]
    async fn malformed_block_hash_is_skipped() {
        let r = reconciler(ticket_tx("addrA", "not-a-hash"), |_, _| Ok(true));
        let (result, stats) = r.reconcile_with_stats().await.unwrap();
        assert_eq!(result, ReconcileResult::default());
        assert_eq!(stats.skipped, 1);
    }
}
