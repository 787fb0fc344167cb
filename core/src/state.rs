//! Shared pool state.
//!
//! The voting table and the confirmed-low-fee set are written by other parts
//! of the pool (user registration, the admin "add low fee tickets" action).
//! The reconciler only takes copies: every accessor clones under a read lock
//! and releases it before returning, so no lock is ever held across RPC I/O.

use std::collections::HashMap;

use tokio::sync::RwLock;

use stakepool_types::{ChainHash, UserVotingConfig};

use crate::reconcile::ReconcileResult;

/// Ticket hash → multisig voting address.
pub type TicketMap = HashMap<ChainHash, String>;

#[derive(Debug, Default)]
pub struct PoolState {
    /// Keyed by the ticket address users buy with.
    user_voting_config: RwLock<HashMap<String, UserVotingConfig>>,
    /// Low-fee tickets an operator has explicitly accepted.
    ///
    /// These are reported live on every pass without another fee check: once
    /// a low-fee ticket is added it stays voted. This mirrors how the pool
    /// has always behaved and is kept deliberately.
    added_low_fee_tickets: RwLock<TicketMap>,
    live_tickets: RwLock<TicketMap>,
    ignored_low_fee_tickets: RwLock<TicketMap>,
}

impl PoolState {
    pub fn new(user_voting_config: HashMap<String, UserVotingConfig>) -> Self {
        Self {
            user_voting_config: RwLock::new(user_voting_config),
            ..Default::default()
        }
    }

    pub async fn voting_config_snapshot(&self) -> HashMap<String, UserVotingConfig> {
        self.user_voting_config.read().await.clone()
    }

    pub async fn added_low_fee_snapshot(&self) -> TicketMap {
        self.added_low_fee_tickets.read().await.clone()
    }

    pub async fn live_tickets(&self) -> TicketMap {
        self.live_tickets.read().await.clone()
    }

    pub async fn ignored_low_fee_tickets(&self) -> TicketMap {
        self.ignored_low_fee_tickets.read().await.clone()
    }

    /// Both published sets, read together.
    pub async fn published(&self) -> ReconcileResult {
        let live = self.live_tickets.read().await;
        let ignored = self.ignored_low_fee_tickets.read().await;
        ReconcileResult {
            live_tickets: live.clone(),
            ignored_low_fee_tickets: ignored.clone(),
        }
    }

    pub async fn set_user_voting_config(&self, config: HashMap<String, UserVotingConfig>) {
        *self.user_voting_config.write().await = config;
    }

    pub async fn set_added_low_fee_tickets(&self, tickets: TicketMap) {
        *self.added_low_fee_tickets.write().await = tickets;
    }

    /// Publish the outcome of a pass.
    ///
    /// Both sets are swapped while both write locks are held, so a ticket
    /// that moved between them is never visible in both. Locks are always
    /// taken live first, then ignored.
    pub async fn record_reconciliation(&self, result: &ReconcileResult) {
        let mut live = self.live_tickets.write().await;
        let mut ignored = self.ignored_low_fee_tickets.write().await;
        *live = result.live_tickets.clone();
        *ignored = result.ignored_low_fee_tickets.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(n: u8) -> ChainHash {
        ChainHash::new([n; 32])
    }

    #[tokio::test]
    async fn snapshots_do_not_alias_the_live_table() {
        let mut table = HashMap::new();
        table.insert("addrA".to_string(), UserVotingConfig::new(1, "msA"));
        let state = PoolState::new(table);

        let mut snapshot = state.voting_config_snapshot().await;
        snapshot.insert("addrB".to_string(), UserVotingConfig::new(2, "msB"));

        let fresh = state.voting_config_snapshot().await;
        assert_eq!(fresh.len(), 1);
        assert!(fresh.contains_key("addrA"));
    }

    #[tokio::test]
    async fn snapshot_taken_while_writer_waits() {
        let state = PoolState::default();
        state
            .set_added_low_fee_tickets(HashMap::from([(hash(1), "msA".to_string())]))
            .await;

        let snapshot = state.added_low_fee_snapshot().await;
        state.set_added_low_fee_tickets(HashMap::new()).await;

        assert_eq!(snapshot.get(&hash(1)).map(String::as_str), Some("msA"));
        assert!(state.added_low_fee_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn record_reconciliation_replaces_outputs() {
        let state = PoolState::default();
        let first = ReconcileResult {
            live_tickets: HashMap::from([(hash(1), "msA".to_string())]),
            ignored_low_fee_tickets: HashMap::from([(hash(2), "msA".to_string())]),
        };
        state.record_reconciliation(&first).await;
        assert_eq!(state.live_tickets().await.len(), 1);
        assert_eq!(state.ignored_low_fee_tickets().await.len(), 1);

        state.record_reconciliation(&ReconcileResult::default()).await;
        assert!(state.live_tickets().await.is_empty());
        assert!(state.ignored_low_fee_tickets().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn readers_never_see_a_ticket_in_both_sets() {
        let state = std::sync::Arc::new(PoolState::default());
        let moving = hash(7);
        let as_live = ReconcileResult {
            live_tickets: HashMap::from([(moving, "msA".to_string())]),
            ignored_low_fee_tickets: HashMap::new(),
        };
        let as_ignored = ReconcileResult {
            live_tickets: HashMap::new(),
            ignored_low_fee_tickets: HashMap::from([(moving, "msA".to_string())]),
        };

        let writer = {
            let state = std::sync::Arc::clone(&state);
            tokio::spawn(async move {
                for i in 0..500 {
                    let next = if i % 2 == 0 { &as_live } else { &as_ignored };
                    state.record_reconciliation(next).await;
                    tokio::task::yield_now().await;
                }
            })
        };

        for _ in 0..500 {
            let seen = state.published().await;
            assert!(
                !(seen.live_tickets.contains_key(&moving)
                    && seen.ignored_low_fee_tickets.contains_key(&moving)),
                "ticket published as both live and ignored"
            );
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
    }
}
