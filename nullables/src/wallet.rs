//! Nullable wallet: scripted tickets and ticket transactions.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use stakepool_core::WalletRpc;
use stakepool_rpc::{GetTransactionDetails, GetTransactionResult, RpcError};
use stakepool_types::{ChainHash, MsgTx, OutPoint, TicketCommitment, TxIn, TxOut, TxSerializeType};

/// A wallet holding a fixed list of tickets.
///
/// `gettransaction` replies resolve after one scheduler yield, so requests
/// issued together really are outstanding together.
pub struct NullWallet {
    tickets: Mutex<Vec<ChainHash>>,
    transactions: Mutex<HashMap<ChainHash, GetTransactionResult>>,
    failing: Mutex<HashSet<ChainHash>>,
    listing_error: Mutex<Option<String>>,
    stalled: AtomicBool,
    get_tickets_calls: AtomicUsize,
    transaction_calls: Mutex<Vec<ChainHash>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl NullWallet {
    pub fn new() -> Self {
        Self {
            tickets: Mutex::new(Vec::new()),
            transactions: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            listing_error: Mutex::new(None),
            stalled: AtomicBool::new(false),
            get_tickets_calls: AtomicUsize::new(0),
            transaction_calls: Mutex::new(Vec::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// List `ticket` and answer `gettransaction` for it with `tx`.
    pub fn add_ticket(&self, ticket: ChainHash, tx: GetTransactionResult) {
        self.tickets.lock().unwrap().push(ticket);
        self.transactions.lock().unwrap().insert(ticket, tx);
    }

    /// List `ticket` but fail every `gettransaction` for it.
    pub fn add_failing_ticket(&self, ticket: ChainHash) {
        self.tickets.lock().unwrap().push(ticket);
        self.failing.lock().unwrap().insert(ticket);
    }

    /// Make `gettickets` fail with `message`.
    pub fn fail_listing(&self, message: impl Into<String>) {
        *self.listing_error.lock().unwrap() = Some(message.into());
    }

    /// Make `gettransaction` replies never arrive.
    pub fn stall_transactions(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn get_tickets_calls(&self) -> usize {
        self.get_tickets_calls.load(Ordering::SeqCst)
    }

    /// Tickets `gettransaction` was issued for, in issue order.
    pub fn transaction_calls(&self) -> Vec<ChainHash> {
        self.transaction_calls.lock().unwrap().clone()
    }

    /// Requests issued but neither answered nor abandoned.
    pub fn outstanding(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously outstanding requests seen.
    pub fn max_outstanding(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for NullWallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts one outstanding request until dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(in_flight: &Arc<AtomicUsize>, max: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(Arc::clone(in_flight))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WalletRpc for NullWallet {
    fn get_tickets(&self, _include_immature: bool) -> BoxFuture<'_, Result<Vec<ChainHash>, RpcError>> {
        self.get_tickets_calls.fetch_add(1, Ordering::SeqCst);
        let result = match self.listing_error.lock().unwrap().clone() {
            Some(message) => Err(RpcError::Server { code: -1, message }),
            None => Ok(self.tickets.lock().unwrap().clone()),
        };
        futures_util::future::ready(result).boxed()
    }

    fn get_transaction_async(
        &self,
        hash: &ChainHash,
    ) -> BoxFuture<'static, Result<GetTransactionResult, RpcError>> {
        self.transaction_calls.lock().unwrap().push(*hash);

        let result = if self.failing.lock().unwrap().contains(hash) {
            Err(RpcError::Server {
                code: -5,
                message: format!("no information for transaction {hash}"),
            })
        } else {
            self.transactions
                .lock()
                .unwrap()
                .get(hash)
                .cloned()
                .ok_or_else(|| RpcError::Server {
                    code: -5,
                    message: format!("no information for transaction {hash}"),
                })
        };

        let guard = InFlight::enter(&self.in_flight, &self.max_in_flight);
        let stalled = self.stalled.load(Ordering::SeqCst);
        async move {
            let _guard = guard;
            tokio::task::yield_now().await;
            if stalled {
                std::future::pending::<()>().await;
            }
            result
        }
        .boxed()
    }
}

/// A ticket purchase whose bytes are unique to `seed`.
///
/// Output 0 pays the 1 coin ticket price, output 1 commits 0.05 coin to a
/// fee key hash of `[seed; 20]`, output 2 is the change commitment.
pub fn null_ticket_tx(seed: u8) -> MsgTx {
    let commitment = |hash160: [u8; 20], amount: i64| TicketCommitment {
        hash160,
        amount,
        is_p2sh: false,
        fee_limits: 0x5800,
    };

    MsgTx {
        ser_type: TxSerializeType::Full,
        version: 1,
        tx_in: vec![TxIn {
            previous_out_point: OutPoint {
                hash: ChainHash::new([seed; 32]),
                index: 0,
                tree: 0,
            },
            sequence: u32::MAX,
            value_in: 100_000_000,
            block_height: 0,
            block_index: 0,
            signature_script: vec![0x51],
        }],
        tx_out: vec![
            TxOut {
                value: 100_000_000,
                version: 0,
                pk_script: {
                    let mut script = vec![0xba, 0xa9, 0x14];
                    script.extend_from_slice(&[seed; 20]);
                    script.push(0x87);
                    script
                },
            },
            TxOut {
                value: 0,
                version: 0,
                pk_script: commitment([seed; 20], 5_000_000).to_pk_script(),
            },
            TxOut {
                value: 0,
                version: 0,
                pk_script: commitment([seed.wrapping_add(1); 20], 95_000_000).to_pk_script(),
            },
        ],
        lock_time: u32::from(seed),
        expiry: 0,
    }
}

/// The `gettransaction` reply for a ticket owned by `address`.
///
/// `block` is the purchase block; `None` means unmined.
pub fn ticket_transaction(
    ticket: ChainHash,
    address: &str,
    block: Option<ChainHash>,
    tx: &MsgTx,
) -> GetTransactionResult {
    GetTransactionResult {
        txid: ticket.to_string(),
        confirmations: i64::from(block.is_some()),
        block_hash: block.map(|b| b.to_string()).unwrap_or_default(),
        details: vec![GetTransactionDetails {
            account: "default".into(),
            address: address.to_string(),
            category: "send".into(),
            vout: 0,
            ..Default::default()
        }],
        hex: tx.to_hex(),
        ..Default::default()
    }
}
