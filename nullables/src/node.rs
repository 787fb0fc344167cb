//! Nullable node: scripted block heights.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use stakepool_core::NodeRpc;
use stakepool_rpc::{BlockHeaderResult, RpcError};
use stakepool_types::ChainHash;

/// A node that knows a fixed set of blocks.
pub struct NullNode {
    heights: Mutex<HashMap<ChainHash, u32>>,
    failing: Mutex<HashSet<ChainHash>>,
    header_calls: Mutex<HashMap<ChainHash, usize>>,
}

impl NullNode {
    pub fn new() -> Self {
        Self {
            heights: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            header_calls: Mutex::new(HashMap::new()),
        }
    }

    /// Make `block` known at `height`.
    pub fn add_block(&self, block: ChainHash, height: u32) {
        self.heights.lock().unwrap().insert(block, height);
    }

    /// Make header lookups for `block` fail.
    pub fn fail_block(&self, block: ChainHash) {
        self.failing.lock().unwrap().insert(block);
    }

    /// `getblockheader` calls made for `block`.
    pub fn header_calls(&self, block: &ChainHash) -> usize {
        self.header_calls
            .lock()
            .unwrap()
            .get(block)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_header_calls(&self) -> usize {
        self.header_calls.lock().unwrap().values().sum()
    }
}

impl Default for NullNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRpc for NullNode {
    fn get_block_header<'a>(
        &'a self,
        hash: &'a ChainHash,
    ) -> BoxFuture<'a, Result<BlockHeaderResult, RpcError>> {
        *self.header_calls.lock().unwrap().entry(*hash).or_default() += 1;

        let result = if self.failing.lock().unwrap().contains(hash) {
            Err(RpcError::Server {
                code: -5,
                message: format!("block {hash} not found"),
            })
        } else {
            match self.heights.lock().unwrap().get(hash) {
                Some(&height) => Ok(BlockHeaderResult {
                    hash: hash.to_string(),
                    height,
                    confirmations: 1,
                    ..Default::default()
                }),
                None => Err(RpcError::Server {
                    code: -5,
                    message: format!("block {hash} not found"),
                }),
            }
        };
        futures_util::future::ready(result).boxed()
    }
}
