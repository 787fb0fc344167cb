//! Block hash → height memo for one reconciliation pass.

use std::collections::HashMap;

use stakepool_types::ChainHash;

use crate::rpc::NodeRpc;
use crate::TicketError;

/// Heights of the blocks tickets were bought in.
///
/// Many tickets share a purchase block, so each distinct block costs at most
/// one `getblockheader` round-trip. Failed lookups are not cached. Lives for
/// a single pass and is never shared.
#[derive(Debug, Default)]
pub struct BlockHeightCache {
    heights: HashMap<ChainHash, i64>,
    lookups: usize,
}

impl BlockHeightCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Height of `block`, asking the node on a miss.
    pub async fn height_of<N>(&mut self, node: &N, block: &ChainHash) -> Result<i64, TicketError>
    where
        N: NodeRpc + ?Sized,
    {
        if let Some(&height) = self.heights.get(block) {
            return Ok(height);
        }

        self.lookups += 1;
        let header = node
            .get_block_header(block)
            .await
            .map_err(|source| TicketError::BlockHeaderLookup {
                block: *block,
                source,
            })?;
        let height = i64::from(header.height);
        self.heights.insert(*block, height);
        Ok(height)
    }

    pub fn get(&self, block: &ChainHash) -> Option<i64> {
        self.heights.get(block).copied()
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// Node round-trips made so far, including failed ones.
    pub fn lookups(&self) -> usize {
        self.lookups
    }
}
