use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::TonClientError;
use crate::transport::ShardBlock;

/// Keeps track of the blocks already handed to a [`BlockHandler`](super::BlockHandler).
///
/// Each method must be atomic, a persistent implementation should run it in a
/// single transaction.
#[async_trait]
pub trait BlockStorage: Send + Sync {
    /// Marks the masterchain block processed and queues its shard blocks. Shard blocks
    /// already known to the storage are ignored.
    async fn insert_blocks(
        &self,
        mc_seqno: u32,
        shard_blocks: &[ShardBlock],
    ) -> Result<(), TonClientError>;

    async fn last_masterchain_block(&self) -> Result<Option<u32>, TonClientError>;

    /// Marks the shard block processed and queues its predecessors.
    async fn set_block_processed(
        &self,
        block: &ShardBlock,
        prev_blocks: &[ShardBlock],
    ) -> Result<(), TonClientError>;

    /// Any queued shard block, order is not specified.
    async fn unprocessed_shard_block(&self) -> Result<Option<ShardBlock>, TonClientError>;
}

#[derive(Default)]
struct Inner {
    masterchain_blocks: BTreeSet<u32>,
    /// block -> processed
    shard_blocks: BTreeMap<ShardBlock, bool>,
}

impl Inner {
    fn queue_shard_blocks(&mut self, blocks: &[ShardBlock]) {
        for block in blocks {
            if !self.shard_blocks.contains_key(block) {
                log::trace!("Queued shard block {:?}", block);
                self.shard_blocks.insert(*block, false);
            }
        }
    }
}

#[derive(Default)]
pub struct InMemoryBlockStorage {
    inner: Mutex<Inner>,
}

impl InMemoryBlockStorage {
    pub fn new() -> InMemoryBlockStorage {
        Self::default()
    }

    pub async fn is_processed(&self, block: &ShardBlock) -> bool {
        let inner = self.inner.lock().await;
        if block.is_masterchain() {
            inner.masterchain_blocks.contains(&block.seqno)
        } else {
            inner.shard_blocks.get(block).copied().unwrap_or(false)
        }
    }
}

#[async_trait]
impl BlockStorage for InMemoryBlockStorage {
    async fn insert_blocks(
        &self,
        mc_seqno: u32,
        shard_blocks: &[ShardBlock],
    ) -> Result<(), TonClientError> {
        let mut inner = self.inner.lock().await;
        if !inner.masterchain_blocks.insert(mc_seqno) {
            return Err(TonClientError::storage_error(format!(
                "Masterchain block {} already exists",
                mc_seqno
            )));
        }
        inner.queue_shard_blocks(shard_blocks);
        Ok(())
    }

    async fn last_masterchain_block(&self) -> Result<Option<u32>, TonClientError> {
        Ok(self.inner.lock().await.masterchain_blocks.last().copied())
    }

    async fn set_block_processed(
        &self,
        block: &ShardBlock,
        prev_blocks: &[ShardBlock],
    ) -> Result<(), TonClientError> {
        let mut inner = self.inner.lock().await;
        match inner.shard_blocks.get_mut(block) {
            Some(processed) => *processed = true,
            None => {
                return Err(TonClientError::storage_error(format!(
                    "Shard block {:?} does not exist",
                    block
                )))
            }
        }
        inner.queue_shard_blocks(prev_blocks);
        Ok(())
    }

    async fn unprocessed_shard_block(&self) -> Result<Option<ShardBlock>, TonClientError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .shard_blocks
            .iter()
            .find(|(_, processed)| !**processed)
            .map(|(block, _)| *block))
    }
}
