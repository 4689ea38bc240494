use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::BlockStorage;
use crate::error::TonClientError;
use crate::transport::{BlockHeader, ShardBlock, TonTransport};

pub const DEFAULT_MC_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_SHARDS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockSubscriptionConfig {
    /// Masterchain block to start from, the last block of the network when not set.
    pub start_mc_block_number: Option<u32>,
    #[serde(rename = "mc_interval_ms", with = "duration_millis")]
    pub mc_interval: Duration,
    #[serde(rename = "shards_interval_ms", with = "duration_millis")]
    pub shards_interval: Duration,
}

impl Default for BlockSubscriptionConfig {
    fn default() -> Self {
        BlockSubscriptionConfig {
            start_mc_block_number: None,
            mc_interval: DEFAULT_MC_INTERVAL,
            shards_interval: DEFAULT_SHARDS_INTERVAL,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Receives every new block of the network.
///
/// Masterchain blocks arrive in order together with their shard blocks. Shard blocks
/// arrive in no particular order. A failed call leaves the block unprocessed and it is
/// offered again on a later tick.
#[async_trait]
pub trait BlockHandler: Send + Sync {
    async fn on_block(
        &self,
        header: &BlockHeader,
        shards: Option<&[ShardBlock]>,
    ) -> Result<(), TonClientError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartPoint {
    pub mc_seqno: u32,
    /// Shard blocks ending before this logical time are skipped.
    pub start_lt: u64,
}

struct TickGuard<'a>(&'a AtomicBool);

impl<'a> TickGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<TickGuard<'a>> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickGuard(flag))
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Polls the network for new masterchain blocks and walks the shard blocks they
/// reference, remembering the progress in a [`BlockStorage`].
pub struct BlockSubscription {
    transport: Arc<dyn TonTransport>,
    storage: Arc<dyn BlockStorage>,
    handler: Arc<dyn BlockHandler>,
    config: BlockSubscriptionConfig,
    start: OnceCell<StartPoint>,
    mc_processing: AtomicBool,
    shards_processing: AtomicBool,
}

impl BlockSubscription {
    pub fn new(
        transport: Arc<dyn TonTransport>,
        storage: Arc<dyn BlockStorage>,
        handler: Arc<dyn BlockHandler>,
        config: BlockSubscriptionConfig,
    ) -> BlockSubscription {
        BlockSubscription {
            transport,
            storage,
            handler,
            config,
            start: OnceCell::new(),
            mc_processing: AtomicBool::new(false),
            shards_processing: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BlockSubscriptionConfig {
        &self.config
    }

    /// Resolved on first use and kept for the lifetime of the subscription.
    pub async fn start_point(&self) -> Result<StartPoint, TonClientError> {
        let start = self
            .start
            .get_or_try_init(|| async {
                let mc_seqno = match self.config.start_mc_block_number {
                    Some(seqno) => seqno,
                    None => self.transport.get_masterchain_seqno().await?,
                };
                let header = self.transport.get_masterchain_block_header(mc_seqno).await?;
                Ok::<_, TonClientError>(StartPoint {
                    mc_seqno,
                    start_lt: header.end_lt,
                })
            })
            .await?;
        Ok(*start)
    }

    /// Processes masterchain blocks between the last saved one and the last one of the
    /// network. Does nothing while a previous call is still running.
    pub async fn mc_tick(&self) -> Result<(), TonClientError> {
        let Some(_guard) = TickGuard::acquire(&self.mc_processing) else {
            log::trace!("Masterchain tick is already running");
            return Ok(());
        };
        let start = self.start_point().await?;
        let last_saved = self
            .storage
            .last_masterchain_block()
            .await?
            .unwrap_or(start.mc_seqno);
        let last_mc = self.transport.get_masterchain_seqno().await?;

        for mc_seqno in last_saved.saturating_add(1)..last_mc {
            let shards = self.transport.get_block_shards(mc_seqno).await?;
            let header = self.transport.get_masterchain_block_header(mc_seqno).await?;
            self.handler.on_block(&header, Some(&shards)).await?;
            self.storage.insert_blocks(mc_seqno, &shards).await?;
            log::debug!(
                "Masterchain block {} processed, {} shard blocks queued",
                mc_seqno,
                shards.len()
            );
        }
        Ok(())
    }

    /// Processes a single unprocessed shard block and returns it.
    pub async fn shards_tick(&self) -> Result<Option<ShardBlock>, TonClientError> {
        let Some(_guard) = TickGuard::acquire(&self.shards_processing) else {
            log::trace!("Shards tick is already running");
            return Ok(None);
        };
        let start = self.start_point().await?;
        let Some(block) = self.storage.unprocessed_shard_block().await? else {
            return Ok(None);
        };
        let header = self.transport.get_block_header(&block).await?;
        if header.end_lt < start.start_lt {
            log::trace!("Skipping shard block {:?} older than the start", block);
            self.storage.set_block_processed(&block, &[]).await?;
        } else {
            self.handler.on_block(&header, None).await?;
            self.storage
                .set_block_processed(&block, &header.prev_blocks)
                .await?;
            log::debug!("Shard block {:?} processed", block);
        }
        Ok(Some(block))
    }

    /// Runs both polling loops until `shutdown` resolves. Tick failures are logged and
    /// retried on the next tick.
    pub async fn run<F: Future<Output = ()>>(&self, shutdown: F) -> Result<(), TonClientError> {
        let start = self.start_point().await?;
        log::info!(
            "Block subscription started from masterchain block {} (lt: {})",
            start.mc_seqno,
            start.start_lt
        );

        let mc_loop = async {
            let mut interval = interval_at(Instant::now(), self.config.mc_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(e) = self.mc_tick().await {
                    log::warn!("Masterchain tick failed: {}", e);
                }
            }
        };
        let shards_loop = async {
            let mut interval = interval_at(
                Instant::now() + self.config.shards_interval,
                self.config.shards_interval,
            );
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(e) = self.shards_tick().await {
                    log::warn!("Shards tick failed: {}", e);
                }
            }
        };

        tokio::select! {
            _ = shutdown => {
                log::info!("Block subscription stopped");
            }
            _ = join(mc_loop, shards_loop) => {}
        }
        Ok(())
    }
}
