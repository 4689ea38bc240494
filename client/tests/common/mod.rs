use std::collections::HashMap;
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Root};
use log4rs::Config;
use tonkit_client::block::BlockHandler;
use tonkit_client::transport::{AccountState, BlockHeader, ShardBlock, TonTransport};
use tonkit_client::TonClientError;
use tonkit_core::TonAddress;

#[allow(dead_code)]
static LOG: Once = Once::new();

#[allow(dead_code)]
pub fn init_logging() {
    LOG.call_once(|| {
        let stderr = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(log4rs::encode::pattern::PatternEncoder::new(
                "{d(%Y-%m-%d %H:%M:%S%.6f)} {T:>15.15} {h({l:>5.5})} {t}:{L} - {m}{n}",
            )))
            .build();

        let config = Config::builder()
            .appender(Appender::builder().build("stderr", Box::new(stderr)))
            .build(Root::builder().appender("stderr").build(LevelFilter::Info))
            .unwrap();

        log4rs::init_config(config).unwrap();
    })
}

/// In-memory network: headers are registered up front, sent messages are recorded.
#[allow(dead_code)]
#[derive(Default)]
pub struct MockTransport {
    pub last_mc_seqno: Mutex<u32>,
    pub headers: Mutex<HashMap<ShardBlock, BlockHeader>>,
    pub shards: Mutex<HashMap<u32, Vec<ShardBlock>>>,
    pub accounts: Mutex<HashMap<TonAddress, AccountState>>,
    pub sent: Mutex<Vec<Vec<u8>>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new(last_mc_seqno: u32) -> MockTransport {
        let transport = MockTransport::default();
        *transport.last_mc_seqno.lock().unwrap() = last_mc_seqno;
        transport
    }

    pub fn add_header(&self, block: ShardBlock, end_lt: u64, prev_blocks: Vec<ShardBlock>) {
        let header = BlockHeader {
            id: block,
            start_lt: end_lt.saturating_sub(10),
            end_lt,
            gen_utime: 1_700_000_000,
            prev_blocks,
        };
        self.headers.lock().unwrap().insert(block, header);
    }

    pub fn add_masterchain_block(&self, seqno: u32, end_lt: u64, shards: Vec<ShardBlock>) {
        self.add_header(ShardBlock::masterchain(seqno), end_lt, vec![]);
        self.shards.lock().unwrap().insert(seqno, shards);
    }

    fn header(&self, block: &ShardBlock) -> Result<BlockHeader, TonClientError> {
        self.headers
            .lock()
            .unwrap()
            .get(block)
            .cloned()
            .ok_or_else(|| TonClientError::transport_error("get_block_header", "unknown block"))
    }
}

#[async_trait]
impl TonTransport for MockTransport {
    async fn send_boc(&self, boc: &[u8]) -> Result<(), TonClientError> {
        self.sent.lock().unwrap().push(boc.to_vec());
        Ok(())
    }

    async fn get_account_state(
        &self,
        address: &TonAddress,
    ) -> Result<AccountState, TonClientError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_masterchain_seqno(&self) -> Result<u32, TonClientError> {
        Ok(*self.last_mc_seqno.lock().unwrap())
    }

    async fn get_masterchain_block_header(
        &self,
        seqno: u32,
    ) -> Result<BlockHeader, TonClientError> {
        self.header(&ShardBlock::masterchain(seqno))
    }

    async fn get_block_shards(&self, mc_seqno: u32) -> Result<Vec<ShardBlock>, TonClientError> {
        self.shards
            .lock()
            .unwrap()
            .get(&mc_seqno)
            .cloned()
            .ok_or_else(|| TonClientError::transport_error("get_block_shards", "unknown block"))
    }

    async fn get_block_header(&self, block: &ShardBlock) -> Result<BlockHeader, TonClientError> {
        self.header(block)
    }
}

/// Remembers handled blocks, fails for the blocks listed in `failing`.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingHandler {
    pub blocks: Mutex<Vec<ShardBlock>>,
    pub failing: Mutex<Vec<ShardBlock>>,
}

#[async_trait]
impl BlockHandler for RecordingHandler {
    async fn on_block(
        &self,
        header: &BlockHeader,
        _shards: Option<&[ShardBlock]>,
    ) -> Result<(), TonClientError> {
        if self.failing.lock().unwrap().contains(&header.id) {
            return Err(TonClientError::InternalError(format!(
                "handler failed for {:?}",
                header.id
            )));
        }
        self.blocks.lock().unwrap().push(header.id);
        Ok(())
    }
}
