use async_trait::async_trait;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tonkit_core::cell::{BagOfCells, TonCellError};
use tonkit_core::types::{ShardId, MASTERCHAIN};
use tonkit_core::TonAddress;

use crate::error::TonClientError;

/// Block of a shardchain, or of the masterchain when `workchain` is `-1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardBlock {
    pub workchain: i32,
    pub shard: ShardId,
    pub seqno: u32,
}

impl ShardBlock {
    pub fn new(workchain: i32, shard: ShardId, seqno: u32) -> ShardBlock {
        ShardBlock {
            workchain,
            shard,
            seqno,
        }
    }

    pub fn masterchain(seqno: u32) -> ShardBlock {
        ShardBlock::new(MASTERCHAIN, ShardId::ROOT, seqno)
    }

    pub fn is_masterchain(&self) -> bool {
        self.workchain == MASTERCHAIN
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub id: ShardBlock,
    pub start_lt: u64,
    pub end_lt: u64,
    pub gen_utime: u32,
    pub prev_blocks: Vec<ShardBlock>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Nanotons
    pub balance: BigUint,
    /// Serialized bag of cells with the contract code, `None` for uninitialized accounts.
    pub code: Option<Vec<u8>>,
    /// Serialized bag of cells with the contract data.
    pub data: Option<Vec<u8>>,
    pub last_transaction_lt: u64,
}

impl AccountState {
    pub fn is_active(&self) -> bool {
        self.code.is_some()
    }

    pub fn code(&self) -> Result<Option<BagOfCells>, TonCellError> {
        self.code.as_deref().map(BagOfCells::parse).transpose()
    }

    pub fn data(&self) -> Result<Option<BagOfCells>, TonCellError> {
        self.data.as_deref().map(BagOfCells::parse).transpose()
    }
}

/// Access to a node of the network. Implementations own the wire protocol, this crate
/// only consumes and produces bags of cells.
#[async_trait]
pub trait TonTransport: Send + Sync {
    /// Broadcasts a serialized external message.
    async fn send_boc(&self, boc: &[u8]) -> Result<(), TonClientError>;

    async fn get_account_state(&self, address: &TonAddress)
        -> Result<AccountState, TonClientError>;

    /// Seqno of the last masterchain block.
    async fn get_masterchain_seqno(&self) -> Result<u32, TonClientError>;

    async fn get_masterchain_block_header(&self, seqno: u32)
        -> Result<BlockHeader, TonClientError>;

    /// Shard blocks referenced by the masterchain block.
    async fn get_block_shards(&self, mc_seqno: u32) -> Result<Vec<ShardBlock>, TonClientError>;

    async fn get_block_header(&self, block: &ShardBlock) -> Result<BlockHeader, TonClientError>;
}
