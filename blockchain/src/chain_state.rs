use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use storage::{KVStore, Schema};

use crate::errors::BlockChainError;
use crate::BLOCKCHAIN_LOG_TARGET;

pub type ChainStateStorageKV = dyn KVStore<ChainStateStorage> + Send + Sync;

pub const LAST_BLOCK_NUMBER: &str = "lastBlockNumber";
pub const LAST_SUBMITTED_BLOCK: &str = "lastSubmittedBlock";
pub const LAST_EVENT_PROCESSED_BLOCK: &str = "lastEventProcessedBlock";

/// Singleton counters of the chain.
pub struct ChainStateStorage {
    kv: Arc<ChainStateStorageKV>,
}

impl Schema for ChainStateStorage {
    type Key = String;
    type Value = u64;

    fn column() -> &'static str {
        "chain_state"
    }
}

fn to_block_number(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| BlockChainError::BlockNumberOutOfRange(value).into())
}

impl ChainStateStorage {
    pub fn new(kv: Arc<ChainStateStorageKV>) -> Self {
        Self { kv }
    }

    fn get(&self, key: &str) -> Result<Option<u64>> {
        self.kv.get(&key.to_string())
    }

    fn set(&self, key: &str, value: u64) -> Result<()> {
        self.kv.put(key.to_string(), value)
    }

    /// Reads the last committed block number, writing `0` on a fresh store.
    pub fn initialize(&self) -> Result<u32> {
        match self.get(LAST_BLOCK_NUMBER)? {
            Some(value) => {
                let block_number = to_block_number(value)?;
                info!(target: BLOCKCHAIN_LOG_TARGET, block_number, "Restored chain state");
                Ok(block_number)
            }
            None => {
                self.set(LAST_BLOCK_NUMBER, 0)?;
                info!(target: BLOCKCHAIN_LOG_TARGET, "Chain state initialized");
                Ok(0)
            }
        }
    }

    pub fn last_block_number(&self) -> Result<u32> {
        self.get(LAST_BLOCK_NUMBER)?
            .map(to_block_number)
            .unwrap_or(Ok(0))
    }

    pub fn last_submitted_block(&self) -> Result<u32> {
        self.get(LAST_SUBMITTED_BLOCK)?
            .map(to_block_number)
            .unwrap_or(Ok(0))
    }

    pub fn set_last_submitted_block(&self, block_number: u32) -> Result<()> {
        self.set(LAST_SUBMITTED_BLOCK, block_number as u64)
    }

    pub fn last_event_processed_block(&self) -> Result<u64> {
        Ok(self.get(LAST_EVENT_PROCESSED_BLOCK)?.unwrap_or_default())
    }

    pub fn set_last_event_processed_block(&self, parent_block: u64) -> Result<()> {
        self.set(LAST_EVENT_PROCESSED_BLOCK, parent_block)
    }
}
