use std::sync::Arc;

use anyhow::Result;

use storage::{KVStore, Schema};
use types::Block;

pub type BlockStorageKV = dyn KVStore<BlockStorage> + Send + Sync;

/// Committed blocks keyed by block number.
pub struct BlockStorage {
    kv: Arc<BlockStorageKV>,
}

impl Schema for BlockStorage {
    type Key = u32;
    type Value = Block;

    fn column() -> &'static str {
        "block"
    }
}

impl BlockStorage {
    pub fn new(kv: Arc<BlockStorageKV>) -> Self {
        Self { kv }
    }

    pub fn get_block(&self, block_number: u32) -> Result<Option<Block>> {
        self.kv.get(&block_number)
    }

    pub fn contains(&self, block_number: u32) -> Result<bool> {
        self.kv.contains(&block_number)
    }

    /// Blocks numbered within `from..=to`, ascending.
    pub fn blocks(&self, from: u32, to: u32) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        for (_, block) in self.kv.range(&from, &to)? {
            blocks.push(block?);
        }
        Ok(blocks)
    }
}
