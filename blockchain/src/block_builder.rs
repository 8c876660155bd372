use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use storage::{KeyValueDB, WriteBatch};
use txpool::{BlockCandidate, TxPool};
use types::Block;

use crate::block_storage::BlockStorage;
use crate::chain_state::{ChainStateStorage, LAST_BLOCK_NUMBER};
use crate::utxo::UtxoStorage;
use crate::worker::{PeriodicTask, Progress};
use crate::BLOCKCHAIN_LOG_TARGET;

/// Cuts the oldest pending batch of the pool into a block.
pub struct BlockBuilder {
    db: Arc<dyn KeyValueDB>,
    txpool: Arc<TxPool>,
}

/// Everything a committed block changes, as one batch.
pub fn block_write_batch(block: &Block, candidate: &BlockCandidate<'_>) -> Result<WriteBatch> {
    let mut batch = WriteBatch::new();
    batch.put::<BlockStorage>(&block.number(), block)?;
    batch.put::<ChainStateStorage>(&LAST_BLOCK_NUMBER.to_string(), &(block.number() as u64))?;
    for (position, output) in candidate.outputs.iter() {
        batch.put::<UtxoStorage>(position, output)?;
    }
    for position in candidate.spent.iter() {
        batch.delete::<UtxoStorage>(position)?;
    }
    Ok(batch)
}

impl BlockBuilder {
    pub fn new(db: Arc<dyn KeyValueDB>, txpool: Arc<TxPool>) -> Self {
        Self { db, txpool }
    }

    /// Builds and persists the next block. `None` when nothing is pending.
    /// On error the pool keeps the batch and the store is untouched.
    pub fn create_block(&self) -> Result<Option<Block>> {
        let block = self.txpool.commit_next(|candidate| {
            let block = Block::new(candidate.number, candidate.transactions.to_vec())?;
            let batch = block_write_batch(&block, candidate)?;
            self.db.write(batch)?;
            Ok(block)
        })?;
        if let Some(block) = &block {
            info!(
                target: BLOCKCHAIN_LOG_TARGET,
                block_number = block.number(),
                transactions = block.transactions().len(),
                root = ?block.merkle_root(),
                "Created block"
            );
        }
        Ok(block)
    }
}

#[async_trait]
impl PeriodicTask for BlockBuilder {
    fn name(&self) -> &'static str {
        "block_builder"
    }

    async fn tick(&self) -> Result<Progress> {
        match self.create_block()? {
            Some(_) => Ok(Progress::Advanced),
            None => Ok(Progress::Idle),
        }
    }
}
