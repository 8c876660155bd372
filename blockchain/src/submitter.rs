use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::block_storage::BlockStorage;
use crate::chain_state::ChainStateStorage;
use crate::errors::BlockChainError;
use crate::parent_chain::ParentChain;
use crate::worker::{PeriodicTask, Progress};
use crate::BLOCKCHAIN_LOG_TARGET;

/// Anchors committed block roots on the parent chain, one block per tick.
pub struct RootSubmitter {
    parent: Arc<dyn ParentChain>,
    blocks: Arc<BlockStorage>,
    chain_state: Arc<ChainStateStorage>,
    block_step: u32,
}

impl RootSubmitter {
    pub fn new(
        parent: Arc<dyn ParentChain>,
        blocks: Arc<BlockStorage>,
        chain_state: Arc<ChainStateStorage>,
        block_step: u32,
    ) -> Self {
        Self {
            parent,
            blocks,
            chain_state,
            block_step,
        }
    }

    /// Submits the root of the block after the last submitted one, if it exists.
    pub async fn submit_next(&self) -> Result<Progress> {
        let next = self
            .chain_state
            .last_submitted_block()?
            .checked_add(self.block_step)
            .ok_or(BlockChainError::BlockNumberOverflow)?;

        if self.parent.current_anchored_block().await? >= next {
            self.chain_state.set_last_submitted_block(next)?;
            info!(target: BLOCKCHAIN_LOG_TARGET, block_number = next, "Block already anchored");
            return Ok(Progress::Advanced);
        }

        let block = match self.blocks.get_block(next)? {
            Some(block) => block,
            None => return Ok(Progress::Idle),
        };
        self.parent.submit_root(next, *block.merkle_root()).await?;
        self.chain_state.set_last_submitted_block(next)?;
        info!(target: BLOCKCHAIN_LOG_TARGET, block_number = next, root = ?block.merkle_root(), "Submitted block root");
        Ok(Progress::Advanced)
    }
}

#[async_trait]
impl PeriodicTask for RootSubmitter {
    fn name(&self) -> &'static str {
        "root_submitter"
    }

    async fn tick(&self) -> Result<Progress> {
        self.submit_next().await
    }
}
