use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use primitive_types::U256;
use tracing::{error, info, trace};

use crypto::ecdsa::SecretKey;
use storage::{KVStore, Schema};
use txpool::TxPool;
use types::Transaction;

use crate::chain_state::ChainStateStorage;
use crate::errors::BlockChainError;
use crate::parent_chain::{DepositEvent, ParentChain};
use crate::worker::{PeriodicTask, Progress};
use crate::BLOCKCHAIN_LOG_TARGET;

pub type DepositStorageKV = dyn KVStore<DepositStorage> + Send + Sync;

const PROCESSED: u8 = 1;

/// Processed markers keyed by parent chain deposit index.
pub struct DepositStorage {
    kv: Arc<DepositStorageKV>,
}

impl Schema for DepositStorage {
    type Key = U256;
    type Value = u8;

    fn column() -> &'static str {
        "deposit"
    }
}

impl DepositStorage {
    pub fn new(kv: Arc<DepositStorageKV>) -> Self {
        Self { kv }
    }

    pub fn is_processed(&self, deposit_index: &U256) -> Result<bool> {
        self.kv.contains(deposit_index)
    }

    pub fn mark_processed(&self, deposit_index: U256) -> Result<()> {
        self.kv.put(deposit_index, PROCESSED)
    }

    pub fn processed(&self) -> Result<Vec<U256>> {
        let mut indices = Vec::new();
        for (k, _) in self.kv.iter()? {
            indices.push(k?);
        }
        Ok(indices)
    }
}

/// Turns parent chain deposits into operator signed deposit transactions.
pub struct DepositHandler {
    deposits: Arc<DepositStorage>,
    txpool: Arc<TxPool>,
    operator: SecretKey,
}

impl DepositHandler {
    pub fn new(deposits: Arc<DepositStorage>, txpool: Arc<TxPool>, operator: SecretKey) -> Self {
        Self {
            deposits,
            txpool,
            operator,
        }
    }

    /// Submits the deposit transaction for `event` unless its index was seen
    /// before. The marker is written first, so a replayed event never mints twice.
    pub fn process_deposit_event(&self, event: &DepositEvent) -> Result<Option<Transaction>> {
        if self.deposits.is_processed(&event.deposit_index)? {
            trace!(target: BLOCKCHAIN_LOG_TARGET, deposit_index = %event.deposit_index, "Deposit already processed");
            return Ok(None);
        }
        self.deposits.mark_processed(event.deposit_index)?;

        let mut tx = Transaction::deposit(event.depositor, event.amount);
        tx.sign(0, &self.operator)?;
        if !tx.validate() {
            error!(target: BLOCKCHAIN_LOG_TARGET, deposit_index = %event.deposit_index, "Deposit transaction failed validation");
            return Err(BlockChainError::InvalidDeposit(event.deposit_index).into());
        }
        self.txpool.submit(tx.clone());
        info!(target: BLOCKCHAIN_LOG_TARGET, deposit_index = %event.deposit_index, depositor = ?event.depositor, amount = %event.amount, "Created deposit transaction");
        Ok(Some(tx))
    }

    pub fn processed(&self) -> Result<Vec<U256>> {
        self.deposits.processed()
    }
}

/// Follows the parent chain one block per tick and feeds its deposit events
/// to the [`DepositHandler`].
pub struct DepositWatcher {
    parent: Arc<dyn ParentChain>,
    chain_state: Arc<ChainStateStorage>,
    handler: Arc<DepositHandler>,
}

impl DepositWatcher {
    pub fn new(
        parent: Arc<dyn ParentChain>,
        chain_state: Arc<ChainStateStorage>,
        handler: Arc<DepositHandler>,
    ) -> Self {
        Self {
            parent,
            chain_state,
            handler,
        }
    }
}

#[async_trait]
impl PeriodicTask for DepositWatcher {
    fn name(&self) -> &'static str {
        "deposit_watcher"
    }

    async fn tick(&self) -> Result<Progress> {
        let processed = self.chain_state.last_event_processed_block()?;
        let latest = self.parent.latest_block_number().await?;
        if latest <= processed {
            return Ok(Progress::Idle);
        }
        let parent_block = processed + 1;
        let events = self
            .parent
            .poll_deposit_events(parent_block, parent_block)
            .await?;
        for event in events.iter() {
            self.handler.process_deposit_event(event)?;
        }
        self.chain_state
            .set_last_event_processed_block(parent_block)?;
        trace!(target: BLOCKCHAIN_LOG_TARGET, parent_block, deposits = events.len(), "Processed parent block");
        Ok(Progress::Advanced)
    }
}
