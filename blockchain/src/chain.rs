use std::sync::Arc;

use anyhow::Result;
use primitive_types::U256;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crypto::ecdsa::SecretKey;
use storage::KeyValueDB;
use txpool::{InputResolution, TxPool, TxPoolConfig, TxPoolError, UtxoReader};
use types::config::EnvironmentConfig;
use types::{Address, Block, Output, Transaction, UtxoPosition};

use crate::block_builder::BlockBuilder;
use crate::block_storage::BlockStorage;
use crate::chain_state::ChainStateStorage;
use crate::deposit::{DepositHandler, DepositStorage, DepositWatcher};
use crate::parent_chain::{DepositEvent, ParentChain};
use crate::submitter::RootSubmitter;
use crate::utxo::UtxoStorage;
use crate::worker::{spawn_periodic, Schedule};
use crate::BLOCKCHAIN_LOG_TARGET;

/// The operator's child chain: durable stores, the sequencer, and the
/// drivers that build blocks, anchor roots and ingest deposits.
pub struct ChildChain {
    config: EnvironmentConfig,
    txpool: Arc<TxPool>,
    blocks: Arc<BlockStorage>,
    utxos: Arc<UtxoStorage>,
    chain_state: Arc<ChainStateStorage>,
    deposits: Arc<DepositHandler>,
    builder: Arc<BlockBuilder>,
    submitter: Arc<RootSubmitter>,
    watcher: Arc<DepositWatcher>,
}

impl ChildChain {
    /// Opens the chain on `db`. Fails if the last block number cannot be
    /// read or initialized.
    pub fn initialize<D>(
        db: Arc<D>,
        parent: Arc<dyn ParentChain>,
        operator: SecretKey,
        config: &EnvironmentConfig,
    ) -> Result<Self>
    where
        D: KeyValueDB + 'static,
    {
        let blocks = Arc::new(BlockStorage::new(db.clone()));
        let utxos = Arc::new(UtxoStorage::new(db.clone()));
        let chain_state = Arc::new(ChainStateStorage::new(db.clone()));
        let deposit_storage = Arc::new(DepositStorage::new(db.clone()));

        let last_block_number = chain_state.initialize()?;
        let pool_config = TxPoolConfig {
            block_step: config.block_step,
            max_block_transactions: config.max_block_transactions,
            operator: operator.address(),
        };
        let durable: Arc<dyn UtxoReader> = utxos.clone();
        let txpool = Arc::new(TxPool::new(Some(&pool_config), durable, last_block_number));

        let deposits = Arc::new(DepositHandler::new(
            deposit_storage,
            txpool.clone(),
            operator.clone(),
        ));
        let builder = Arc::new(BlockBuilder::new(db, txpool.clone()));
        let submitter = Arc::new(RootSubmitter::new(
            parent.clone(),
            blocks.clone(),
            chain_state.clone(),
            txpool.config().block_step,
        ));
        let watcher = Arc::new(DepositWatcher::new(
            parent,
            chain_state.clone(),
            deposits.clone(),
        ));

        info!(target: BLOCKCHAIN_LOG_TARGET, last_block_number, operator = ?operator.address(), "Child chain initialized");
        Ok(Self {
            config: config.clone(),
            txpool,
            blocks,
            utxos,
            chain_state,
            deposits,
            builder,
            submitter,
            watcher,
        })
    }

    /// Spawns the block builder, root submitter and deposit watcher.
    pub fn start(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![
            spawn_periodic(
                self.builder.clone(),
                Schedule::from(self.config.block_creation),
                shutdown.clone(),
            ),
            spawn_periodic(
                self.submitter.clone(),
                Schedule::from(self.config.root_submission),
                shutdown.clone(),
            ),
            spawn_periodic(
                self.watcher.clone(),
                Schedule::from(self.config.deposit_polling),
                shutdown,
            ),
        ]
    }

    pub fn txpool(&self) -> Arc<TxPool> {
        self.txpool.clone()
    }

    pub fn block_builder(&self) -> Arc<BlockBuilder> {
        self.builder.clone()
    }

    pub fn root_submitter(&self) -> Arc<RootSubmitter> {
        self.submitter.clone()
    }

    pub fn deposit_watcher(&self) -> Arc<DepositWatcher> {
        self.watcher.clone()
    }

    /// Queues `tx`; the outcome is only logged.
    pub fn submit_transaction(&self, tx: Transaction) {
        self.txpool.submit(tx)
    }

    /// Checks `tx` against the current ledger and queues it if it passes.
    pub fn accept_transaction(&self, tx: Transaction) -> Result<InputResolution, TxPoolError> {
        let resolution = self.txpool.check_transaction(&tx)?;
        self.txpool.submit(tx);
        Ok(resolution)
    }

    pub fn process_deposit_event(&self, event: &DepositEvent) -> Result<Option<Transaction>> {
        self.deposits.process_deposit_event(event)
    }

    pub fn create_block(&self) -> Result<Option<Block>> {
        self.builder.create_block()
    }

    pub fn get_block(&self, block_number: u32) -> Result<Option<Block>> {
        self.blocks.get_block(block_number)
    }

    pub fn blocks(&self, from: u32, to: u32) -> Result<Vec<Block>> {
        self.blocks.blocks(from, to)
    }

    pub fn all_utxos(&self, owner: Option<&Address>) -> Result<Vec<(UtxoPosition, Output)>> {
        Ok(self.txpool.all_utxos(owner)?)
    }

    /// Outputs already written by committed blocks.
    pub fn durable_utxos(&self, owner: Option<&Address>) -> Result<Vec<(UtxoPosition, Output)>> {
        self.utxos.utxos(owner)
    }

    pub fn processed_deposits(&self) -> Result<Vec<U256>> {
        self.deposits.processed()
    }

    pub fn last_block_number(&self) -> Result<u32> {
        self.chain_state.last_block_number()
    }

    pub fn last_submitted_block(&self) -> Result<u32> {
        self.chain_state.last_submitted_block()
    }

    pub fn last_event_processed_block(&self) -> Result<u64> {
        self.chain_state.last_event_processed_block()
    }
}
