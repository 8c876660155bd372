use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, error, trace, warn};

use types::config::DEFAULT_BLOCK_STEP;
use types::{Address, Output, Transaction, UtxoPosition, MAX_BLOCK_TRANSACTIONS};

pub use crate::error::TxPoolError;
pub use crate::ledger::{BlockCandidate, InputResolution, InputSource, PendingBlock, ResolvedInput};
pub use crate::traits::UtxoReader;
use crate::ledger::PendingLedger;

mod error;
mod ledger;
#[cfg(test)]
mod tests;
mod traits;

pub const TXPOOL_LOG_TARGET: &str = "txpool";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxPoolConfig {
    pub block_step: u32,
    pub max_block_transactions: usize,
    /// Only this address may sign deposits.
    pub operator: Address,
}

const DEFAULT_TX_POOL_CONFIG: TxPoolConfig = TxPoolConfig {
    block_step: DEFAULT_BLOCK_STEP,
    max_block_transactions: MAX_BLOCK_TRANSACTIONS,
    operator: Address::zero(),
};

fn sanitize(conf: &TxPoolConfig) -> TxPoolConfig {
    let default = DEFAULT_TX_POOL_CONFIG;
    let mut conf = *conf;
    if conf.block_step < 1 {
        warn!(target : TXPOOL_LOG_TARGET, provided = ?conf.block_step, updated = ?default.block_step, "Sanitizing invalid txpool block step");
        conf.block_step = default.block_step
    }
    if conf.max_block_transactions < 1 || conf.max_block_transactions > MAX_BLOCK_TRANSACTIONS {
        warn!(target : TXPOOL_LOG_TARGET, provided = ?conf.max_block_transactions, updated = ?default.max_block_transactions, "Sanitizing invalid txpool max block transactions");
        conf.max_block_transactions = default.max_block_transactions
    }
    if conf.operator.is_zero() {
        warn!(target : TXPOOL_LOG_TARGET, "Txpool operator is the zero address, deposits will be rejected");
    }
    conf
}

/// Single writer transaction sequencer.
///
/// `submit` only enqueues. One drain pass at a time, guarded by `busy`,
/// validates queued transactions in order and applies them to the pending
/// ledger. A rejected transaction is logged and dropped.
pub struct TxPool {
    config: TxPoolConfig,
    durable: Arc<dyn UtxoReader>,
    ledger: Mutex<PendingLedger>,
    queue: Mutex<VecDeque<Transaction>>,
    busy: AtomicBool,
    idle: Notify,
}

impl TxPool {
    pub fn new(
        conf: Option<&TxPoolConfig>,
        durable: Arc<dyn UtxoReader>,
        last_block_number: u32,
    ) -> Self {
        let config = conf
            .map(sanitize)
            .unwrap_or(DEFAULT_TX_POOL_CONFIG);
        Self {
            config,
            durable,
            ledger: Mutex::new(PendingLedger::new(
                last_block_number,
                config.block_step,
                config.max_block_transactions,
            )),
            queue: Mutex::new(VecDeque::new()),
            busy: AtomicBool::new(false),
            idle: Notify::new(),
        }
    }

    pub fn config(&self) -> &TxPoolConfig {
        &self.config
    }

    /// Queues `tx` for admission and makes sure a drain pass is running.
    pub fn submit(self: &Arc<Self>, tx: Transaction) {
        trace!(target : TXPOOL_LOG_TARGET, hash = ?tx.hash(false), "Queued transaction");
        self.queue.lock().push_back(tx);
        self.trigger();
    }

    fn trigger(self: &Arc<Self>) {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = self.clone();
                handle.spawn_blocking(move || pool.drain());
            }
            Err(_) => self.drain(),
        }
    }

    fn drain(&self) {
        loop {
            loop {
                let next = self.queue.lock().pop_front();
                let tx = match next {
                    Some(tx) => tx,
                    None => break,
                };
                let hash = tx.hash(false);
                match self.admit(tx) {
                    Ok(positions) => {
                        debug!(target : TXPOOL_LOG_TARGET, hash = ?hash, outputs = ?positions, "Pooled new transaction");
                    }
                    Err(TxPoolError::Storage(e)) => {
                        error!(target : TXPOOL_LOG_TARGET, hash = ?hash, error = ?e, "Discarding transaction after storage failure");
                    }
                    Err(e) => {
                        debug!(target : TXPOOL_LOG_TARGET, hash = ?hash, reason = %e, "Discarding invalid transaction");
                    }
                }
            }
            self.busy.store(false, Ordering::Release);
            self.idle.notify_waiters();
            // a submit may have queued after the last pop but before busy was cleared
            if self.queue.lock().is_empty()
                || self
                    .busy
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
            {
                return;
            }
        }
    }

    /// Waits until the queue is empty and no drain pass is running.
    pub async fn flush(&self) {
        loop {
            let notified = self.idle.notified();
            if !self.busy.load(Ordering::Acquire) && self.queue.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Validates `tx` against the current ledger without applying it.
    pub fn check_transaction(&self, tx: &Transaction) -> Result<InputResolution, TxPoolError> {
        let ledger = self.ledger.lock();
        ledger.check(tx, &self.config.operator, self.durable.as_ref())
    }

    pub(crate) fn admit(&self, tx: Transaction) -> Result<Vec<UtxoPosition>, TxPoolError> {
        let mut ledger = self.ledger.lock();
        let resolution = ledger.check(&tx, &self.config.operator, self.durable.as_ref())?;
        ledger.apply(tx, resolution)
    }

    /// Hands the oldest pending block to `commit`. The block leaves the pool
    /// only if `commit` succeeds; on error the pool is left untouched.
    pub fn commit_next<F, T>(&self, commit: F) -> Result<Option<T>>
    where
        F: FnOnce(&BlockCandidate<'_>) -> Result<T>,
    {
        let mut ledger = self.ledger.lock();
        let out = match ledger.candidate() {
            None => return Ok(None),
            Some(candidate) => commit(&candidate)?,
        };
        if let Some(batch) = ledger.commit_front() {
            debug!(target : TXPOOL_LOG_TARGET, block_number = batch.number, transactions = batch.transactions.len(), "Pending block committed");
        }
        Ok(Some(out))
    }

    /// Durable outputs not spent in the pool, plus outputs created in the pool.
    pub fn all_utxos(&self, owner: Option<&Address>) -> Result<Vec<(UtxoPosition, Output)>, TxPoolError> {
        let ledger = self.ledger.lock();
        ledger.utxos(owner, self.durable.as_ref())
    }

    pub fn get_utxo(&self, position: &UtxoPosition) -> Result<Option<Output>, TxPoolError> {
        let ledger = self.ledger.lock();
        Ok(ledger
            .resolve(position, self.durable.as_ref())?
            .map(|input| input.output))
    }

    pub fn last_committed(&self) -> u32 {
        self.ledger.lock().last_committed()
    }

    pub fn pending_transactions(&self) -> usize {
        self.ledger.lock().pending_transactions()
    }

    pub fn pending_blocks(&self) -> usize {
        self.ledger.lock().pending_blocks()
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }
}
