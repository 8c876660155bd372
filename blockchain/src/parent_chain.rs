use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use primitive_types::{H256, U256};

use types::Address;

use crate::errors::BlockChainError;

/// A deposit locked on the parent chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEvent {
    pub depositor: Address,
    pub amount: U256,
    pub deposit_index: U256,
}

/// The parent chain as seen by the operator.
#[async_trait]
pub trait ParentChain: Send + Sync {
    /// Highest child block number whose root the parent has accepted.
    async fn current_anchored_block(&self) -> Result<u32>;

    async fn submit_root(&self, block_number: u32, root: H256) -> Result<()>;

    /// Deposit events emitted in parent blocks `from..=to`.
    async fn poll_deposit_events(&self, from: u64, to: u64) -> Result<Vec<DepositEvent>>;

    async fn latest_block_number(&self) -> Result<u64>;
}

#[derive(Default)]
struct LocalState {
    height: u64,
    deposits: BTreeMap<u64, Vec<DepositEvent>>,
    roots: BTreeMap<u32, H256>,
    next_deposit_index: U256,
}

/// In-process parent chain. Every deposit is mined in a parent block of its own.
#[derive(Default)]
pub struct LocalParentChain {
    state: RwLock<LocalState>,
    offline: AtomicBool,
}

impl LocalParentChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks `amount` for `depositor` and returns the emitted event.
    pub fn deposit(&self, depositor: Address, amount: U256) -> DepositEvent {
        let mut state = self.state.write();
        state.height += 1;
        let event = DepositEvent {
            depositor,
            amount,
            deposit_index: state.next_deposit_index,
        };
        state.next_deposit_index += U256::one();
        let height = state.height;
        state.deposits.entry(height).or_default().push(event.clone());
        event
    }

    /// Mines an empty parent block.
    pub fn mine(&self) -> u64 {
        let mut state = self.state.write();
        state.height += 1;
        state.height
    }

    pub fn anchored_roots(&self) -> Vec<(u32, H256)> {
        self.state
            .read()
            .roots
            .iter()
            .map(|(number, root)| (*number, *root))
            .collect()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst)
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BlockChainError::ParentChain("unreachable".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl ParentChain for LocalParentChain {
    async fn current_anchored_block(&self) -> Result<u32> {
        self.ensure_online()?;
        Ok(self
            .state
            .read()
            .roots
            .keys()
            .next_back()
            .copied()
            .unwrap_or_default())
    }

    async fn submit_root(&self, block_number: u32, root: H256) -> Result<()> {
        self.ensure_online()?;
        self.state.write().roots.insert(block_number, root);
        Ok(())
    }

    async fn poll_deposit_events(&self, from: u64, to: u64) -> Result<Vec<DepositEvent>> {
        self.ensure_online()?;
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self
            .state
            .read()
            .deposits
            .range(from..=to)
            .flat_map(|(_, events)| events.iter().cloned())
            .collect())
    }

    async fn latest_block_number(&self) -> Result<u64> {
        self.ensure_online()?;
        Ok(self.state.read().height)
    }
}
