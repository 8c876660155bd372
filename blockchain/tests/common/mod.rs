#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use primitive_types::U256;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

use blockchain::chain::ChildChain;
use blockchain::parent_chain::{LocalParentChain, ParentChain};
use crypto::ecdsa::Keypair;
use storage::{KeyValueDB, MemStore, RawIterator, WriteBatch};
use types::config::EnvironmentConfig;
use types::{Address, Output, Transaction, UtxoPosition};

pub fn keypair(seed: u64) -> Keypair {
    Keypair::generate(&mut ChaCha20Rng::seed_from_u64(seed))
}

pub fn operator() -> Keypair {
    keypair(1)
}

pub fn config() -> EnvironmentConfig {
    EnvironmentConfig::default()
}

/// MemStore whose batch writes can be switched off.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemStore,
    pub fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst)
    }
}

impl KeyValueDB for FlakyStore {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get_raw(key)
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("write refused")
        }
        self.inner.write(batch)
    }

    fn scan(&self, gte: &[u8], lte: &[u8]) -> Result<RawIterator<'_>> {
        self.inner.scan(gte, lte)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<RawIterator<'_>> {
        self.inner.scan_prefix(prefix)
    }
}

pub fn chain_with<D: KeyValueDB + 'static>(
    db: Arc<D>,
    config: &EnvironmentConfig,
) -> (ChildChain, Arc<LocalParentChain>) {
    let parent = Arc::new(LocalParentChain::new());
    let dyn_parent: Arc<dyn ParentChain> = parent.clone();
    let chain = ChildChain::initialize(db, dyn_parent, operator().secret, config).unwrap();
    (chain, parent)
}

pub fn chain_on<D: KeyValueDB + 'static>(db: Arc<D>) -> (ChildChain, Arc<LocalParentChain>) {
    chain_with(db, &config())
}

pub fn mem_chain() -> (ChildChain, Arc<LocalParentChain>) {
    chain_on(Arc::new(MemStore::new()))
}

pub fn transfer(
    owner: &Keypair,
    inputs: [Option<UtxoPosition>; 2],
    outputs: Vec<(Address, u64)>,
) -> Transaction {
    let mut slots = [None, None];
    for (slot, (to, amount)) in outputs.into_iter().enumerate() {
        slots[slot] = Some(Output::new(to, U256::from(amount)));
    }
    let mut tx = Transaction::new(inputs, slots);
    for slot in 0..2 {
        if tx.inputs[slot].is_some() {
            tx.sign(slot, &owner.secret).unwrap();
        }
    }
    tx
}
