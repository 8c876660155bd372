use std::sync::Arc;

use anyhow::Result;

use storage::{KVStore, Schema};
use txpool::UtxoReader;
use types::{Address, Output, UtxoPosition};

pub type UtxoStorageKV = dyn KVStore<UtxoStorage> + Send + Sync;

/// The durable UTXO set. Only the block builder writes here, one batch per
/// committed block.
pub struct UtxoStorage {
    kv: Arc<UtxoStorageKV>,
}

impl Schema for UtxoStorage {
    type Key = UtxoPosition;
    type Value = Output;

    fn column() -> &'static str {
        "utxo"
    }
}

impl UtxoStorage {
    pub fn new(kv: Arc<UtxoStorageKV>) -> Self {
        Self { kv }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.kv.iter()?.count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.kv.iter()?.next().is_none())
    }
}

impl UtxoReader for UtxoStorage {
    fn get_utxo(&self, position: &UtxoPosition) -> Result<Option<Output>> {
        self.kv.get(position)
    }

    fn utxos(&self, owner: Option<&Address>) -> Result<Vec<(UtxoPosition, Output)>> {
        let mut utxos = Vec::new();
        for (k, v) in self.kv.iter()? {
            let (position, output) = (k?, v?);
            if owner.map_or(true, |owner| output.owner == *owner) {
                utxos.push((position, output));
            }
        }
        Ok(utxos)
    }
}
