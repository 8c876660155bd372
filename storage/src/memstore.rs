use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use anyhow::Result;

use crate::error::StorageError;
use crate::{BatchOp, KeyValueDB, RawIterator, WriteBatch};

#[derive(Debug, Default, Clone)]
pub struct MemStore {
    inner: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect<'a, I>(entries: I) -> RawIterator<'static>
    where
        I: Iterator<Item = (&'a Vec<u8>, &'a Vec<u8>)>,
    {
        // snapshot, so the lock is not held while callers iterate
        let snapshot: Vec<_> = entries.map(|(k, v)| Ok((k.clone(), v.clone()))).collect();
        Box::new(snapshot.into_iter())
    }
}

impl KeyValueDB for MemStore {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let store = self.inner.read().map_err(|_| StorageError::RWPoison)?;
        Ok(store.get(key).cloned())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        let mut store = self.inner.write().map_err(|_| StorageError::RWPoison)?;
        for op in batch {
            match op {
                BatchOp::Put { key, value } => {
                    store.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    store.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan(&self, gte: &[u8], lte: &[u8]) -> Result<RawIterator<'_>> {
        let store = self.inner.read().map_err(|_| StorageError::RWPoison)?;
        if gte > lte {
            return Ok(Box::new(std::iter::empty()));
        }
        Ok(Self::collect(store.range::<[u8], _>((
            Bound::Included(gte),
            Bound::Included(lte),
        ))))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<RawIterator<'_>> {
        let store = self.inner.read().map_err(|_| StorageError::RWPoison)?;
        Ok(Self::collect(
            store
                .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
                .take_while(|(k, _)| k.starts_with(prefix)),
        ))
    }
}
