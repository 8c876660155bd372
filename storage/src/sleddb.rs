use std::path::Path;

use anyhow::Result;
use tracing::debug;

use crate::{BatchOp, KeyValueDB, RawIterator, WriteBatch};

pub const STORAGE_LOG_TARGET: &str = "storage";

pub struct SledDB {
    inner: sled::Db,
}

impl SledDB {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { inner: db })
    }

    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { inner: db })
    }
}

fn map_entry(entry: sled::Result<(sled::IVec, sled::IVec)>) -> Result<(Vec<u8>, Vec<u8>)> {
    let (k, v) = entry?;
    Ok((k.to_vec(), v.to_vec()))
}

impl KeyValueDB for SledDB {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.get(key)?.map(|value| value.to_vec()))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        let ops = batch.len();
        let mut sled_batch = sled::Batch::default();
        for op in batch {
            match op {
                BatchOp::Put { key, value } => sled_batch.insert(key, value),
                BatchOp::Delete { key } => sled_batch.remove(key),
            }
        }
        self.inner.apply_batch(sled_batch)?;
        self.inner.flush()?;
        debug!(target: STORAGE_LOG_TARGET, ops, "Applied write batch");
        Ok(())
    }

    fn scan(&self, gte: &[u8], lte: &[u8]) -> Result<RawIterator<'_>> {
        if gte > lte {
            return Ok(Box::new(std::iter::empty()));
        }
        let entries: Vec<_> = self.inner.range(gte..=lte).map(map_entry).collect();
        Ok(Box::new(entries.into_iter()))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<RawIterator<'_>> {
        let entries: Vec<_> = self.inner.scan_prefix(prefix).map(map_entry).collect();
        Ok(Box::new(entries.into_iter()))
    }
}
