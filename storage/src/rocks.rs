use std::path::Path;

use anyhow::Result;

use crate::{BatchOp, KeyValueDB, RawIterator, WriteBatch};

pub fn default_db_opts() -> rocksdb::Options {
    let mut opts = rocksdb::Options::default();
    opts.create_if_missing(true);
    opts
}

pub fn default_write_opts() -> rocksdb::WriteOptions {
    let mut opts = rocksdb::WriteOptions::default();
    opts.set_sync(true);
    opts
}

pub struct RocksDB {
    inner: rocksdb::DB,
}

impl RocksDB {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = rocksdb::DB::open(&default_db_opts(), path)?;
        Ok(Self { inner })
    }
}

impl KeyValueDB for RocksDB {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.get(key)?)
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        let mut rocks_batch = rocksdb::WriteBatch::default();
        for op in batch {
            match op {
                BatchOp::Put { key, value } => rocks_batch.put(key, value),
                BatchOp::Delete { key } => rocks_batch.delete(key),
            }
        }
        self.inner
            .write_opt(rocks_batch, &default_write_opts())
            .map_err(|e| e.into())
    }

    fn scan(&self, gte: &[u8], lte: &[u8]) -> Result<RawIterator<'_>> {
        let lte = lte.to_vec();
        let entries = self
            .inner
            .iterator(rocksdb::IteratorMode::From(gte, rocksdb::Direction::Forward))
            .map(|entry| entry.map(|(k, v)| (k.to_vec(), v.to_vec())).map_err(anyhow::Error::from))
            .take_while(|entry| match entry {
                Ok((k, _)) => k.as_slice() <= lte.as_slice(),
                Err(_) => true,
            })
            .collect::<Vec<_>>();
        Ok(Box::new(entries.into_iter()))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<RawIterator<'_>> {
        let entries = self
            .inner
            .iterator(rocksdb::IteratorMode::From(prefix, rocksdb::Direction::Forward))
            .map(|entry| entry.map(|(k, v)| (k.to_vec(), v.to_vec())).map_err(anyhow::Error::from))
            .take_while(|entry| match entry {
                Ok((k, _)) => k.starts_with(prefix),
                Err(_) => true,
            })
            .collect::<Vec<_>>();
        Ok(Box::new(entries.into_iter()))
    }
}
