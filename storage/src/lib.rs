use anyhow::Result;

use codec::{Codec, Decoder, Encoder};

use crate::error::StorageError;

pub mod error;
pub mod memstore;
#[cfg(feature = "rocksdb")]
pub mod rocks;
pub mod sleddb;

pub use memstore::MemStore;
pub use sleddb::SledDB;

/// A typed column. All columns share one ordered keyspace; a column's
/// entries live under `column()` followed by a separator byte.
pub trait Schema {
    type Key: Codec + Clone;
    type Value: Codec;

    fn column() -> &'static str;
}

const COLUMN_SEPARATOR: u8 = b'/';

pub(crate) fn column_prefix<S: Schema>() -> Vec<u8> {
    let mut prefix = Vec::with_capacity(S::column().len() + 1);
    prefix.extend_from_slice(S::column().as_bytes());
    prefix.push(COLUMN_SEPARATOR);
    prefix
}

pub(crate) fn column_key<S: Schema>(key: &S::Key) -> Result<Vec<u8>> {
    let mut raw = column_prefix::<S>();
    raw.extend(key.encode()?);
    Ok(raw)
}

fn strip_column<S: Schema>(raw: &[u8]) -> Result<&[u8]> {
    let prefix_len = S::column().len() + 1;
    if raw.len() < prefix_len
        || !raw.starts_with(S::column().as_bytes())
        || raw[prefix_len - 1] != COLUMN_SEPARATOR
    {
        return Err(StorageError::KeyOutsideColumn(S::column()).into());
    }
    Ok(&raw[prefix_len..])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Puts and deletes, possibly spanning several columns, applied all or nothing.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<S: Schema>(&mut self, key: &S::Key, value: &S::Value) -> Result<()> {
        self.ops.push(BatchOp::Put {
            key: column_key::<S>(key)?,
            value: value.encode()?,
        });
        Ok(())
    }

    pub fn delete<S: Schema>(&mut self, key: &S::Key) -> Result<()> {
        self.ops.push(BatchOp::Delete {
            key: column_key::<S>(key)?,
        });
        Ok(())
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl IntoIterator for WriteBatch {
    type Item = BatchOp;
    type IntoIter = std::vec::IntoIter<BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

pub type RawIterator<'a> = Box<dyn 'a + Send + Iterator<Item = Result<(Vec<u8>, Vec<u8>)>>>;

/// Ordered byte keyspace with atomic batches. Backends implement this and
/// get the typed `KVStore` views for free.
pub trait KeyValueDB: Send + Sync {
    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn write(&self, batch: WriteBatch) -> Result<()>;

    /// Entries with `gte <= key <= lte`, in key order.
    fn scan(&self, gte: &[u8], lte: &[u8]) -> Result<RawIterator<'_>>;

    fn scan_prefix(&self, prefix: &[u8]) -> Result<RawIterator<'_>>;
}

pub type StorageIterator<'a, S> =
    Box<dyn 'a + Send + Iterator<Item = (Result<<S as Schema>::Key>, Result<<S as Schema>::Value>)>>;

pub trait KVStore<S: Schema> {
    fn get(&self, key: &S::Key) -> Result<Option<S::Value>>;
    fn put(&self, key: S::Key, value: S::Value) -> Result<()>;
    fn delete(&self, key: &S::Key) -> Result<()>;
    fn contains(&self, key: &S::Key) -> Result<bool>;
    fn iter(&self) -> Result<StorageIterator<S>>;
    /// Entries with `gte <= key <= lte` by encoded key order.
    fn range(&self, gte: &S::Key, lte: &S::Key) -> Result<StorageIterator<S>>;
}

fn decode_entry<S: Schema>(entry: Result<(Vec<u8>, Vec<u8>)>) -> (Result<S::Key>, Result<S::Value>) {
    match entry {
        Ok((k, v)) => (
            strip_column::<S>(&k).and_then(S::Key::decode),
            S::Value::decode(&v),
        ),
        Err(e) => {
            let msg = e.to_string();
            (Err(e), Err(anyhow::anyhow!(msg)))
        }
    }
}

impl<S, D> KVStore<S> for D
where
    S: Schema + 'static,
    D: KeyValueDB + ?Sized,
{
    fn get(&self, key: &S::Key) -> Result<Option<S::Value>> {
        let key = column_key::<S>(key)?;
        match self.get_raw(&key)? {
            None => Ok(None),
            Some(value) => Ok(Some(S::Value::decode(&value)?)),
        }
    }

    fn put(&self, key: S::Key, value: S::Value) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put::<S>(&key, &value)?;
        self.write(batch)
    }

    fn delete(&self, key: &S::Key) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete::<S>(key)?;
        self.write(batch)
    }

    fn contains(&self, key: &S::Key) -> Result<bool> {
        let key = column_key::<S>(key)?;
        Ok(self.get_raw(&key)?.is_some())
    }

    fn iter(&self) -> Result<StorageIterator<S>> {
        let prefix = column_prefix::<S>();
        Ok(Box::new(self.scan_prefix(&prefix)?.map(decode_entry::<S>)))
    }

    fn range(&self, gte: &S::Key, lte: &S::Key) -> Result<StorageIterator<S>> {
        let gte = column_key::<S>(gte)?;
        let lte = column_key::<S>(lte)?;
        Ok(Box::new(self.scan(&gte, &lte)?.map(decode_entry::<S>)))
    }
}
