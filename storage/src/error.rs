use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("RWPoison")]
    RWPoison,
    #[error("key does not belong to column {0}")]
    KeyOutsideColumn(&'static str),
}
