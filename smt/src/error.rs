use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("tree has pending leaf changes, call build() first")]
    StaleTree,
    #[error("proof has {0} nodes, expected 256")]
    InvalidProofLength(usize),
}
