pub mod block;
pub mod config;
pub mod tx;
pub mod utxo;

use primitive_types::{H160, H256};
use thiserror::Error;

pub use block::Block;
pub use tx::Transaction;
pub use utxo::{Output, UtxoPosition};

pub type Address = H160;
pub type Hash = H256;

pub const BLOCK_NUMBER_LENGTH: usize = 4;
pub const TX_NUMBER_LENGTH: usize = 4;
pub const TX_OUTPUT_NUMBER_LENGTH: usize = 1;
pub const UTXO_KEY_LENGTH: usize = BLOCK_NUMBER_LENGTH + TX_NUMBER_LENGTH + TX_OUTPUT_NUMBER_LENGTH;

/// Hard upper bound on the number of transactions packed into one block.
pub const MAX_BLOCK_TRANSACTIONS: usize = 1 << 16;

/// Length of an encoded recoverable signature, also used for the empty placeholder.
pub const SIGNATURE_LENGTH: usize = crypto::ecdsa::SIG_LENGTH;

#[derive(Error, Debug)]
pub enum Error {
    #[error("rlp: {0}")]
    Rlp(#[from] rlp::DecoderError),
    #[error("transaction has {0} fields, expected 11 or 13")]
    InvalidFieldCount(usize),
    #[error("block has {0} fields, expected 3")]
    InvalidBlockFieldCount(usize),
    #[error("invalid signature: {0}")]
    Signature(#[from] crypto::Error),
    #[error("signature slot {0} out of range")]
    InvalidSignatureSlot(usize),
    #[error("output index {0} out of range")]
    InvalidOutputIndex(u8),
    #[error("invalid utxo key length {0}")]
    InvalidKeyLength(usize),
    #[error("block holds {0} transactions, more than the allowed maximum")]
    TooManyTransactions(usize),
    #[error("no transaction at index {0}")]
    TransactionNotFound(u32),
    #[error("merkle root mismatch, encoded {encoded:?} computed {computed:?}")]
    MerkleRootMismatch { encoded: H256, computed: H256 },
    #[error("tree: {0}")]
    Tree(#[from] smt::Error),
}
