use primitive_types::U256;
use thiserror::Error;

use types::{Address, UtxoPosition};

/// Reasons a transaction is refused admission.
#[derive(Error, Debug)]
pub enum TxPoolError {
    #[error("non zero fee {0} is not supported")]
    FeeNotSupported(U256),
    #[error("transaction creates no outputs")]
    NoOutputs,
    #[error("deposit must create exactly one output")]
    InvalidDeposit,
    #[error("deposit signed by {signer:?}, not by the operator")]
    NonOperatorDeposit { signer: Address },
    #[error("missing signature for slot {0}")]
    MissingSignature(usize),
    #[error("signature in slot {0} does not recover")]
    InvalidSignature(usize),
    #[error("input {0} referenced twice")]
    DuplicateInput(UtxoPosition),
    #[error("input {0} not found or already spent")]
    InputNotFound(UtxoPosition),
    #[error("input {position} is owned by {owner:?}, signed by {signer:?}")]
    SignerMismatch {
        position: UtxoPosition,
        owner: Address,
        signer: Address,
    },
    #[error("inputs total {inputs}, outputs total {outputs}")]
    AmountMismatch { inputs: U256, outputs: U256 },
    #[error("amount overflow")]
    AmountOverflow,
    #[error("block number overflow")]
    BlockNumberOverflow,
    #[error("storage: {0}")]
    Storage(#[from] anyhow::Error),
}
