use primitive_types::U256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockChainError {
    #[error("block {0} not found")]
    BlockNotFound(u32),
    #[error("deposit {0} produced an invalid transaction")]
    InvalidDeposit(U256),
    #[error("stored block number {0} does not fit 4 bytes")]
    BlockNumberOutOfRange(u64),
    #[error("block number overflow")]
    BlockNumberOverflow,
    #[error("parent chain: {0}")]
    ParentChain(String),
    #[error("`{0}`")]
    GenericError(#[from] anyhow::Error),
}
