pub mod block_builder;
pub mod block_storage;
pub mod chain;
pub mod chain_state;
pub mod deposit;
pub mod errors;
pub mod parent_chain;
pub mod submitter;
pub mod utxo;
pub mod worker;

pub const BLOCKCHAIN_LOG_TARGET: &str = "blockchain";
