pub mod error;
pub mod proof;
mod smt;
mod treehasher;
mod utils;

pub use error::Error;
pub use proof::{verify_proof, Proof, ProofNode};
pub use smt::*;

/// Number of key bits, and so the number of levels below the root.
pub const TREE_DEPTH: usize = 256;
