pub mod ecdsa;
mod error;

pub use error::Error;

use primitive_types::H256;
use tiny_keccak::{Hasher, Keccak};

/// Prefix applied to a 32 byte hash before it is signed as a personal message.
pub const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

pub fn keccak256<B: AsRef<[u8]>>(bytes: B) -> H256 {
    let mut out = H256::zero();
    let mut keccak = Keccak::v256();
    keccak.update(bytes.as_ref());
    keccak.finalize(out.as_bytes_mut());
    out
}

/// Hash of the concatenation of `parts`, without allocating an intermediate buffer.
pub fn keccak256_concat(parts: &[&[u8]]) -> H256 {
    let mut out = H256::zero();
    let mut keccak = Keccak::v256();
    for part in parts {
        keccak.update(part);
    }
    keccak.finalize(out.as_bytes_mut());
    out
}

pub fn hash_personal_message(hash: &H256) -> H256 {
    keccak256_concat(&[PERSONAL_MESSAGE_PREFIX, hash.as_bytes()])
}
