use crypto::keccak256_concat;
use primitive_types::H256;

use crate::TREE_DEPTH;

pub(crate) struct TreeHasher {
    defaults: Vec<H256>,
}

impl TreeHasher {
    /// `defaults[h]` is the hash of an empty subtree of height `h`.
    pub(crate) fn new() -> Self {
        let mut defaults = Vec::with_capacity(TREE_DEPTH + 1);
        defaults.push(crypto::keccak256([0_u8; 32]));
        for h in 1..=TREE_DEPTH {
            let prev = defaults[h - 1];
            defaults.push(digest_node(&prev, &prev));
        }
        Self { defaults }
    }

    /// Default hash for an absent node whose key is `depth` bits long.
    pub(crate) fn default_at_depth(&self, depth: usize) -> H256 {
        self.defaults[TREE_DEPTH - depth]
    }

    pub(crate) fn empty_leaf(&self) -> H256 {
        self.defaults[0]
    }

    pub(crate) fn empty_root(&self) -> H256 {
        self.defaults[TREE_DEPTH]
    }
}

pub(crate) fn digest_node(left: &H256, right: &H256) -> H256 {
    keccak256_concat(&[left.as_bytes(), right.as_bytes()])
}
