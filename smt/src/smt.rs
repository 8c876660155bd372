use std::collections::{BTreeMap, HashMap};

use primitive_types::H256;

use crate::error::Error;
use crate::proof::{Proof, ProofNode};
use crate::treehasher::{digest_node, TreeHasher};
use crate::utils::{flip_bit, get_bits_at_from_msb, truncate};
use crate::TREE_DEPTH;

/// Fixed depth sparse Merkle tree over 256 bit keys.
///
/// Only ancestors of present leaves are materialised; every other node is
/// represented by the default hash for its height. Leaf changes mark the tree
/// stale and `root`/`proof` refuse to answer until `build` runs again.
pub struct SparseMerkleTree {
    th: TreeHasher,
    leaves: BTreeMap<H256, H256>,
    // levels[d] holds the nodes whose key is d bits long, keyed by the
    // leaf key truncated to those bits.
    levels: Vec<HashMap<H256, H256>>,
    stale: bool,
}

impl Default for SparseMerkleTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseMerkleTree {
    pub fn new() -> Self {
        let mut tree = Self {
            th: TreeHasher::new(),
            leaves: BTreeMap::new(),
            levels: Vec::new(),
            stale: true,
        };
        tree.build();
        tree
    }

    pub fn from_leaves<I>(leaves: I) -> Self
    where
        I: IntoIterator<Item = (H256, H256)>,
    {
        let mut tree = Self::new();
        tree.leaves.extend(leaves);
        tree.build();
        tree
    }

    pub fn insert(&mut self, key: H256, leaf: H256) {
        self.leaves.insert(key, leaf);
        self.stale = true;
    }

    pub fn remove(&mut self, key: &H256) -> Option<H256> {
        let removed = self.leaves.remove(key);
        if removed.is_some() {
            self.stale = true;
        }
        removed
    }

    pub fn get(&self, key: &H256) -> Option<&H256> {
        self.leaves.get(key)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Hash of an absent leaf.
    pub fn empty_leaf(&self) -> H256 {
        self.th.empty_leaf()
    }

    pub fn build(&mut self) {
        let mut levels: Vec<HashMap<H256, H256>> = vec![HashMap::new(); TREE_DEPTH + 1];
        levels[TREE_DEPTH] = self.leaves.iter().map(|(k, v)| (*k, *v)).collect();

        for depth in (1..=TREE_DEPTH).rev() {
            let bit = depth - 1;
            let mut parents = HashMap::with_capacity(levels[depth].len());
            for (key, hash) in levels[depth].iter() {
                let parent_key = truncate(key, bit);
                if parents.contains_key(&parent_key) {
                    continue;
                }
                let sibling = levels[depth]
                    .get(&flip_bit(key, bit))
                    .copied()
                    .unwrap_or_else(|| self.th.default_at_depth(depth));
                let parent = if get_bits_at_from_msb(key.as_bytes(), bit) == 0 {
                    digest_node(hash, &sibling)
                } else {
                    digest_node(&sibling, hash)
                };
                parents.insert(parent_key, parent);
            }
            levels[depth - 1] = parents;
        }

        self.levels = levels;
        self.stale = false;
    }

    pub fn root(&self) -> Result<H256, Error> {
        if self.stale {
            return Err(Error::StaleTree);
        }
        Ok(self.levels[0]
            .get(&H256::zero())
            .copied()
            .unwrap_or_else(|| self.th.empty_root()))
    }

    /// Path of sibling hashes for `key`. Works for absent keys too, in which
    /// case the path folds from the empty leaf hash.
    pub fn proof(&self, key: &H256) -> Result<Proof, Error> {
        if self.stale {
            return Err(Error::StaleTree);
        }
        let mut nodes = Vec::with_capacity(TREE_DEPTH);
        for depth in (1..=TREE_DEPTH).rev() {
            let bit = depth - 1;
            let sibling_key = flip_bit(&truncate(key, depth), bit);
            let sibling = self.levels[depth]
                .get(&sibling_key)
                .copied()
                .unwrap_or_else(|| self.th.default_at_depth(depth));
            if get_bits_at_from_msb(key.as_bytes(), bit) == 0 {
                nodes.push(ProofNode::Right(sibling));
            } else {
                nodes.push(ProofNode::Left(sibling));
            }
        }
        Proof::new(nodes)
    }
}
