use primitive_types::H256;

use crate::error::Error;
use crate::treehasher::digest_node;
use crate::TREE_DEPTH;

/// One step of an inclusion path, tagged with the side the sibling sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProofNode {
    Left(H256),
    Right(H256),
}

impl ProofNode {
    pub fn hash(&self) -> &H256 {
        match self {
            ProofNode::Left(h) | ProofNode::Right(h) => h,
        }
    }
}

/// Sibling hashes ordered from the leaf level up to the children of the root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proof {
    pub nodes: Vec<ProofNode>,
}

impl Proof {
    pub fn new(nodes: Vec<ProofNode>) -> Result<Self, Error> {
        if nodes.len() != TREE_DEPTH {
            return Err(Error::InvalidProofLength(nodes.len()));
        }
        Ok(Self { nodes })
    }

    /// Concatenated sibling hashes, leaf first.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.nodes.len() * 32);
        for node in &self.nodes {
            out.extend_from_slice(node.hash().as_bytes());
        }
        out
    }

    pub fn compute_root(&self, leaf: &H256) -> H256 {
        self.nodes.iter().fold(*leaf, |current, node| match node {
            ProofNode::Right(sibling) => digest_node(&current, sibling),
            ProofNode::Left(sibling) => digest_node(sibling, &current),
        })
    }
}

pub fn verify_proof(proof: &Proof, leaf: &H256, root: &H256) -> bool {
    if proof.nodes.len() != TREE_DEPTH {
        return false;
    }
    proof.compute_root(leaf).eq(root)
}
