use anyhow::Result;
use primitive_types::H256;
use rlp::{Rlp, RlpStream};

use codec::{Decoder, Encoder};
use crypto::keccak256;
use smt::{Proof, SparseMerkleTree};

use crate::tx::Transaction;
use crate::{Error, MAX_BLOCK_TRANSACTIONS};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    number: u32,
    merkle_root: H256,
    transactions: Vec<Transaction>,
}

/// Leaf key of the transaction at `index`: the index as a 256 bit big endian integer.
pub fn tx_leaf_key(index: u32) -> H256 {
    H256::from_low_u64_be(index as u64)
}

pub fn merkle_tree(transactions: &[Transaction]) -> SparseMerkleTree {
    SparseMerkleTree::from_leaves(
        transactions
            .iter()
            .enumerate()
            .map(|(i, tx)| (tx_leaf_key(i as u32), tx.merkle_hash())),
    )
}

impl Block {
    pub fn new(number: u32, transactions: Vec<Transaction>) -> Result<Self, Error> {
        if transactions.len() > MAX_BLOCK_TRANSACTIONS {
            return Err(Error::TooManyTransactions(transactions.len()));
        }
        let merkle_root = merkle_tree(&transactions).root()?;
        Ok(Self {
            number,
            merkle_root,
            transactions,
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn merkle_root(&self) -> &H256 {
        &self.merkle_root
    }

    pub fn transactions(&self) -> &Vec<Transaction> {
        &self.transactions
    }

    pub fn hash(&self) -> H256 {
        keccak256(self.rlp_bytes())
    }

    /// Inclusion proof of the transaction at `tx_index` against `merkle_root`.
    pub fn proof(&self, tx_index: u32) -> Result<Proof, Error> {
        if tx_index as usize >= self.transactions.len() {
            return Err(Error::TransactionNotFound(tx_index));
        }
        Ok(merkle_tree(&self.transactions).proof(&tx_leaf_key(tx_index))?)
    }

    /// Inclusion proofs of every transaction, in block order, from one tree build.
    pub fn proofs(&self) -> Result<Vec<Proof>, Error> {
        let tree = merkle_tree(&self.transactions);
        (0..self.transactions.len() as u32)
            .map(|i| Ok(tree.proof(&tx_leaf_key(i))?))
            .collect()
    }

    fn rlp_bytes(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(3);
        s.append(&self.number);
        s.append(&self.merkle_root);
        s.begin_list(self.transactions.len());
        for tx in self.transactions.iter() {
            tx.rlp_append(&mut s);
        }
        s.out().to_vec()
    }

    fn decode_rlp(rlp: &Rlp) -> Result<Self, Error> {
        let count = rlp.item_count()?;
        if count != 3 {
            return Err(Error::InvalidBlockFieldCount(count));
        }
        let number: u32 = rlp.val_at(0)?;
        let encoded: H256 = rlp.val_at(1)?;
        let transactions = rlp
            .at(2)?
            .iter()
            .map(|item| Transaction::decode_rlp(&item))
            .collect::<Result<Vec<_>, Error>>()?;
        let block = Block::new(number, transactions)?;
        if block.merkle_root != encoded {
            return Err(Error::MerkleRootMismatch {
                encoded,
                computed: block.merkle_root,
            });
        }
        Ok(block)
    }
}

impl Encoder for Block {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.rlp_bytes())
    }
}

impl Decoder for Block {
    fn decode(buf: &[u8]) -> Result<Self> {
        Ok(Block::decode_rlp(&Rlp::new(buf))?)
    }
}
