use std::convert::TryInto;
use std::fmt::Formatter;

use anyhow::Result;
use primitive_types::U256;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

use codec::{impl_rlp_codec, Decoder, Encoder};

use crate::{Address, Error, BLOCK_NUMBER_LENGTH, TX_NUMBER_LENGTH, UTXO_KEY_LENGTH};

/// A spendable amount owned by one address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Output {
    pub owner: Address,
    pub amount: U256,
}

impl Output {
    pub fn new(owner: Address, amount: U256) -> Self {
        Self { owner, amount }
    }

    /// Zero owner and zero amount, which is how an unused output slot is encoded.
    pub fn is_empty(&self) -> bool {
        self.owner.is_zero() && self.amount.is_zero()
    }
}

impl Encodable for Output {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.owner);
        s.append(&self.amount);
    }
}

impl Decodable for Output {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            owner: rlp.val_at(0)?,
            amount: rlp.val_at(1)?,
        })
    }
}

impl_rlp_codec!(Output);

/// Position of an output in the chain: block number, index of the
/// transaction in that block, and output slot of the transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtxoPosition {
    pub block_number: u32,
    pub tx_index: u32,
    pub output_index: u8,
}

impl UtxoPosition {
    pub fn new(block_number: u32, tx_index: u32, output_index: u8) -> Self {
        Self {
            block_number,
            tx_index,
            output_index,
        }
    }

    /// The all zero key never names a real output; it marks an unused input slot.
    pub fn is_null(&self) -> bool {
        self.block_number == 0 && self.tx_index == 0 && self.output_index == 0
    }

    /// Fixed width big endian key, so that keys sort by position.
    pub fn to_key(&self) -> [u8; UTXO_KEY_LENGTH] {
        let mut key = [0_u8; UTXO_KEY_LENGTH];
        key[..BLOCK_NUMBER_LENGTH].copy_from_slice(&self.block_number.to_be_bytes());
        key[BLOCK_NUMBER_LENGTH..BLOCK_NUMBER_LENGTH + TX_NUMBER_LENGTH]
            .copy_from_slice(&self.tx_index.to_be_bytes());
        key[UTXO_KEY_LENGTH - 1] = self.output_index;
        key
    }

    pub fn from_key(key: &[u8]) -> Result<Self, Error> {
        if key.len() != UTXO_KEY_LENGTH {
            return Err(Error::InvalidKeyLength(key.len()));
        }
        let block_number = u32::from_be_bytes(
            key[..BLOCK_NUMBER_LENGTH]
                .try_into()
                .map_err(|_| Error::InvalidKeyLength(key.len()))?,
        );
        let tx_index = u32::from_be_bytes(
            key[BLOCK_NUMBER_LENGTH..BLOCK_NUMBER_LENGTH + TX_NUMBER_LENGTH]
                .try_into()
                .map_err(|_| Error::InvalidKeyLength(key.len()))?,
        );
        Ok(Self::new(block_number, tx_index, key[UTXO_KEY_LENGTH - 1]))
    }
}

impl std::fmt::Display for UtxoPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.block_number, self.tx_index, self.output_index
        )
    }
}

impl Encoder for UtxoPosition {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.to_key().to_vec())
    }
}

impl Decoder for UtxoPosition {
    fn decode(buf: &[u8]) -> Result<Self> {
        Ok(Self::from_key(buf)?)
    }
}
