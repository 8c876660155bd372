use anyhow::Result;
use primitive_types::{H256, U256};
use rlp::{Rlp, RlpStream};

use codec::{Decoder, Encoder};
use crypto::ecdsa::{SecretKey, Signature};
use crypto::{keccak256, keccak256_concat};

use crate::utxo::{Output, UtxoPosition};
use crate::{Address, Error, SIGNATURE_LENGTH};

const UNSIGNED_FIELD_COUNT: usize = 11;
const SIGNED_FIELD_COUNT: usize = 13;
const EMPTY_SIGNATURE: [u8; SIGNATURE_LENGTH] = [0; SIGNATURE_LENGTH];

/// Two input, two output UTXO transaction.
///
/// A transaction with no inputs is a deposit: it mints its single output and
/// is signed by the operator rather than by the recipient.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    pub inputs: [Option<UtxoPosition>; 2],
    pub outputs: [Option<Output>; 2],
    pub fee: U256,
    pub signatures: [Option<Signature>; 2],
}

impl Transaction {
    pub fn new(inputs: [Option<UtxoPosition>; 2], outputs: [Option<Output>; 2]) -> Self {
        Self {
            inputs,
            outputs,
            fee: U256::zero(),
            signatures: [None, None],
        }
    }

    pub fn deposit(owner: Address, amount: U256) -> Self {
        Self::new([None, None], [Some(Output::new(owner, amount)), None])
    }

    pub fn is_deposit(&self) -> bool {
        self.inputs.iter().all(Option::is_none)
    }

    pub fn input_positions(&self) -> impl Iterator<Item = (usize, &UtxoPosition)> {
        self.inputs
            .iter()
            .enumerate()
            .filter_map(|(slot, input)| input.as_ref().map(|pos| (slot, pos)))
    }

    pub fn created_outputs(&self) -> impl Iterator<Item = (u8, &Output)> {
        self.outputs
            .iter()
            .enumerate()
            .filter_map(|(slot, output)| output.as_ref().map(|out| (slot as u8, out)))
    }

    pub fn output_total(&self) -> U256 {
        self.created_outputs()
            .fold(U256::zero(), |acc, (_, out)| acc.saturating_add(out.amount))
    }

    fn rlp_append_fields(&self, s: &mut RlpStream, include_signatures: bool) {
        s.begin_list(if include_signatures {
            SIGNED_FIELD_COUNT
        } else {
            UNSIGNED_FIELD_COUNT
        });
        for input in self.inputs.iter() {
            let pos = input.unwrap_or_default();
            s.append(&pos.block_number);
            s.append(&pos.tx_index);
            s.append(&pos.output_index);
        }
        for output in self.outputs.iter() {
            let out = output.unwrap_or_default();
            s.append(&out.owner);
            s.append(&out.amount);
        }
        s.append(&self.fee);
        if include_signatures {
            for sig in self.signatures.iter() {
                let raw = match sig {
                    Some(sig) => sig.as_bytes().to_vec(),
                    None => EMPTY_SIGNATURE.to_vec(),
                };
                s.append(&raw);
            }
        }
    }

    pub(crate) fn rlp_append(&self, s: &mut RlpStream) {
        self.rlp_append_fields(s, true)
    }

    pub fn encode_with(&self, include_signatures: bool) -> Vec<u8> {
        let mut s = RlpStream::new();
        self.rlp_append_fields(&mut s, include_signatures);
        s.out().to_vec()
    }

    pub(crate) fn decode_rlp(rlp: &Rlp) -> Result<Self, Error> {
        let count = rlp.item_count()?;
        if count != UNSIGNED_FIELD_COUNT && count != SIGNED_FIELD_COUNT {
            return Err(Error::InvalidFieldCount(count));
        }
        let mut tx = Transaction::default();
        for slot in 0..2 {
            let pos = UtxoPosition::new(
                rlp.val_at(slot * 3)?,
                rlp.val_at(slot * 3 + 1)?,
                rlp.val_at(slot * 3 + 2)?,
            );
            if !pos.is_null() {
                tx.inputs[slot] = Some(pos);
            }
            let out = Output::new(rlp.val_at(6 + slot * 2)?, rlp.val_at(7 + slot * 2)?);
            if !out.is_empty() {
                tx.outputs[slot] = Some(out);
            }
        }
        tx.fee = rlp.val_at(10)?;
        if count == SIGNED_FIELD_COUNT {
            for slot in 0..2 {
                let raw = rlp.at(11 + slot)?;
                let raw = raw.data()?;
                if raw.iter().any(|b| *b != 0) {
                    tx.signatures[slot] = Some(Signature::from_bytes(raw)?);
                } else if raw.len() != SIGNATURE_LENGTH {
                    return Err(Error::Signature(crypto::Error::InvalidSignatureLength(
                        raw.len(),
                    )));
                }
            }
        }
        Ok(tx)
    }

    /// Hash that signers commit to: every field except the signatures.
    pub fn sig_hash(&self) -> H256 {
        keccak256(self.encode_with(false))
    }

    pub fn hash(&self, exclude_signatures: bool) -> H256 {
        if exclude_signatures {
            self.sig_hash()
        } else {
            keccak256(self.encode_with(true))
        }
    }

    /// Leaf committed in the block tree. Unset signatures hash as 65 zero
    /// bytes so the preimage always has the same size.
    pub fn merkle_hash(&self) -> H256 {
        let sig_hash = self.sig_hash();
        keccak256_concat(&[
            sig_hash.as_bytes(),
            self.signature_bytes(0),
            self.signature_bytes(1),
        ])
    }

    fn signature_bytes(&self, slot: usize) -> &[u8] {
        match &self.signatures[slot] {
            Some(sig) => sig.as_bytes(),
            None => &EMPTY_SIGNATURE,
        }
    }

    pub fn sign(&mut self, slot: usize, key: &SecretKey) -> Result<(), Error> {
        let sig_hash = self.sig_hash();
        let entry = self
            .signatures
            .get_mut(slot)
            .ok_or(Error::InvalidSignatureSlot(slot))?;
        *entry = Some(key.sign_message_hash(&sig_hash)?);
        Ok(())
    }

    /// Address recovered from the signature in `slot`, if any.
    pub fn spender(&self, slot: usize) -> Option<Address> {
        let sig = self.signatures.get(slot)?.as_ref()?;
        sig.recover_message_signer(&self.sig_hash()).ok()
    }

    /// Checks that every required signature is present and recovers.
    /// Ownership and balances are checked against the ledger by the pool.
    pub fn validate(&self) -> bool {
        if self.is_deposit() {
            let first = match self.spender(0) {
                Some(signer) => signer,
                None => return false,
            };
            return match &self.signatures[1] {
                Some(_) => self.spender(1) == Some(first),
                None => true,
            };
        }
        self.input_positions()
            .all(|(slot, _)| self.spender(slot).is_some())
    }
}

impl Encoder for Transaction {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.encode_with(true))
    }
}

impl Decoder for Transaction {
    fn decode(buf: &[u8]) -> Result<Self> {
        Ok(Transaction::decode_rlp(&Rlp::new(buf))?)
    }
}
