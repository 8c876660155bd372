use std::collections::{BTreeMap, BTreeSet, VecDeque};

use itertools::Itertools;
use primitive_types::U256;

use types::{Address, Output, Transaction, UtxoPosition};

use crate::error::TxPoolError;
use crate::traits::UtxoReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// Created by a pool transaction that is not in a block yet.
    Pending,
    /// Read from the durable UTXO set.
    Durable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    pub position: UtxoPosition,
    pub output: Output,
    pub source: InputSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputResolution {
    pub inputs: Vec<ResolvedInput>,
    pub input_total: U256,
    pub output_total: U256,
}

/// Transactions admitted for one future block, with their ledger effects.
#[derive(Debug, Clone)]
pub struct PendingBlock {
    pub number: u32,
    pub transactions: Vec<Transaction>,
    pub created: Vec<(UtxoPosition, Output)>,
    pub spent: Vec<UtxoPosition>,
}

impl PendingBlock {
    fn new(number: u32) -> Self {
        Self {
            number,
            transactions: Vec::new(),
            created: Vec::new(),
            spent: Vec::new(),
        }
    }
}

/// What the block builder has to write for the oldest pending block.
#[derive(Debug)]
pub struct BlockCandidate<'a> {
    pub number: u32,
    pub transactions: &'a [Transaction],
    /// Outputs of this block not spent inside it.
    pub outputs: Vec<(UtxoPosition, Output)>,
    /// Outputs of earlier blocks consumed by this block.
    pub spent: Vec<UtxoPosition>,
}

/// The in-flight layer over the durable UTXO set.
#[derive(Debug)]
pub(crate) struct PendingLedger {
    step: u32,
    max_transactions: usize,
    last_committed: u32,
    last_assigned: u32,
    batches: VecDeque<PendingBlock>,
    created: BTreeMap<UtxoPosition, Output>,
    tombstones: BTreeSet<UtxoPosition>,
}

fn checked_sum<'a, I: Iterator<Item = &'a U256>>(amounts: I) -> Result<U256, TxPoolError> {
    amounts.fold(Ok(U256::zero()), |acc, amount| {
        acc.and_then(|acc| acc.checked_add(*amount).ok_or(TxPoolError::AmountOverflow))
    })
}

impl PendingLedger {
    pub(crate) fn new(last_committed: u32, step: u32, max_transactions: usize) -> Self {
        Self {
            step,
            max_transactions,
            last_committed,
            last_assigned: last_committed,
            batches: VecDeque::new(),
            created: BTreeMap::new(),
            tombstones: BTreeSet::new(),
        }
    }

    pub(crate) fn last_committed(&self) -> u32 {
        self.last_committed
    }

    pub(crate) fn pending_transactions(&self) -> usize {
        self.batches.iter().map(|b| b.transactions.len()).sum()
    }

    pub(crate) fn pending_blocks(&self) -> usize {
        self.batches.len()
    }

    pub(crate) fn resolve(
        &self,
        position: &UtxoPosition,
        durable: &dyn UtxoReader,
    ) -> Result<Option<ResolvedInput>, TxPoolError> {
        if let Some(output) = self.created.get(position) {
            return Ok(Some(ResolvedInput {
                position: *position,
                output: *output,
                source: InputSource::Pending,
            }));
        }
        if self.tombstones.contains(position) {
            return Ok(None);
        }
        Ok(durable.get_utxo(position)?.map(|output| ResolvedInput {
            position: *position,
            output,
            source: InputSource::Durable,
        }))
    }

    pub(crate) fn check(
        &self,
        tx: &Transaction,
        operator: &Address,
        durable: &dyn UtxoReader,
    ) -> Result<InputResolution, TxPoolError> {
        if !tx.fee.is_zero() {
            return Err(TxPoolError::FeeNotSupported(tx.fee));
        }
        let outputs: Vec<&Output> = tx.created_outputs().map(|(_, out)| out).collect();
        if outputs.is_empty() {
            return Err(TxPoolError::NoOutputs);
        }
        let output_total = checked_sum(outputs.iter().map(|out| &out.amount))?;

        if tx.is_deposit() {
            if outputs.len() != 1 {
                return Err(TxPoolError::InvalidDeposit);
            }
            for slot in 0..2 {
                if slot == 1 && tx.signatures[1].is_none() {
                    break;
                }
                if tx.signatures[slot].is_none() {
                    return Err(TxPoolError::MissingSignature(slot));
                }
                let signer = tx.spender(slot).ok_or(TxPoolError::InvalidSignature(slot))?;
                if signer != *operator {
                    return Err(TxPoolError::NonOperatorDeposit { signer });
                }
            }
            return Ok(InputResolution {
                inputs: Vec::new(),
                input_total: U256::zero(),
                output_total,
            });
        }

        if let Some(duplicate) = tx.input_positions().map(|(_, pos)| pos).duplicates().next() {
            return Err(TxPoolError::DuplicateInput(*duplicate));
        }

        let mut inputs = Vec::with_capacity(2);
        for (slot, position) in tx.input_positions() {
            if tx.signatures[slot].is_none() {
                return Err(TxPoolError::MissingSignature(slot));
            }
            let resolved = self
                .resolve(position, durable)?
                .ok_or(TxPoolError::InputNotFound(*position))?;
            let signer = tx.spender(slot).ok_or(TxPoolError::InvalidSignature(slot))?;
            if signer != resolved.output.owner {
                return Err(TxPoolError::SignerMismatch {
                    position: *position,
                    owner: resolved.output.owner,
                    signer,
                });
            }
            inputs.push(resolved);
        }

        let input_total = checked_sum(inputs.iter().map(|input| &input.output.amount))?;
        if input_total != output_total {
            return Err(TxPoolError::AmountMismatch {
                inputs: input_total,
                outputs: output_total,
            });
        }
        Ok(InputResolution {
            inputs,
            input_total,
            output_total,
        })
    }

    /// Makes sure the newest batch has room for one more transaction.
    fn open_batch(&mut self) -> Result<(), TxPoolError> {
        let needs_new = match self.batches.back() {
            None => true,
            Some(batch) => batch.transactions.len() >= self.max_transactions,
        };
        if needs_new {
            let number = self
                .last_assigned
                .checked_add(self.step)
                .ok_or(TxPoolError::BlockNumberOverflow)?;
            self.last_assigned = number;
            self.batches.push_back(PendingBlock::new(number));
        }
        Ok(())
    }

    /// Records an accepted transaction. Returns the positions of its outputs.
    /// Nothing is changed when an error is returned.
    pub(crate) fn apply(
        &mut self,
        tx: Transaction,
        resolution: InputResolution,
    ) -> Result<Vec<UtxoPosition>, TxPoolError> {
        self.open_batch()?;
        let Self {
            batches,
            created,
            tombstones,
            ..
        } = self;
        let batch = batches
            .back_mut()
            .ok_or(TxPoolError::BlockNumberOverflow)?;

        let tx_index = batch.transactions.len() as u32;
        let outputs: Vec<(UtxoPosition, Output)> = tx
            .created_outputs()
            .map(|(slot, output)| (UtxoPosition::new(batch.number, tx_index, slot), *output))
            .collect();

        for input in resolution.inputs.iter() {
            match input.source {
                InputSource::Pending => {
                    created.remove(&input.position);
                }
                InputSource::Durable => {
                    tombstones.insert(input.position);
                }
            }
        }
        batch
            .spent
            .extend(resolution.inputs.iter().map(|input| input.position));
        batch.created.extend(outputs.iter().copied());
        batch.transactions.push(tx);
        created.extend(outputs.iter().copied());
        Ok(outputs.into_iter().map(|(position, _)| position).collect())
    }

    pub(crate) fn candidate(&self) -> Option<BlockCandidate<'_>> {
        let batch = self.batches.front()?;
        let spent_inside: BTreeSet<&UtxoPosition> = batch.spent.iter().collect();
        let created_inside: BTreeSet<&UtxoPosition> =
            batch.created.iter().map(|(pos, _)| pos).collect();
        Some(BlockCandidate {
            number: batch.number,
            transactions: &batch.transactions,
            outputs: batch
                .created
                .iter()
                .filter(|(pos, _)| !spent_inside.contains(pos))
                .copied()
                .collect(),
            spent: batch
                .spent
                .iter()
                .filter(|pos| !created_inside.contains(pos))
                .copied()
                .collect(),
        })
    }

    /// Drops the oldest pending block once it has been written durably.
    /// Its outputs already consumed by a later pending block become
    /// tombstones, so that block deletes them when it is written.
    pub(crate) fn commit_front(&mut self) -> Option<PendingBlock> {
        let batch = self.batches.pop_front()?;
        let spent_inside: BTreeSet<&UtxoPosition> = batch.spent.iter().collect();
        for position in batch.spent.iter() {
            self.tombstones.remove(position);
        }
        for (position, _) in batch.created.iter() {
            if self.created.remove(position).is_none() && !spent_inside.contains(position) {
                self.tombstones.insert(*position);
            }
        }
        self.last_committed = batch.number;
        Some(batch)
    }

    pub(crate) fn utxos(
        &self,
        owner: Option<&Address>,
        durable: &dyn UtxoReader,
    ) -> Result<Vec<(UtxoPosition, Output)>, TxPoolError> {
        let mut all: BTreeMap<UtxoPosition, Output> = durable
            .utxos(owner)?
            .into_iter()
            .filter(|(pos, _)| !self.tombstones.contains(pos))
            .collect();
        all.extend(
            self.created
                .iter()
                .filter(|(_, out)| owner.map_or(true, |owner| out.owner == *owner))
                .map(|(pos, out)| (*pos, *out)),
        );
        Ok(all.into_iter().collect())
    }
}
