use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use primitive_types::U256;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

use crypto::ecdsa::Keypair;
use types::{Address, Output, Transaction, UtxoPosition};

use crate::{InputSource, TxPool, TxPoolConfig, TxPoolError, UtxoReader};

#[derive(Default)]
struct DummyUtxoSet {
    utxos: RwLock<BTreeMap<UtxoPosition, Output>>,
    fail: AtomicBool,
}

impl DummyUtxoSet {
    fn with_utxos(iter: Vec<(UtxoPosition, Output)>) -> Arc<Self> {
        let set = Self::default();
        set.utxos.write().extend(iter);
        Arc::new(set)
    }

    fn insert(&self, position: UtxoPosition, output: Output) {
        self.utxos.write().insert(position, output);
    }

    fn remove(&self, position: &UtxoPosition) {
        self.utxos.write().remove(position);
    }
}

impl UtxoReader for DummyUtxoSet {
    fn get_utxo(&self, position: &UtxoPosition) -> Result<Option<Output>> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("disk on fire")
        }
        Ok(self.utxos.read().get(position).copied())
    }

    fn utxos(&self, owner: Option<&Address>) -> Result<Vec<(UtxoPosition, Output)>> {
        Ok(self
            .utxos
            .read()
            .iter()
            .filter(|(_, out)| owner.map_or(true, |owner| out.owner == *owner))
            .map(|(pos, out)| (*pos, *out))
            .collect())
    }
}

fn keypair(seed: u64) -> Keypair {
    Keypair::generate(&mut ChaCha20Rng::seed_from_u64(seed))
}

fn operator() -> Keypair {
    keypair(1)
}

fn config(max_block_transactions: usize) -> TxPoolConfig {
    TxPoolConfig {
        block_step: 1000,
        max_block_transactions,
        operator: operator().address(),
    }
}

fn pool_with(durable: Arc<DummyUtxoSet>, max_block_transactions: usize) -> Arc<TxPool> {
    Arc::new(TxPool::new(Some(&config(max_block_transactions)), durable, 0))
}

fn deposit(owner: Address, amount: u64, signer: &Keypair) -> Transaction {
    let mut tx = Transaction::deposit(owner, U256::from(amount));
    tx.sign(0, &signer.secret).unwrap();
    tx
}

fn transfer(
    owner: &Keypair,
    inputs: [Option<UtxoPosition>; 2],
    outputs: Vec<(Address, u64)>,
) -> Transaction {
    let mut slots = [None, None];
    for (slot, (to, amount)) in outputs.into_iter().enumerate() {
        slots[slot] = Some(Output::new(to, U256::from(amount)));
    }
    let mut tx = Transaction::new(inputs, slots);
    for slot in 0..2 {
        if tx.inputs[slot].is_some() {
            tx.sign(slot, &owner.secret).unwrap();
        }
    }
    tx
}

fn funded(owner: &Keypair, amount: u64) -> (Arc<DummyUtxoSet>, UtxoPosition) {
    let position = UtxoPosition::new(1000, 0, 0);
    let durable = DummyUtxoSet::with_utxos(vec![(
        position,
        Output::new(owner.address(), U256::from(amount)),
    )]);
    (durable, position)
}

#[test]
fn deposit_creates_output_at_next_block() {
    let pool = pool_with(Arc::new(DummyUtxoSet::default()), 16);
    let alice = keypair(2);
    let positions = pool.admit(deposit(alice.address(), 100, &operator())).unwrap();
    assert_eq!(positions, vec![UtxoPosition::new(1000, 0, 0)]);
    assert_eq!(
        pool.all_utxos(Some(&alice.address())).unwrap(),
        vec![(
            UtxoPosition::new(1000, 0, 0),
            Output::new(alice.address(), U256::from(100))
        )]
    );
    assert_eq!(pool.pending_transactions(), 1);
}

#[test]
fn deposit_rules() {
    let pool = pool_with(Arc::new(DummyUtxoSet::default()), 16);
    let alice = keypair(2);

    let forged = deposit(alice.address(), 100, &alice);
    assert!(matches!(
        pool.admit(forged),
        Err(TxPoolError::NonOperatorDeposit { signer }) if signer == alice.address()
    ));

    let unsigned = Transaction::deposit(alice.address(), U256::from(1));
    assert!(matches!(
        pool.admit(unsigned),
        Err(TxPoolError::MissingSignature(0))
    ));

    let mut split = Transaction::new(
        [None, None],
        [
            Some(Output::new(alice.address(), U256::from(1))),
            Some(Output::new(alice.address(), U256::from(1))),
        ],
    );
    split.sign(0, &operator().secret).unwrap();
    assert!(matches!(pool.admit(split), Err(TxPoolError::InvalidDeposit)));

    let mut dual = deposit(alice.address(), 5, &operator());
    dual.sign(1, &alice.secret).unwrap();
    assert!(matches!(
        pool.admit(dual),
        Err(TxPoolError::NonOperatorDeposit { .. })
    ));

    assert_eq!(pool.pending_transactions(), 0);
}

#[test]
fn transfer_tombstones_durable_input() {
    let alice = keypair(2);
    let bob = keypair(3);
    let (durable, position) = funded(&alice, 100);
    let pool = pool_with(durable, 16);

    let spend = transfer(
        &alice,
        [Some(position), None],
        vec![(bob.address(), 60), (alice.address(), 40)],
    );
    let resolution = pool.check_transaction(&spend).unwrap();
    assert_eq!(resolution.inputs[0].source, InputSource::Durable);
    assert_eq!(resolution.input_total, U256::from(100));

    let created = pool.admit(spend).unwrap();
    assert_eq!(
        created,
        vec![UtxoPosition::new(2000, 0, 0), UtxoPosition::new(2000, 0, 1)]
    );
    assert_eq!(pool.get_utxo(&position).unwrap(), None);

    let utxos = pool.all_utxos(None).unwrap();
    assert_eq!(utxos.len(), 2);
    assert!(utxos.iter().all(|(pos, _)| *pos != position));
}

#[test]
fn double_spend_is_rejected() {
    let alice = keypair(2);
    let bob = keypair(3);
    let carol = keypair(4);
    let (durable, position) = funded(&alice, 100);
    let pool = pool_with(durable, 16);

    pool.admit(transfer(&alice, [Some(position), None], vec![(bob.address(), 100)]))
        .unwrap();
    let second = transfer(&alice, [Some(position), None], vec![(carol.address(), 100)]);
    assert!(matches!(
        pool.admit(second),
        Err(TxPoolError::InputNotFound(p)) if p == position
    ));
    assert_eq!(pool.pending_transactions(), 1);
}

#[test]
fn amount_mismatch_has_no_effect() {
    let alice = keypair(2);
    let bob = keypair(3);
    let (durable, position) = funded(&alice, 100);
    let pool = pool_with(durable, 16);

    let short = transfer(&alice, [Some(position), None], vec![(bob.address(), 90)]);
    match pool.admit(short) {
        Err(TxPoolError::AmountMismatch { inputs, outputs }) => {
            assert_eq!(inputs, U256::from(100));
            assert_eq!(outputs, U256::from(90));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(pool.pending_transactions(), 0);
    assert!(pool.get_utxo(&position).unwrap().is_some());
    assert_eq!(pool.all_utxos(Some(&bob.address())).unwrap(), vec![]);
}

#[test]
fn ownership_and_signature_failures() {
    let alice = keypair(2);
    let mallory = keypair(5);
    let (durable, position) = funded(&alice, 100);
    let pool = pool_with(durable, 16);

    let stolen = transfer(&mallory, [Some(position), None], vec![(mallory.address(), 100)]);
    assert!(matches!(
        pool.admit(stolen),
        Err(TxPoolError::SignerMismatch { owner, signer, .. })
            if owner == alice.address() && signer == mallory.address()
    ));

    let mut unsigned = transfer(&alice, [Some(position), None], vec![(alice.address(), 100)]);
    unsigned.signatures = [None, None];
    assert!(matches!(
        pool.admit(unsigned),
        Err(TxPoolError::MissingSignature(0))
    ));

    let missing = UtxoPosition::new(5000, 1, 0);
    let unknown = transfer(&alice, [Some(missing), None], vec![(alice.address(), 100)]);
    assert!(matches!(
        pool.admit(unknown),
        Err(TxPoolError::InputNotFound(p)) if p == missing
    ));

    let twice = transfer(
        &alice,
        [Some(position), Some(position)],
        vec![(alice.address(), 200)],
    );
    assert!(matches!(
        pool.admit(twice),
        Err(TxPoolError::DuplicateInput(p)) if p == position
    ));

    let mut with_fee = transfer(&alice, [Some(position), None], vec![(alice.address(), 100)]);
    with_fee.fee = U256::one();
    assert!(matches!(
        pool.admit(with_fee),
        Err(TxPoolError::FeeNotSupported(_))
    ));

    let empty = transfer(&alice, [Some(position), None], vec![]);
    assert!(matches!(pool.admit(empty), Err(TxPoolError::NoOutputs)));

    assert_eq!(pool.pending_transactions(), 0);
}

#[test]
fn two_inputs_from_two_owners() {
    let alice = keypair(2);
    let bob = keypair(3);
    let a = UtxoPosition::new(1000, 0, 0);
    let b = UtxoPosition::new(1000, 1, 1);
    let durable = DummyUtxoSet::with_utxos(vec![
        (a, Output::new(alice.address(), U256::from(30))),
        (b, Output::new(bob.address(), U256::from(70))),
    ]);
    let pool = pool_with(durable, 16);

    let mut tx = Transaction::new(
        [Some(a), Some(b)],
        [Some(Output::new(bob.address(), U256::from(100))), None],
    );
    tx.sign(0, &alice.secret).unwrap();
    tx.sign(1, &bob.secret).unwrap();
    assert!(pool.admit(tx).is_ok());
}

#[test]
fn spend_of_pending_output() {
    let alice = keypair(2);
    let bob = keypair(3);
    let pool = pool_with(Arc::new(DummyUtxoSet::default()), 16);

    let created = pool.admit(deposit(alice.address(), 100, &operator())).unwrap();
    let spend = transfer(&alice, [Some(created[0]), None], vec![(bob.address(), 100)]);
    let resolution = pool.check_transaction(&spend).unwrap();
    assert_eq!(resolution.inputs[0].source, InputSource::Pending);

    let positions = pool.admit(spend).unwrap();
    assert_eq!(positions, vec![UtxoPosition::new(1000, 1, 0)]);
    assert_eq!(
        pool.all_utxos(None).unwrap(),
        vec![(positions[0], Output::new(bob.address(), U256::from(100)))]
    );
}

#[test]
fn full_block_rolls_over() {
    let alice = keypair(2);
    let pool = pool_with(Arc::new(DummyUtxoSet::default()), 2);
    let mut positions = Vec::new();
    for amount in 1..=3 {
        positions.extend(pool.admit(deposit(alice.address(), amount, &operator())).unwrap());
    }
    assert_eq!(
        positions,
        vec![
            UtxoPosition::new(1000, 0, 0),
            UtxoPosition::new(1000, 1, 0),
            UtxoPosition::new(2000, 0, 0),
        ]
    );
    assert_eq!(pool.pending_blocks(), 2);
}

#[test]
fn commit_failure_keeps_pool() {
    let alice = keypair(2);
    let pool = pool_with(Arc::new(DummyUtxoSet::default()), 16);
    pool.admit(deposit(alice.address(), 10, &operator())).unwrap();

    let res: Result<Option<()>> = pool.commit_next(|_| anyhow::bail!("write failed"));
    assert!(res.is_err());
    assert_eq!(pool.pending_transactions(), 1);
    assert_eq!(pool.last_committed(), 0);

    let number = pool
        .commit_next(|candidate| {
            assert_eq!(candidate.transactions.len(), 1);
            assert_eq!(candidate.outputs.len(), 1);
            assert!(candidate.spent.is_empty());
            Ok(candidate.number)
        })
        .unwrap();
    assert_eq!(number, Some(1000));
    assert_eq!(pool.last_committed(), 1000);
    assert_eq!(pool.pending_transactions(), 0);
    assert!(pool.commit_next(|_| Ok(())).unwrap().is_none());
}

#[test]
fn output_spent_by_later_block_is_written_then_deleted() {
    let alice = keypair(2);
    let bob = keypair(3);
    let durable = Arc::new(DummyUtxoSet::default());
    let pool = pool_with(durable.clone(), 1);

    let created = pool.admit(deposit(alice.address(), 100, &operator())).unwrap();
    pool.admit(transfer(&alice, [Some(created[0]), None], vec![(bob.address(), 100)]))
        .unwrap();
    assert_eq!(pool.pending_blocks(), 2);

    // block 1000 still writes the deposit output, block 2000 removes it
    pool.commit_next(|candidate| {
        assert_eq!(candidate.number, 1000);
        assert_eq!(
            candidate.outputs,
            vec![(created[0], Output::new(alice.address(), U256::from(100)))]
        );
        for (pos, out) in candidate.outputs.iter() {
            durable.insert(*pos, *out);
        }
        Ok(())
    })
    .unwrap();
    assert_eq!(pool.get_utxo(&created[0]).unwrap(), None);
    assert!(pool.all_utxos(Some(&alice.address())).unwrap().is_empty());

    pool.commit_next(|candidate| {
        assert_eq!(candidate.number, 2000);
        assert_eq!(candidate.spent, vec![created[0]]);
        for pos in candidate.spent.iter() {
            durable.remove(pos);
        }
        for (pos, out) in candidate.outputs.iter() {
            durable.insert(*pos, *out);
        }
        Ok(())
    })
    .unwrap();
    assert_eq!(
        pool.all_utxos(None).unwrap(),
        vec![(
            UtxoPosition::new(2000, 0, 0),
            Output::new(bob.address(), U256::from(100))
        )]
    );
    assert_eq!(durable.utxos(None).unwrap(), pool.all_utxos(None).unwrap());
}

#[test]
fn spend_inside_one_block_is_netted_out() {
    let alice = keypair(2);
    let bob = keypair(3);
    let pool = pool_with(Arc::new(DummyUtxoSet::default()), 16);

    let created = pool.admit(deposit(alice.address(), 100, &operator())).unwrap();
    pool.admit(transfer(&alice, [Some(created[0]), None], vec![(bob.address(), 100)]))
        .unwrap();
    pool.commit_next(|candidate| {
        assert_eq!(
            candidate.outputs,
            vec![(
                UtxoPosition::new(1000, 1, 0),
                Output::new(bob.address(), U256::from(100))
            )]
        );
        assert!(candidate.spent.is_empty());
        Ok(())
    })
    .unwrap();
}

#[test]
fn block_number_overflow_leaves_inputs_unspent() {
    let alice = keypair(2);
    let bob = keypair(3);
    let (durable, position) = funded(&alice, 100);
    let pool = Arc::new(TxPool::new(Some(&config(16)), durable, u32::MAX - 10));

    let spend = transfer(&alice, [Some(position), None], vec![(bob.address(), 100)]);
    assert!(matches!(
        pool.admit(spend),
        Err(TxPoolError::BlockNumberOverflow)
    ));
    assert_eq!(pool.pending_transactions(), 0);
    assert_eq!(
        pool.get_utxo(&position).unwrap(),
        Some(Output::new(alice.address(), U256::from(100)))
    );
}

#[test]
fn committed_spend_clears_tombstone() {
    let alice = keypair(2);
    let bob = keypair(3);
    let (durable, position) = funded(&alice, 100);
    let pool = pool_with(durable.clone(), 16);
    pool.admit(transfer(&alice, [Some(position), None], vec![(bob.address(), 100)]))
        .unwrap();

    pool.commit_next(|candidate| {
        assert_eq!(candidate.spent, vec![position]);
        durable.remove(&position);
        for (pos, out) in candidate.outputs.iter() {
            durable.insert(*pos, *out);
        }
        Ok(())
    })
    .unwrap();

    // the input is gone from both layers, a replay still fails
    let replay = transfer(&alice, [Some(position), None], vec![(bob.address(), 100)]);
    assert!(matches!(
        pool.admit(replay),
        Err(TxPoolError::InputNotFound(_))
    ));
    assert_eq!(pool.all_utxos(Some(&bob.address())).unwrap().len(), 1);
}

#[test]
fn storage_failure_is_surfaced() {
    let alice = keypair(2);
    let (durable, position) = funded(&alice, 100);
    let pool = pool_with(durable.clone(), 16);
    durable.fail.store(true, Ordering::SeqCst);
    let spend = transfer(&alice, [Some(position), None], vec![(alice.address(), 100)]);
    assert!(matches!(pool.admit(spend), Err(TxPoolError::Storage(_))));
}

#[test]
fn submit_without_runtime_drains_inline() {
    let alice = keypair(2);
    let pool = pool_with(Arc::new(DummyUtxoSet::default()), 16);
    pool.submit(deposit(alice.address(), 1, &operator()));
    pool.submit(deposit(alice.address(), 1, &alice));
    assert_eq!(pool.queued(), 0);
    assert_eq!(pool.pending_transactions(), 1);
}

#[tokio::test]
async fn concurrent_submits_admit_one_spend() {
    let alice = keypair(2);
    let (durable, position) = funded(&alice, 100);
    let pool = pool_with(durable, 16);

    let mut handles = Vec::new();
    for i in 0..32_u64 {
        let pool = pool.clone();
        let tx = transfer(
            &alice,
            [Some(position), None],
            vec![(Address::from_low_u64_be(i + 10), 100)],
        );
        handles.push(tokio::spawn(async move { pool.submit(tx) }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    pool.flush().await;

    assert_eq!(pool.queued(), 0);
    assert_eq!(pool.pending_transactions(), 1);
    assert_eq!(pool.all_utxos(None).unwrap().len(), 1);
}

#[test]
fn sanitize_repairs_config() {
    let conf = TxPoolConfig {
        block_step: 0,
        max_block_transactions: 1 << 20,
        operator: Address::repeat_byte(1),
    };
    let pool = TxPool::new(Some(&conf), Arc::new(DummyUtxoSet::default()), 0);
    assert_eq!(pool.config().block_step, 1000);
    assert_eq!(pool.config().max_block_transactions, types::MAX_BLOCK_TRANSACTIONS);
    assert_eq!(pool.config().operator, Address::repeat_byte(1));
}
