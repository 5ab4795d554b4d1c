//! Mock [`RegistryView`]/[`Submitter`] implementations and BLS key
//! fixtures, shared by every crate's integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use ark_bn254::{Fr, G1Projective, G2Projective};
use ark_ec::CurveGroup;
use ark_std::UniformRand;
use async_trait::async_trait;
use avs_crypto::{hash_to_g1, G1Point, G2Point};
use avs_interfaces::{
    NonSignerStakesAndSignature,
    Receipt,
    RegistryError,
    RegistrySnapshot,
    RegistryView,
    SubmitError,
    Submitter,
};
use avs_types::{OperatorId, QuorumNumber, Task, ThresholdPercentage};

/// A generated BLS keypair for test fixtures.
pub struct Keypair {
    pub sk: Fr,
    pub pubkey_g1: G1Point,
    pub pubkey_g2: G2Point,
}

impl Keypair {
    pub fn generate(rng: &mut impl ark_std::rand::RngCore) -> Self {
        let sk = Fr::rand(rng);
        let pubkey_g1 = G1Point((G1Projective::generator() * sk).into_affine());
        let pubkey_g2 = G2Point((G2Projective::generator() * sk).into_affine());
        Self {
            sk,
            pubkey_g1,
            pubkey_g2,
        }
    }

    pub fn sign(&self, digest: &[u8; 32]) -> G1Point {
        let h = hash_to_g1(digest);
        G1Point((h.0 * self.sk).into_affine())
    }
}

/// A [`RegistryView`] backed by snapshots fixed up-front per reference
/// block, standing in for a real chain reader in tests.
#[derive(Default)]
pub struct FixedRegistryView {
    quorums: Vec<QuorumNumber>,
    thresholds: HashMap<QuorumNumber, ThresholdPercentage>,
    snapshots: HashMap<u64, RegistrySnapshot>,
    pubkeys: HashMap<OperatorId, (G1Point, G2Point)>,
    /// When set, every call fails with `RegistryError::Unavailable`,
    /// simulating a chain reader outage.
    unavailable: AtomicBool,
}

impl FixedRegistryView {
    pub fn new(quorums: Vec<QuorumNumber>, thresholds: HashMap<QuorumNumber, ThresholdPercentage>) -> Self {
        Self {
            quorums,
            thresholds,
            snapshots: HashMap::new(),
            pubkeys: HashMap::new(),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn insert_snapshot(&mut self, block: u64, snapshot: RegistrySnapshot) {
        for op in &snapshot.operators {
            self.pubkeys.insert(op.operator_id, (op.pubkey_g1, op.pubkey_g2));
        }
        self.snapshots.insert(block, snapshot);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl RegistryView for FixedRegistryView {
    async fn quorums_at(&self, _block: u64) -> Result<Vec<QuorumNumber>, RegistryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("registry offline".into()));
        }
        Ok(self.quorums.clone())
    }

    async fn thresholds_at(
        &self,
        _block: u64,
        quorums: &[QuorumNumber],
    ) -> Result<Vec<ThresholdPercentage>, RegistryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("registry offline".into()));
        }
        Ok(quorums
            .iter()
            .map(|q| self.thresholds.get(q).copied().unwrap_or(0))
            .collect())
    }

    async fn operators_at(
        &self,
        block: u64,
        _quorums: &[QuorumNumber],
    ) -> Result<RegistrySnapshot, RegistryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("registry offline".into()));
        }
        self.snapshots
            .get(&block)
            .cloned()
            .ok_or_else(|| RegistryError::Unavailable(format!("no snapshot fixed for block {block}")))
    }

    async fn pubkey_of(&self, operator_id: OperatorId) -> Result<(G1Point, G2Point), RegistryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("registry offline".into()));
        }
        self.pubkeys
            .get(&operator_id)
            .copied()
            .ok_or_else(|| RegistryError::Unavailable("unknown operator".into()))
    }
}

/// Records every confirmation it was asked to submit; optionally
/// configured to fail every call to exercise a submitter outage.
#[derive(Default)]
pub struct MockSubmitter {
    pub submissions: Mutex<Vec<(Task, NonSignerStakesAndSignature)>>,
    fail: AtomicBool,
}

impl MockSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always_fail(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().expect("mutex poisoned").len()
    }
}

#[async_trait]
impl Submitter for MockSubmitter {
    async fn submit_confirmation(
        &self,
        task: &Task,
        witness: NonSignerStakesAndSignature,
    ) -> Result<Receipt, SubmitError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SubmitError::Failed("mock submitter configured to fail".into()));
        }
        self.submissions
            .lock()
            .expect("mutex poisoned")
            .push((task.clone(), witness));
        Ok(Receipt {
            tx_hash: task.digest,
            block_hash: [0u8; 32],
            block_number: task.reference_block + 1,
            tx_index: 0,
        })
    }
}
