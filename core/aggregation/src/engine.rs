use std::collections::HashMap;

use avs_crypto::{self, G1Point, G2Point};
use avs_interfaces::{NonSignerStakesAndSignature, RegistrySnapshot};
use avs_types::{OperatorId, QuorumNumber, TaskDigest, TaskIndex, ThresholdPercentage};
use thiserror::Error;
use tracing::{debug, info};

use crate::partial::PartialAggregation;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("no open task with index {0}")]
    UnknownTask(TaskIndex),
    #[error("digest does not match the task's recorded digest")]
    DigestMismatch,
    #[error("operator is not opted into any quorum requested by the task")]
    NotInQuorum,
    #[error("operator has already signed this task")]
    DuplicateSignature,
    #[error("signature does not verify against the operator's pubkey")]
    BadSignature,
}

/// Emitted on the completion channel when every quorum has met its
/// threshold.
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub index: TaskIndex,
    pub digest: TaskDigest,
    pub witness: NonSignerStakesAndSignature,
}

/// Result of a timer firing against an Open task.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutResult {
    pub index: TaskIndex,
}

struct OpenTask {
    digest: TaskDigest,
    quorums: Vec<QuorumNumber>,
    thresholds: Vec<ThresholdPercentage>,
    total_stake: std::collections::BTreeMap<QuorumNumber, u128>,
    snapshot: RegistrySnapshot,
    partial: PartialAggregation,
}

/// Per-task signature collection, stake accounting and threshold
/// evaluation. Holds no timers itself -- the dispatcher arms a deadline
/// per task and calls [`AggregationEngine::expire`] on fire, which keeps
/// this type synchronous and lock-free.
#[derive(Default)]
pub struct AggregationEngine {
    tasks: HashMap<TaskIndex, OpenTask>,
}

impl AggregationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a task for signature collection. The reference-block snapshot
    /// is fetched by the caller (via `RegistryView`, an async call the
    /// dispatcher awaits before reaching the engine) and handed in already
    /// scoped to `quorums`.
    pub fn initialize(
        &mut self,
        index: TaskIndex,
        digest: TaskDigest,
        quorums: Vec<QuorumNumber>,
        thresholds: Vec<ThresholdPercentage>,
        snapshot: RegistrySnapshot,
    ) {
        let total_stake = quorums
            .iter()
            .map(|q| {
                let stake = snapshot.total_stake_per_quorum.get(q).copied().unwrap_or(0);
                (*q, stake)
            })
            .collect();
        let partial = PartialAggregation::empty(&quorums);
        self.tasks.insert(
            index,
            OpenTask {
                digest,
                quorums,
                thresholds,
                total_stake,
                snapshot,
                partial,
            },
        );
    }

    /// Validates and folds one operator's signature in. Returns
    /// `Ok(Some(result))` when the signature completes the task,
    /// `Ok(None)` when it is merely accepted.
    pub fn submit(
        &mut self,
        index: TaskIndex,
        digest: TaskDigest,
        signature: G1Point,
        operator_id: OperatorId,
    ) -> Result<Option<CompletionResult>, EngineError> {
        let task = self.tasks.get_mut(&index).ok_or(EngineError::UnknownTask(index))?;

        if task.digest != digest {
            return Err(EngineError::DigestMismatch);
        }

        let operator = task
            .snapshot
            .operator(&operator_id)
            .ok_or(EngineError::NotInQuorum)?;
        let opted_in_quorums: Vec<QuorumNumber> = task
            .quorums
            .iter()
            .copied()
            .filter(|q| operator.is_opted_into(*q))
            .collect();
        if opted_in_quorums.is_empty() {
            return Err(EngineError::NotInQuorum);
        }

        if task.partial.has_signed(&operator_id) {
            return Err(EngineError::DuplicateSignature);
        }

        if !avs_crypto::verify(&signature, &digest, &operator.pubkey_g2) {
            return Err(EngineError::BadSignature);
        }

        let pubkey_g2 = operator.pubkey_g2;
        task.partial.aggregate_g1_signature = task.partial.aggregate_g1_signature.add(&signature);
        task.partial.aggregate_g2_pubkey = task.partial.aggregate_g2_pubkey.add(&pubkey_g2);
        for q in &opted_in_quorums {
            let stake = operator.stake_per_quorum.get(q).copied().unwrap_or(0);
            *task.partial.signed_stake_per_quorum.entry(*q).or_insert(0) += stake;
        }
        task.partial.signers.insert(operator_id);

        debug!(index, operator_id = ?operator_id, "signature accepted");

        if Self::meets_every_threshold(task) {
            let result = Self::build_completion(index, task);
            self.tasks.remove(&index);
            info!(index, "task reached threshold on every quorum");
            return Ok(Some(result));
        }

        Ok(None)
    }

    /// Removes the task from engine state. The caller (dispatcher) is
    /// responsible for transitioning the store record and emitting the
    /// timeout result; this just forgets the in-flight aggregation so a
    /// late signature resolves to `UnknownTask`.
    pub fn expire(&mut self, index: TaskIndex) -> Option<TimeoutResult> {
        self.tasks.remove(&index).map(|_| TimeoutResult { index })
    }

    pub fn is_open(&self, index: TaskIndex) -> bool {
        self.tasks.contains_key(&index)
    }

    fn meets_every_threshold(task: &OpenTask) -> bool {
        task.quorums.iter().zip(task.thresholds.iter()).all(|(q, threshold)| {
            let signed = task.partial.signed_stake_per_quorum.get(q).copied().unwrap_or(0);
            let total = task.total_stake.get(q).copied().unwrap_or(0);
            signed * 100 >= total * (*threshold as u128)
        })
    }

    fn build_completion(index: TaskIndex, task: &OpenTask) -> CompletionResult {
        let mut non_signers: Vec<_> = task
            .snapshot
            .operators
            .iter()
            .filter(|op| !task.partial.signers.contains(&op.operator_id))
            .collect();
        non_signers.sort_by_key(|op| op.operator_id);

        let non_signer_pubkeys = non_signers.iter().map(|op| op.pubkey_g1).collect();
        let non_signer_quorum_bitmap_indices =
            non_signers.iter().map(|op| op.quorum_bitmap_index).collect();

        let quorum_apks: Vec<G1Point> = task
            .quorums
            .iter()
            .map(|q| {
                task.snapshot
                    .quorum_apk_g1
                    .get(q)
                    .copied()
                    .unwrap_or_else(G1Point::identity)
            })
            .collect();

        let non_signer_stake_indices: Vec<Vec<u32>> = task
            .quorums
            .iter()
            .map(|q| {
                non_signers
                    .iter()
                    .filter(|op| op.is_opted_into(*q))
                    .map(|op| {
                        op.non_signer_stake_index_per_quorum
                            .get(q)
                            .copied()
                            .unwrap_or(0)
                    })
                    .collect()
            })
            .collect();

        CompletionResult {
            index,
            digest: task.digest,
            witness: NonSignerStakesAndSignature {
                non_signer_quorum_bitmap_indices,
                non_signer_pubkeys,
                quorum_apks,
                apk_g2: task.partial.aggregate_g2_pubkey,
                sigma: task.partial.aggregate_g1_signature,
                quorum_apk_indices: task.snapshot.quorum_apk_indices.clone(),
                total_stake_indices: task.snapshot.total_stake_indices.clone(),
                non_signer_stake_indices,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use avs_test_utils::Keypair;
    use pretty_assertions::assert_eq;

    use super::*;

    struct Operator {
        record: OperatorRecord,
        keypair: Keypair,
    }

    fn operator(id: u8, stakes: &[(QuorumNumber, u128)]) -> Operator {
        let mut rng = ark_std::test_rng();
        let keypair = Keypair::generate(&mut rng);
        let operator_id: OperatorId = [id; 32];
        Operator {
            record: OperatorRecord {
                operator_id,
                pubkey_g1: keypair.pubkey_g1,
                pubkey_g2: keypair.pubkey_g2,
                stake_per_quorum: stakes.iter().copied().collect(),
                quorum_bitmap_index: 0,
                non_signer_stake_index_per_quorum: BTreeMap::new(),
            },
            keypair,
        }
    }

    fn snapshot(
        quorums: &[QuorumNumber],
        total_stake: &[(QuorumNumber, u128)],
        operators: &[&Operator],
    ) -> RegistrySnapshot {
        RegistrySnapshot {
            reference_block: 99,
            quorum_numbers: quorums.to_vec(),
            total_stake_per_quorum: total_stake.iter().copied().collect(),
            quorum_apk_g1: BTreeMap::new(),
            quorum_apk_indices: quorums.iter().map(|_| 0u32).collect(),
            total_stake_indices: quorums.iter().map(|_| 0u32).collect(),
            operators: operators.iter().map(|o| o.record.clone()).collect(),
        }
    }

    #[test]
    fn s1_single_signer_meets_100_percent_threshold() {
        let o1 = operator(1, &[(0, 1000)]);
        let snapshot = snapshot(&[0], &[(0, 1000)], &[&o1]);

        let mut engine = AggregationEngine::new();
        let digest: TaskDigest = [42u8; 32];
        engine.initialize(0, digest, vec![0], vec![100], snapshot);

        let signature = o1.keypair.sign(&digest);
        let result = engine
            .submit(0, digest, signature, o1.record.operator_id)
            .unwrap()
            .expect("single signer at 100% stake must complete the task");

        assert!(result.witness.non_signer_pubkeys.is_empty());
        assert!(!engine.is_open(0));
    }

    #[test]
    fn s2_mixed_thresholds_only_one_quorum_passes() {
        let o1 = operator(1, &[(0, 600), (1, 400)]);
        let o2 = operator(2, &[(0, 400), (1, 600)]);
        let snap = snapshot(&[0, 1], &[(0, 1000), (1, 1000)], &[&o1, &o2]);

        let mut engine = AggregationEngine::new();
        let digest: TaskDigest = [7u8; 32];
        engine.initialize(0, digest, vec![0, 1], vec![60, 60], snap);

        let signature = o1.keypair.sign(&digest);
        let outcome = engine.submit(0, digest, signature, o1.record.operator_id).unwrap();

        assert!(outcome.is_none(), "quorum 1 is at 40% signed stake, below the 60% threshold");
        assert!(engine.is_open(0));
    }

    #[test]
    fn s3_second_signer_completes_both_quorums() {
        let o1 = operator(1, &[(0, 600), (1, 400)]);
        let o2 = operator(2, &[(0, 400), (1, 600)]);
        let snap = snapshot(&[0, 1], &[(0, 1000), (1, 1000)], &[&o1, &o2]);

        let mut engine = AggregationEngine::new();
        let digest: TaskDigest = [7u8; 32];
        engine.initialize(0, digest, vec![0, 1], vec![60, 60], snap);

        engine
            .submit(0, digest, o1.keypair.sign(&digest), o1.record.operator_id)
            .unwrap();
        let result = engine
            .submit(0, digest, o2.keypair.sign(&digest), o2.record.operator_id)
            .unwrap()
            .expect("both quorums reach 100% signed stake once O2 also signs");

        assert!(result.witness.non_signer_pubkeys.is_empty());
    }

    #[test]
    fn signature_from_an_operator_outside_the_snapshot_is_rejected() {
        let o1 = operator(1, &[(0, 1000)]);
        let snap = snapshot(&[0], &[(0, 1000)], &[&o1]);

        let mut engine = AggregationEngine::new();
        let digest: TaskDigest = [3u8; 32];
        engine.initialize(0, digest, vec![0], vec![100], snap);

        let o2 = operator(2, &[(0, 1000)]);
        let err = engine
            .submit(0, digest, o2.keypair.sign(&digest), o2.record.operator_id)
            .unwrap_err();
        assert_eq!(err, EngineError::NotInQuorum);
    }

    #[test]
    fn s4_duplicate_signature_before_completion_is_rejected() {
        let o1 = operator(1, &[(0, 600)]);
        let o2 = operator(2, &[(0, 400)]);
        let snap = snapshot(&[0], &[(0, 1000)], &[&o1, &o2]);

        let mut engine = AggregationEngine::new();
        let digest: TaskDigest = [9u8; 32];
        engine.initialize(0, digest, vec![0], vec![100], snap);

        let signature = o1.keypair.sign(&digest);
        engine.submit(0, digest, signature, o1.record.operator_id).unwrap();

        let err = engine
            .submit(0, digest, signature, o1.record.operator_id)
            .unwrap_err();
        assert_eq!(err, EngineError::DuplicateSignature);
    }

    #[test]
    fn s6_expiry_forgets_the_task_and_a_later_signature_is_unknown() {
        let o1 = operator(1, &[(0, 1000)]);
        let snap = snapshot(&[0], &[(0, 1000)], &[&o1]);

        let mut engine = AggregationEngine::new();
        let digest: TaskDigest = [11u8; 32];
        engine.initialize(0, digest, vec![0], vec![100], snap);

        assert!(engine.expire(0).is_some());
        assert!(!engine.is_open(0));

        let err = engine
            .submit(0, digest, o1.keypair.sign(&digest), o1.record.operator_id)
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownTask(0));
    }
}
