//! Per-task signature collection, stake accounting, threshold evaluation
//! and deadline expiry. This crate holds no RPC- or store-shaped state;
//! the dispatcher is the only caller and drives both the store and this
//! engine from one command loop.

mod engine;
mod partial;

pub use engine::{AggregationEngine, CompletionResult, EngineError, TimeoutResult};
pub use partial::PartialAggregation;

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use ark_bn254::G1Projective;
    use ark_ec::CurveGroup;
    use ark_std::UniformRand;
    use avs_crypto::{hash_to_g1, G1Point, G2Point};
    use avs_interfaces::{OperatorRecord, RegistrySnapshot};
    use avs_types::OperatorId;
    use pretty_assertions::assert_eq;

    use super::*;

    fn keygen(rng: &mut impl ark_std::rand::RngCore) -> (ark_bn254::Fr, G1Point, G2Point) {
        use ark_bn254::{Fr, G2Projective};

        let sk = Fr::rand(rng);
        let pubkey_g1 = G1Point((G1Projective::generator() * sk).into_affine());
        let pubkey_g2 = G2Point((G2Projective::generator() * sk).into_affine());
        (sk, pubkey_g1, pubkey_g2)
    }

    fn sign(sk: ark_bn254::Fr, digest: &[u8; 32]) -> G1Point {
        let h = hash_to_g1(digest);
        G1Point((h.0 * sk).into_affine())
    }

    fn operator(id: u8, stake: u128, quorum: u8, pubkey_g1: G1Point, pubkey_g2: G2Point) -> OperatorRecord {
        OperatorRecord {
            operator_id: [id; 32],
            pubkey_g1,
            pubkey_g2,
            stake_per_quorum: BTreeMap::from([(quorum, stake)]),
            quorum_bitmap_index: id as u32,
            non_signer_stake_index_per_quorum: BTreeMap::from([(quorum, id as u32)]),
        }
    }

    #[test]
    fn single_quorum_full_threshold_completes_on_one_signature() {
        let mut rng = ark_std::test_rng();
        let (sk1, pk1_g1, pk1_g2) = keygen(&mut rng);
        let op1 = operator(1, 1000, 0, pk1_g1, pk1_g2);
        let operator_id: OperatorId = op1.operator_id;

        let snapshot = RegistrySnapshot {
            reference_block: 99,
            quorum_numbers: vec![0],
            total_stake_per_quorum: BTreeMap::from([(0, 1000)]),
            quorum_apk_g1: BTreeMap::from([(0, op1.pubkey_g1)]),
            quorum_apk_indices: vec![0],
            total_stake_indices: vec![0],
            operators: vec![op1],
        };

        let digest = [7u8; 32];
        let mut engine = AggregationEngine::new();
        engine.initialize(0, digest, vec![0], vec![100], snapshot);

        let sig = sign(sk1, &digest);
        let result = engine.submit(0, digest, sig, operator_id).unwrap();
        let completion = result.expect("single full-stake signer should complete the task");

        assert_eq!(completion.index, 0);
        assert!(completion.witness.non_signer_pubkeys.is_empty());
        assert!(!engine.is_open(0));
    }

    #[test]
    fn partial_threshold_leaves_task_open() {
        let mut rng = ark_std::test_rng();
        let (sk1, pk1_g1, pk1_g2) = keygen(&mut rng);
        let (_sk2, pk2_g1, pk2_g2) = keygen(&mut rng);
        let op1 = operator(1, 600, 0, pk1_g1, pk1_g2);
        let op2 = operator(2, 400, 0, pk2_g1, pk2_g2);

        let snapshot = RegistrySnapshot {
            reference_block: 99,
            quorum_numbers: vec![0],
            total_stake_per_quorum: BTreeMap::from([(0, 1000)]),
            quorum_apk_g1: BTreeMap::from([(0, op1.pubkey_g1.add(&op2.pubkey_g1))]),
            quorum_apk_indices: vec![0],
            total_stake_indices: vec![0],
            operators: vec![op1.clone(), op2],
        };

        let digest = [9u8; 32];
        let mut engine = AggregationEngine::new();
        engine.initialize(0, digest, vec![0], vec![100], snapshot);

        let sig = sign(sk1, &digest);
        let result = engine.submit(0, digest, sig, op1.operator_id).unwrap();
        assert!(result.is_none(), "60% of stake must not meet a 100% threshold");
        assert!(engine.is_open(0));
    }

    #[test]
    fn duplicate_signature_is_rejected() {
        let mut rng = ark_std::test_rng();
        let (sk1, pk1_g1, pk1_g2) = keygen(&mut rng);
        let op1 = operator(1, 1000, 0, pk1_g1, pk1_g2);
        let snapshot = RegistrySnapshot {
            reference_block: 99,
            quorum_numbers: vec![0],
            total_stake_per_quorum: BTreeMap::from([(0, 2000)]),
            quorum_apk_g1: BTreeMap::from([(0, op1.pubkey_g1)]),
            quorum_apk_indices: vec![0],
            total_stake_indices: vec![0],
            operators: vec![op1.clone()],
        };

        let digest = [3u8; 32];
        let mut engine = AggregationEngine::new();
        engine.initialize(0, digest, vec![0], vec![100], snapshot);

        let sig = sign(sk1, &digest);
        engine.submit(0, digest, sig, op1.operator_id).unwrap();
        let err = engine.submit(0, digest, sig, op1.operator_id).unwrap_err();
        assert_eq!(err, EngineError::DuplicateSignature);
    }

    #[test]
    fn signature_for_unknown_task_is_rejected() {
        let digest = [1u8; 32];
        let mut engine = AggregationEngine::new();
        let err = engine
            .submit(42, digest, G1Point::identity(), [0u8; 32])
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownTask(42));
    }

    #[test]
    fn expiry_forgets_the_task() {
        let snapshot = RegistrySnapshot {
            reference_block: 1,
            quorum_numbers: vec![0],
            total_stake_per_quorum: BTreeMap::new(),
            quorum_apk_g1: BTreeMap::new(),
            quorum_apk_indices: vec![0],
            total_stake_indices: vec![0],
            operators: vec![],
        };
        let digest = [5u8; 32];
        let mut engine = AggregationEngine::new();
        engine.initialize(7, digest, vec![0], vec![100], snapshot);
        assert!(engine.is_open(7));

        let timeout = engine.expire(7).expect("task was open and should time out");
        assert_eq!(timeout.index, 7);
        assert!(!engine.is_open(7));

        let err = engine
            .submit(7, digest, G1Point::identity(), [0u8; 32])
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownTask(7));
    }
}
