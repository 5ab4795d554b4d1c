use std::collections::{BTreeMap, HashSet};

use avs_crypto::{G1Point, G2Point};
use avs_types::{OperatorId, QuorumNumber};

/// Running state for one open task. Owned by the engine for the task's
/// lifetime and dropped on terminal transition.
#[derive(Debug, Clone)]
pub struct PartialAggregation {
    pub signed_stake_per_quorum: BTreeMap<QuorumNumber, u128>,
    pub aggregate_g1_signature: G1Point,
    pub aggregate_g2_pubkey: G2Point,
    pub signers: HashSet<OperatorId>,
}

impl PartialAggregation {
    pub fn empty(quorums: &[QuorumNumber]) -> Self {
        Self {
            signed_stake_per_quorum: quorums.iter().map(|q| (*q, 0u128)).collect(),
            aggregate_g1_signature: G1Point::identity(),
            aggregate_g2_pubkey: G2Point::identity(),
            signers: HashSet::new(),
        }
    }

    pub fn has_signed(&self, operator: &OperatorId) -> bool {
        self.signers.contains(operator)
    }
}
