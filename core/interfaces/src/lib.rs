//! Trait contracts for the aggregator core's external collaborators:
//! the on-chain registry reader and the transaction submitter.
//! Everything here is interface-only: no concrete chain reader or
//! transaction sender lives in this crate, matching
//! `lightning-interfaces::rpc::RpcInterface`'s style of a bare async trait
//! the binding crates implement.

use std::collections::BTreeMap;

use async_trait::async_trait;
use avs_crypto::{G1Point, G2Point};
use avs_types::{OperatorId, QuorumNumber, Task, ThresholdPercentage};
use thiserror::Error;

/// A single operator's snapshot-scoped record, as returned by
/// [`RegistryView::operators_at`].
#[derive(Debug, Clone)]
pub struct OperatorRecord {
    pub operator_id: OperatorId,
    pub pubkey_g1: G1Point,
    pub pubkey_g2: G2Point,
    /// Stake this operator has in each quorum it is opted into, restricted
    /// to the quorums of interest for the snapshot that produced this
    /// record.
    pub stake_per_quorum: BTreeMap<QuorumNumber, u128>,
    /// Index into the registry's quorum-bitmap history at the snapshot's
    /// reference block, used to build `nonSignerQuorumBitmapIndices` if
    /// this operator ends up not signing.
    pub quorum_bitmap_index: u32,
    /// Per-quorum index into the registry's non-signer-stake history,
    /// used to build `nonSignerStakeIndices[quorumIndex][nonSignerIndex]`.
    pub non_signer_stake_index_per_quorum: BTreeMap<QuorumNumber, u32>,
}

impl OperatorRecord {
    pub fn is_opted_into(&self, quorum: QuorumNumber) -> bool {
        self.stake_per_quorum.contains_key(&quorum)
    }
}

/// Everything the aggregation engine needs from the registry for one task,
/// frozen at `reference_block`.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub reference_block: u64,
    /// The task's quorums, in the order used to index `quorum_apk_indices`
    /// and `total_stake_indices`.
    pub quorum_numbers: Vec<QuorumNumber>,
    pub total_stake_per_quorum: BTreeMap<QuorumNumber, u128>,
    pub quorum_apk_g1: BTreeMap<QuorumNumber, G1Point>,
    /// Parallel to `quorum_numbers`.
    pub quorum_apk_indices: Vec<u32>,
    /// Parallel to `quorum_numbers`.
    pub total_stake_indices: Vec<u32>,
    /// The full opt-in set across `quorum_numbers`, sorted by
    /// `operator_id` ascending so the non-signer ordering the witness
    /// needs is deterministic without a second sort.
    pub operators: Vec<OperatorRecord>,
}

impl RegistrySnapshot {
    pub fn operator(&self, id: &OperatorId) -> Option<&OperatorRecord> {
        self.operators.iter().find(|o| &o.operator_id == id)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Failures propagate as "registry unavailable" and are never partial.
    #[error("registry view unavailable: {0}")]
    Unavailable(String),
}

/// Read-only, referentially-transparent snapshot queries against the
/// on-chain registry at a given reference block.
#[async_trait]
pub trait RegistryView: Send + Sync {
    async fn quorums_at(&self, block: u64) -> Result<Vec<QuorumNumber>, RegistryError>;

    async fn thresholds_at(
        &self,
        block: u64,
        quorums: &[QuorumNumber],
    ) -> Result<Vec<ThresholdPercentage>, RegistryError>;

    async fn operators_at(
        &self,
        block: u64,
        quorums: &[QuorumNumber],
    ) -> Result<RegistrySnapshot, RegistryError>;

    async fn pubkey_of(&self, operator_id: OperatorId) -> Result<(G1Point, G2Point), RegistryError>;
}

/// The on-chain verifier call's witness argument.
#[derive(Debug, Clone)]
pub struct NonSignerStakesAndSignature {
    pub non_signer_quorum_bitmap_indices: Vec<u32>,
    pub non_signer_pubkeys: Vec<G1Point>,
    pub quorum_apks: Vec<G1Point>,
    pub apk_g2: G2Point,
    pub sigma: G1Point,
    pub quorum_apk_indices: Vec<u32>,
    pub total_stake_indices: Vec<u32>,
    /// `non_signer_stake_indices[quorum_index][non_signer_index]`.
    pub non_signer_stake_indices: Vec<Vec<u32>>,
}

#[derive(Debug, Clone)]
pub struct Receipt {
    pub tx_hash: [u8; 32],
    pub block_hash: [u8; 32],
    pub block_number: u64,
    pub tx_index: u32,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("submission failed: {0}")]
    Failed(String),
}

/// Consumes completed results, builds and sends the on-chain transaction,
/// and reports the receipt. `submit_confirmation` MUST be called at most
/// once per completed task.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit_confirmation(
        &self,
        task: &Task,
        witness: NonSignerStakesAndSignature,
    ) -> Result<Receipt, SubmitError>;
}
