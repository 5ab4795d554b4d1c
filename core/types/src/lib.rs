//! Wire-agnostic domain types shared by every component of the aggregator
//! core. Nothing in this crate depends on a particular RPC transport or on
//! the BN254 point representation used by [`avs_crypto`]; those live closer
//! to the boundary that actually needs them.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// 32-byte Keccak-256 digest identifying a task for its whole lifetime.
pub type TaskDigest = [u8; 32];

/// Monotonically increasing task handle assigned at admission time.
pub type TaskIndex = u64;

/// Stake-bucket identifier. Quorums are small integers in `0..=255`.
pub type QuorumNumber = u8;

/// Minimum percent (of a quorum's total stake) that must have signed,
/// `0..=100`.
pub type ThresholdPercentage = u8;

/// 32-byte opaque operator identifier, as handed out by the registry.
pub type OperatorId = [u8; 32];

/// Block height constants mirrored from the verifier contract.
pub const CHALLENGE_WINDOW_BLOCKS: u64 = 100;
pub const BLOCK_TIME: Duration = Duration::from_secs(12);

/// `challengeWindowBlocks * blockTimeDuration`.
pub fn task_time_to_expiry() -> Duration {
    BLOCK_TIME * CHALLENGE_WINDOW_BLOCKS as u32
}

/// The two task shapes the source system supports, modeled as one enum
/// rather than a type hierarchy since every other component treats a task
/// as one value regardless of payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPayload {
    /// The legacy/gRPC "alert" task: a single opaque message hash.
    Alert { message_hash: [u8; 32] },
    /// The generic task: a method selector plus pre-decoded call
    /// parameters the Submitter forwards verbatim.
    Generic {
        method: [u8; 32],
        call_params: Vec<Vec<u8>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Open,
    Completed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub index: TaskIndex,
    pub digest: TaskDigest,
    pub reference_block: u64,
    pub quorum_numbers: Vec<QuorumNumber>,
    pub quorum_threshold_percentages: Vec<ThresholdPercentage>,
    pub payload: TaskPayload,
    #[serde(with = "system_time_as_unix_secs")]
    pub created_at: SystemTime,
    #[serde(with = "system_time_as_unix_secs")]
    pub expires_at: SystemTime,
    pub state: TaskState,
}

impl Task {
    /// `thresholds[i]` paired with `quorum_numbers[i]`. Returns `None` if a
    /// quorum is not present on this task (should not happen for
    /// well-formed tasks; callers that hit `None` have a bug upstream).
    pub fn threshold_for(&self, quorum: QuorumNumber) -> Option<ThresholdPercentage> {
        self.quorum_numbers
            .iter()
            .position(|q| *q == quorum)
            .map(|i| self.quorum_threshold_percentages[i])
    }
}

/// The on-chain confirmation receipt for a completed task, recorded once
/// and never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishedTask {
    pub task: Task,
    pub tx_hash: [u8; 32],
    pub block_hash: [u8; 32],
    pub block_number: u64,
    pub tx_index: u32,
}

mod system_time_as_unix_secs {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        let secs = t
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        secs.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(UNIX_EPOCH + Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_for_looks_up_by_quorum() {
        let task = Task {
            index: 0,
            digest: [0u8; 32],
            reference_block: 10,
            quorum_numbers: vec![0, 1],
            quorum_threshold_percentages: vec![60, 80],
            payload: TaskPayload::Alert {
                message_hash: [1u8; 32],
            },
            created_at: SystemTime::UNIX_EPOCH,
            expires_at: SystemTime::UNIX_EPOCH,
            state: TaskState::Open,
        };
        assert_eq!(task.threshold_for(0), Some(60));
        assert_eq!(task.threshold_for(1), Some(80));
        assert_eq!(task.threshold_for(2), None);
    }
}
