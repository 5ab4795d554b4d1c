use avs_crypto::G1Point;
use avs_types::{FinishedTask, OperatorId, Task, TaskDigest, TaskIndex};
use thiserror::Error;

/// The two task shapes `CreateTask` can admit. `reference_block` is
/// supplied by the caller -- the dispatcher trusts it has already been
/// checked against the chain head, a concern this core does not own.
#[derive(Debug, Clone)]
pub enum TaskAdmission {
    Alert {
        message_hash: [u8; 32],
    },
    Generic {
        method: [u8; 32],
        call_params: Vec<Vec<u8>>,
        chain_id: u64,
    },
}

#[derive(Debug, Clone)]
pub struct CreateTaskCommand {
    pub admission: TaskAdmission,
    pub reference_block: u64,
}

#[derive(Debug, Clone)]
pub struct ProcessSignedResponseCommand {
    pub index: TaskIndex,
    pub digest: TaskDigest,
    pub signature: G1Point,
    pub operator_id: OperatorId,
}

/// What `ProcessSignedResponse` returns once a signature has been
/// accepted by the engine.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// Accepted, but the task has not yet met every quorum's threshold.
    Accepted,
    /// This signature was the one that met every quorum's threshold and
    /// the Submitter has confirmed inclusion.
    Completed { tx_hash: [u8; 32] },
}

pub(crate) enum Command {
    CreateTask(CreateTaskCommand),
    ProcessSignedResponse(ProcessSignedResponseCommand),
    GetFinishedTask(TaskDigest),
    /// Self-sent when a task's deadline timer fires. Never issued by a
    /// caller of [`crate::Dispatcher`].
    Expire(TaskIndex),
}

pub(crate) enum Reply {
    CreateTask(Result<Task, DispatchError>),
    ProcessSignedResponse(Result<ProcessOutcome, DispatchError>),
    GetFinishedTask(Option<FinishedTask>),
    Expire,
}

/// The dispatcher's error taxonomy, minus `ConfigMismatch` (owned by the
/// session table, see [`crate::sessions`]).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("digest is already finished with tx {tx_hash:?}")]
    AlreadyFinished { tx_hash: [u8; 32] },
    #[error("no open task with that index/digest")]
    UnknownTask,
    #[error("digest does not match the task's recorded digest")]
    DigestMismatch,
    #[error("operator is not opted into any of the task's quorums")]
    NotInQuorum,
    #[error("signature does not verify")]
    BadSignature,
    #[error("operator has already signed this task")]
    DuplicateSignature,
    #[error("registry view unavailable: {0}")]
    RegistryUnavailable(String),
    #[error("submitter failed: {0}")]
    SubmitFailure(String),
    #[error("dispatcher is shutting down")]
    ShuttingDown,
}

impl From<avs_aggregation::EngineError> for DispatchError {
    fn from(e: avs_aggregation::EngineError) -> Self {
        use avs_aggregation::EngineError::*;
        match e {
            UnknownTask(_) => DispatchError::UnknownTask,
            DigestMismatch => DispatchError::DigestMismatch,
            NotInQuorum => DispatchError::NotInQuorum,
            DuplicateSignature => DispatchError::DuplicateSignature,
            BadSignature => DispatchError::BadSignature,
        }
    }
}
