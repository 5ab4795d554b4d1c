//! The handler surface: the one method set every RPC binding calls into.
//! Bindings own wire decoding for their own transport (protobuf, JSON,
//! JSON-RPC params); this crate owns validation and the translation into
//! [`avs_dispatcher::Dispatcher`] commands, so that the three bindings
//! can never drift in behavior.

use avs_crypto::{g1_from_onchain, G1Point, OnChainG1Point};
use avs_dispatcher::{
    ConfigMismatch,
    CreateTaskCommand,
    Dispatcher,
    DispatchError,
    InitOperatorRequest as DispatcherInitOperatorRequest,
    ProcessOutcome,
    ProcessSignedResponseCommand,
    TaskAdmission,
};
use avs_types::{FinishedTask, OperatorId, Task, TaskDigest, TaskIndex};
use ethers::abi::{self, ParamType, Token};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("malformed request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// What a binding passes in to admit a task. `reference_block` is supplied
/// by the binding, which is the layer that actually talks to the chain
/// client and knows its current view of the head -- a concern the core
/// deliberately leaves external. It must be strictly less than the
/// aggregator's own view of the latest block.
#[derive(Debug, Clone)]
pub enum CreateTaskRequest {
    Alert {
        message_hash: [u8; 32],
        reference_block: u64,
    },
    Generic {
        method: [u8; 32],
        call_params: Vec<Vec<u8>>,
        chain_id: u64,
        reference_block: u64,
    },
}

#[derive(Debug, Clone)]
pub struct TaskHeader {
    pub index: TaskIndex,
    pub digest: TaskDigest,
    pub reference_block: u64,
    pub quorum_numbers: Vec<u8>,
    pub quorum_threshold_percentages: Vec<u8>,
}

impl From<Task> for TaskHeader {
    fn from(task: Task) -> Self {
        TaskHeader {
            index: task.index,
            digest: task.digest,
            reference_block: task.reference_block,
            quorum_numbers: task.quorum_numbers,
            quorum_threshold_percentages: task.quorum_threshold_percentages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessSignedTaskResponseRequest {
    pub task_index: TaskIndex,
    pub task_digest: TaskDigest,
    /// The 64-byte `{X, Y}` on-chain serialization of a BLS G1 signature.
    pub operator_signature: [u8; 64],
    pub operator_id: OperatorId,
}

#[derive(Debug, Clone)]
pub struct InitOperatorResponse {
    pub ok: bool,
    pub reason: String,
}

/// Unpacks a raw ABI-encoded `bytes[]` blob into individual call
/// parameters. An empty blob decodes to an empty parameter list, for a
/// generic task whose inputs are empty except for the signature.
pub fn unpack_call_params(raw: &[u8]) -> Result<Vec<Vec<u8>>, HandlerError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let tokens = abi::decode(&[ParamType::Array(Box::new(ParamType::Bytes))], raw)
        .map_err(|e| HandlerError::BadRequest(format!("callParams: {e}")))?;
    match tokens.into_iter().next() {
        Some(Token::Array(items)) => items
            .into_iter()
            .map(|t| match t {
                Token::Bytes(b) => Ok(b),
                _ => Err(HandlerError::BadRequest("callParams element is not bytes".into())),
            })
            .collect(),
        _ => Err(HandlerError::BadRequest("callParams is not a bytes[] tuple".into())),
    }
}

fn signature_from_wire(bytes: &[u8; 64]) -> G1Point {
    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    x.copy_from_slice(&bytes[0..32]);
    y.copy_from_slice(&bytes[32..64]);
    g1_from_onchain(&OnChainG1Point { x, y })
}

/// The handler surface itself: one [`Dispatcher`] handle, shared by every
/// RPC binding that owns a clone of it.
#[derive(Clone)]
pub struct Handler {
    dispatcher: Dispatcher,
}

impl Handler {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Never errors at the transport level -- a config mismatch is
    /// reported in the response body, matching the wire shape
    /// `{ok: bool, reason: string}` used by all three bindings.
    pub fn init_operator(&self, req: DispatcherInitOperatorRequest) -> InitOperatorResponse {
        match self.dispatcher.init_operator(req) {
            Ok(()) => InitOperatorResponse {
                ok: true,
                reason: String::new(),
            },
            Err(ConfigMismatch) => {
                warn!("operator init rejected: configuration mismatch");
                InitOperatorResponse {
                    ok: false,
                    reason: "operator_state_retriever_addr/registry_coordinator_addr/layer1_chain_id mismatch".into(),
                }
            }
        }
    }

    /// Returns the existing task header if one with this digest is
    /// already Open, so a retried `CreateTask` call is idempotent.
    pub async fn create_task(&self, req: CreateTaskRequest) -> Result<TaskHeader, HandlerError> {
        let (admission, reference_block) = match req {
            CreateTaskRequest::Alert {
                message_hash,
                reference_block,
            } => (TaskAdmission::Alert { message_hash }, reference_block),
            CreateTaskRequest::Generic {
                method,
                call_params,
                chain_id,
                reference_block,
            } => (
                TaskAdmission::Generic {
                    method,
                    call_params,
                    chain_id,
                },
                reference_block,
            ),
        };

        let task = self
            .dispatcher
            .create_task(CreateTaskCommand {
                admission,
                reference_block,
            })
            .await?;
        Ok(TaskHeader::from(task))
    }

    pub async fn process_signed_task_response(
        &self,
        req: ProcessSignedTaskResponseRequest,
    ) -> Result<[u8; 32], HandlerError> {
        let signature = signature_from_wire(&req.operator_signature);
        let outcome = self
            .dispatcher
            .process_signed_response(ProcessSignedResponseCommand {
                index: req.task_index,
                digest: req.task_digest,
                signature,
                operator_id: req.operator_id,
            })
            .await?;

        match outcome {
            ProcessOutcome::Completed { tx_hash } => Ok(tx_hash),
            ProcessOutcome::Accepted => Ok([0u8; 32]),
        }
    }

    pub async fn get_finished_task(&self, digest: TaskDigest) -> Option<FinishedTask> {
        self.dispatcher.get_finished_task(digest).await
    }
}
