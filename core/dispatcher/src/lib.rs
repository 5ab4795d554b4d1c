//! The single-writer command loop plus the operator session table. RPC
//! bindings and the handler surface hold only a [`Dispatcher`] handle;
//! every mutation of the task store or aggregation engine funnels
//! through one `affair` worker, which is what lets those two live
//! lock-free.

mod command;
mod sessions;
mod worker;

use std::sync::Arc;

use affair::{Executor, Socket};
use avs_interfaces::{RegistryView, Submitter};
use avs_types::{FinishedTask, OperatorId, QuorumNumber, Task, TaskDigest, TaskIndex};

pub use command::{CreateTaskCommand, DispatchError, ProcessOutcome, ProcessSignedResponseCommand, TaskAdmission};
pub use sessions::{AggregatorIdentity, ConfigMismatch, InitOperatorRequest, OperatorSession};

use command::{Command, Reply};
use sessions::SessionTable;
use worker::DispatcherWorker;

/// A handle to the running dispatcher. Cheap to clone; every clone talks
/// to the same worker task.
#[derive(Clone)]
pub struct Dispatcher {
    socket: Socket<Command, Reply>,
    sessions: Arc<SessionTable>,
    identity: AggregatorIdentity,
}

impl Dispatcher {
    pub fn spawn(
        registry: Arc<dyn RegistryView>,
        submitter: Arc<dyn Submitter>,
        quorum_numbers: Vec<QuorumNumber>,
        identity: AggregatorIdentity,
    ) -> Self {
        let socket = DispatcherWorker::spawn(registry, submitter, quorum_numbers);
        Self {
            socket,
            sessions: Arc::new(SessionTable::new()),
            identity,
        }
    }

    /// Validates the caller's configuration against this aggregator's
    /// identity and records a liveness entry. Runs outside the
    /// single-writer loop -- it never touches the store or engine.
    pub fn init_operator(&self, req: InitOperatorRequest) -> Result<(), ConfigMismatch> {
        self.sessions.init_operator(&self.identity, req)
    }

    pub fn operator_session(&self, operator_address: &str) -> Option<OperatorSession> {
        self.sessions.session_of(operator_address)
    }

    pub async fn create_task(&self, cmd: CreateTaskCommand) -> Result<Task, DispatchError> {
        match self.socket.run(Command::CreateTask(cmd)).await {
            Ok(Reply::CreateTask(result)) => result,
            Ok(_) => unreachable!("CreateTask always replies with Reply::CreateTask"),
            Err(_) => Err(DispatchError::ShuttingDown),
        }
    }

    pub async fn process_signed_response(
        &self,
        cmd: ProcessSignedResponseCommand,
    ) -> Result<ProcessOutcome, DispatchError> {
        match self.socket.run(Command::ProcessSignedResponse(cmd)).await {
            Ok(Reply::ProcessSignedResponse(result)) => result,
            Ok(_) => unreachable!("ProcessSignedResponse always replies with Reply::ProcessSignedResponse"),
            Err(_) => Err(DispatchError::ShuttingDown),
        }
    }

    pub async fn get_finished_task(&self, digest: TaskDigest) -> Option<FinishedTask> {
        match self.socket.run(Command::GetFinishedTask(digest)).await {
            Ok(Reply::GetFinishedTask(result)) => result,
            _ => None,
        }
    }
}

/// Re-exported so callers constructing a [`ProcessSignedResponseCommand`]
/// don't need to depend on `avs_types` just for these aliases.
pub type Index = TaskIndex;
pub type Operator = OperatorId;

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use avs_interfaces::{OperatorRecord, RegistrySnapshot};
    use avs_test_utils::{FixedRegistryView, Keypair, MockSubmitter};

    use super::*;

    fn identity() -> AggregatorIdentity {
        AggregatorIdentity {
            operator_state_retriever_addr: "0xretriever".into(),
            registry_coordinator_addr: "0xcoordinator".into(),
            layer1_chain_id: 1,
        }
    }

    fn single_operator_registry(stake: u128) -> (FixedRegistryView, Keypair, OperatorId) {
        let mut rng = ark_std::test_rng();
        let keypair = Keypair::generate(&mut rng);
        let operator_id: OperatorId = [1u8; 32];

        let record = OperatorRecord {
            operator_id,
            pubkey_g1: keypair.pubkey_g1,
            pubkey_g2: keypair.pubkey_g2,
            stake_per_quorum: BTreeMap::from([(0, stake)]),
            quorum_bitmap_index: 0,
            non_signer_stake_index_per_quorum: BTreeMap::new(),
        };

        let mut registry = FixedRegistryView::new(vec![0], HashMap::from([(0, 100)]));
        registry.insert_snapshot(
            99,
            RegistrySnapshot {
                reference_block: 99,
                quorum_numbers: vec![0],
                total_stake_per_quorum: BTreeMap::from([(0, stake)]),
                quorum_apk_g1: BTreeMap::from([(0, record.pubkey_g1)]),
                quorum_apk_indices: vec![0],
                total_stake_indices: vec![0],
                operators: vec![record],
            },
        );
        (registry, keypair, operator_id)
    }

    #[tokio::test]
    async fn happy_path_single_signer_completes_and_submits() {
        let (registry, keypair, operator_id) = single_operator_registry(1000);
        let submitter = Arc::new(MockSubmitter::new());
        let dispatcher = Dispatcher::spawn(
            Arc::new(registry),
            submitter.clone(),
            vec![0],
            identity(),
        );

        let task = dispatcher
            .create_task(CreateTaskCommand {
                admission: TaskAdmission::Alert {
                    message_hash: [42u8; 32],
                },
                reference_block: 99,
            })
            .await
            .unwrap();
        assert_eq!(task.index, 0);

        let signature = keypair.sign(&task.digest);
        let outcome = dispatcher
            .process_signed_response(ProcessSignedResponseCommand {
                index: task.index,
                digest: task.digest,
                signature,
                operator_id,
            })
            .await
            .unwrap();

        assert!(matches!(outcome, ProcessOutcome::Completed { .. }));
        assert_eq!(submitter.submission_count(), 1);

        let finished = dispatcher.get_finished_task(task.digest).await;
        assert!(finished.is_some());
    }

    #[tokio::test]
    async fn repeat_create_task_dedups_to_the_same_index() {
        let (registry, _keypair, _operator_id) = single_operator_registry(1000);
        let dispatcher = Dispatcher::spawn(
            Arc::new(registry),
            Arc::new(MockSubmitter::new()),
            vec![0],
            identity(),
        );

        let admission = || TaskAdmission::Alert {
            message_hash: [5u8; 32],
        };
        let first = dispatcher
            .create_task(CreateTaskCommand {
                admission: admission(),
                reference_block: 99,
            })
            .await
            .unwrap();
        let second = dispatcher
            .create_task(CreateTaskCommand {
                admission: admission(),
                reference_block: 99,
            })
            .await
            .unwrap();
        assert_eq!(first.index, second.index);
    }

    #[tokio::test]
    async fn signature_after_completion_is_unknown_task() {
        let (registry, keypair, operator_id) = single_operator_registry(1000);
        let dispatcher = Dispatcher::spawn(
            Arc::new(registry),
            Arc::new(MockSubmitter::new()),
            vec![0],
            identity(),
        );

        let task = dispatcher
            .create_task(CreateTaskCommand {
                admission: TaskAdmission::Alert {
                    message_hash: [1u8; 32],
                },
                reference_block: 99,
            })
            .await
            .unwrap();
        let signature = keypair.sign(&task.digest);
        dispatcher
            .process_signed_response(ProcessSignedResponseCommand {
                index: task.index,
                digest: task.digest,
                signature,
                operator_id,
            })
            .await
            .unwrap();

        let err = dispatcher
            .process_signed_response(ProcessSignedResponseCommand {
                index: task.index,
                digest: task.digest,
                signature,
                operator_id,
            })
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::UnknownTask);
    }

    #[tokio::test]
    async fn already_finished_digest_is_rejected_on_readmission() {
        let (registry, keypair, operator_id) = single_operator_registry(1000);
        let dispatcher = Dispatcher::spawn(
            Arc::new(registry),
            Arc::new(MockSubmitter::new()),
            vec![0],
            identity(),
        );

        let message_hash = [8u8; 32];
        let task = dispatcher
            .create_task(CreateTaskCommand {
                admission: TaskAdmission::Alert { message_hash },
                reference_block: 99,
            })
            .await
            .unwrap();
        let signature = keypair.sign(&task.digest);
        dispatcher
            .process_signed_response(ProcessSignedResponseCommand {
                index: task.index,
                digest: task.digest,
                signature,
                operator_id,
            })
            .await
            .unwrap();

        let err = dispatcher
            .create_task(CreateTaskCommand {
                admission: TaskAdmission::Alert { message_hash },
                reference_block: 100,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::AlreadyFinished { .. }));
    }
}
