use std::sync::Arc;
use std::time::SystemTime;

use affair::{AsyncWorker, Executor, Socket, TokioSpawn};
use avs_aggregation::AggregationEngine;
use avs_interfaces::{RegistryView, Submitter};
use avs_store::TaskStore;
use avs_types::{task_time_to_expiry, QuorumNumber, Task, TaskPayload, TaskState};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::command::{Command, CreateTaskCommand, DispatchError, ProcessOutcome, ProcessSignedResponseCommand, Reply, TaskAdmission};

pub(crate) struct DispatcherWorker {
    store: TaskStore,
    engine: AggregationEngine,
    registry: Arc<dyn RegistryView>,
    submitter: Arc<dyn Submitter>,
    quorum_numbers: Vec<QuorumNumber>,
    /// Set once, immediately after this worker is spawned, so timer tasks
    /// can send themselves an `Expire` command through the very socket
    /// that dispatches to this worker.
    self_socket: Arc<OnceCell<Socket<Command, Reply>>>,
}

impl DispatcherWorker {
    pub fn spawn(
        registry: Arc<dyn RegistryView>,
        submitter: Arc<dyn Submitter>,
        quorum_numbers: Vec<QuorumNumber>,
    ) -> Socket<Command, Reply> {
        let self_socket = Arc::new(OnceCell::new());
        let worker = DispatcherWorker {
            store: TaskStore::new(),
            engine: AggregationEngine::new(),
            registry,
            submitter,
            quorum_numbers,
            self_socket: self_socket.clone(),
        };
        let socket = TokioSpawn::spawn_async(worker);
        let _ = self_socket.set(socket.clone());
        socket
    }

    async fn handle_create_task(&mut self, cmd: CreateTaskCommand) -> Result<Task, DispatchError> {
        let digest = match &cmd.admission {
            TaskAdmission::Alert { message_hash } => {
                avs_crypto::alert_task_digest(*message_hash, cmd.reference_block as u32)
            }
            TaskAdmission::Generic {
                method,
                call_params,
                chain_id,
            } => avs_crypto::generic_task_digest(
                avs_crypto::hash_call_params(call_params),
                cmd.reference_block as u32,
                *method,
                *chain_id,
            ),
        };

        if let Some(finished) = self.store.finished_by_digest(&digest) {
            return Err(DispatchError::AlreadyFinished {
                tx_hash: finished.tx_hash,
            });
        }
        if let Some(existing) = self.store.open_by_digest(&digest) {
            return Ok(existing.clone());
        }

        let thresholds = self
            .registry
            .thresholds_at(cmd.reference_block, &self.quorum_numbers)
            .await
            .map_err(|e| DispatchError::RegistryUnavailable(e.to_string()))?;
        let snapshot = self
            .registry
            .operators_at(cmd.reference_block, &self.quorum_numbers)
            .await
            .map_err(|e| DispatchError::RegistryUnavailable(e.to_string()))?;

        let index = self.store.new_index();
        let now = SystemTime::now();
        let ttl = task_time_to_expiry();
        let payload = match cmd.admission {
            TaskAdmission::Alert { message_hash } => TaskPayload::Alert { message_hash },
            TaskAdmission::Generic { method, call_params, .. } => {
                TaskPayload::Generic { method, call_params }
            }
        };
        let task = Task {
            index,
            digest,
            reference_block: cmd.reference_block,
            quorum_numbers: self.quorum_numbers.clone(),
            quorum_threshold_percentages: thresholds.clone(),
            payload,
            created_at: now,
            expires_at: now + ttl,
            state: TaskState::Open,
        };

        self.store
            .put_open(task.clone())
            .expect("digest was just checked to be neither open nor finished");
        self.engine.initialize(
            index,
            digest,
            self.quorum_numbers.clone(),
            thresholds,
            snapshot,
        );

        if let Some(socket) = self.self_socket.get() {
            let socket = socket.clone();
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                let _ = socket.run(Command::Expire(index)).await;
            });
        }

        Ok(task)
    }

    async fn handle_process_signed_response(
        &mut self,
        cmd: ProcessSignedResponseCommand,
    ) -> Result<ProcessOutcome, DispatchError> {
        let completion = self
            .engine
            .submit(cmd.index, cmd.digest, cmd.signature, cmd.operator_id)?;

        let Some(completion) = completion else {
            return Ok(ProcessOutcome::Accepted);
        };

        if let Some(task) = self.store.by_index_mut(cmd.index) {
            task.state = TaskState::Completed;
        }
        let task = self
            .store
            .by_index(cmd.index)
            .cloned()
            .ok_or(DispatchError::UnknownTask)?;

        match self.submitter.submit_confirmation(&task, completion.witness).await {
            Ok(receipt) => {
                let finished = avs_types::FinishedTask {
                    task,
                    tx_hash: receipt.tx_hash,
                    block_hash: receipt.block_hash,
                    block_number: receipt.block_number,
                    tx_index: receipt.tx_index,
                };
                if let Err(e) = self.store.finish(cmd.digest, finished) {
                    error!(index = cmd.index, error = %e, "store refused to finish a just-completed task");
                }
                info!(index = cmd.index, "task completed and confirmed on-chain");
                Ok(ProcessOutcome::Completed {
                    tx_hash: receipt.tx_hash,
                })
            }
            Err(e) => {
                error!(index = cmd.index, error = %e, "submitter failed, task left unfinished");
                Err(DispatchError::SubmitFailure(e.to_string()))
            }
        }
    }

    fn handle_get_finished_task(&self, digest: avs_types::TaskDigest) -> Option<avs_types::FinishedTask> {
        self.store.finished_by_digest(&digest).cloned()
    }

    fn handle_expire(&mut self, index: avs_types::TaskIndex) {
        if self.engine.expire(index).is_some() {
            self.store.mark_expired(index);
            let removed = self.store.gc_expired(SystemTime::now());
            warn!(index, removed, "task expired before reaching threshold");
        }
    }
}

impl AsyncWorker for DispatcherWorker {
    type Request = Command;
    type Response = Reply;

    async fn handle(&mut self, req: Command) -> Reply {
        match req {
            Command::CreateTask(cmd) => Reply::CreateTask(self.handle_create_task(cmd).await),
            Command::ProcessSignedResponse(cmd) => {
                Reply::ProcessSignedResponse(self.handle_process_signed_response(cmd).await)
            }
            Command::GetFinishedTask(digest) => Reply::GetFinishedTask(self.handle_get_finished_task(digest)),
            Command::Expire(index) => {
                self.handle_expire(index);
                Reply::Expire
            }
        }
    }
}
