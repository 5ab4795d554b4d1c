use std::sync::Arc;

use avs_handler::{CreateTaskRequest as HandlerCreateTaskRequest, Handler, ProcessSignedTaskResponseRequest};
use tonic::{Request, Response, Status};

use crate::LatestBlock;

pub mod proto {
    tonic::include_proto!("aggregator");
}

use proto::aggregator_server::Aggregator;
use proto::{
    AlertTaskInfo,
    CreateTaskRequest,
    CreateTaskResponse,
    InitOperatorRequest,
    InitOperatorResponse,
    SignedTaskRespRequest,
    SignedTaskRespResponse,
};

fn to_array32(bytes: &[u8], field: &str) -> Result<[u8; 32], Status> {
    bytes
        .try_into()
        .map_err(|_| Status::invalid_argument(format!("{field} must be 32 bytes")))
}

fn to_array64(bytes: &[u8], field: &str) -> Result<[u8; 64], Status> {
    bytes
        .try_into()
        .map_err(|_| Status::invalid_argument(format!("{field} must be 64 bytes")))
}

/// The gRPC binding. Holds a [`Handler`] and a [`LatestBlock`] source;
/// every RPC is a thin decode-dispatch-encode shim, matching the legacy
/// and JSON-RPC bindings' shape.
pub struct AggregatorGrpcService {
    handler: Handler,
    latest_block: Arc<dyn LatestBlock>,
}

impl AggregatorGrpcService {
    pub fn new(handler: Handler, latest_block: Arc<dyn LatestBlock>) -> Self {
        Self { handler, latest_block }
    }
}

#[tonic::async_trait]
impl Aggregator for AggregatorGrpcService {
    async fn init_operator(
        &self,
        request: Request<InitOperatorRequest>,
    ) -> Result<Response<InitOperatorResponse>, Status> {
        let req = request.into_inner();
        let operator_id = to_array32(&req.operator_id, "operator_id")?;
        let response = self.handler.init_operator(avs_dispatcher::InitOperatorRequest {
            operator_address: req.operator_address,
            operator_id,
            operator_state_retriever_addr: req.operator_state_retriever_addr,
            registry_coordinator_addr: req.registry_coordinator_addr,
            layer1_chain_id: req.layer1_chain_id as u64,
        });
        Ok(Response::new(InitOperatorResponse {
            ok: response.ok,
            reason: response.reason,
        }))
    }

    async fn create_task(
        &self,
        request: Request<CreateTaskRequest>,
    ) -> Result<Response<CreateTaskResponse>, Status> {
        let req = request.into_inner();
        let message_hash = to_array32(&req.alert_hash, "alert_hash")?;
        let reference_block = self.latest_block.reference_block();

        let header = self
            .handler
            .create_task(HandlerCreateTaskRequest::Alert {
                message_hash,
                reference_block,
            })
            .await
            .map_err(|e| Status::internal(e.to_string()))?;

        Ok(Response::new(CreateTaskResponse {
            info: Some(AlertTaskInfo {
                alert_hash: message_hash.to_vec(),
                quorum_numbers: header.quorum_numbers,
                quorum_threshold_percentages: header.quorum_threshold_percentages,
                task_index: header.index as u32,
                reference_block_number: header.reference_block,
            }),
        }))
    }

    async fn process_signed_task_response(
        &self,
        request: Request<SignedTaskRespRequest>,
    ) -> Result<Response<SignedTaskRespResponse>, Status> {
        let req = request.into_inner();
        let alert = req
            .alert
            .ok_or_else(|| Status::invalid_argument("alert is required"))?;
        let message_hash = to_array32(&alert.alert_hash, "alert_hash")?;
        let operator_id = to_array32(&req.operator_id, "operator_id")?;
        let signature = to_array64(&req.operator_request_signature, "operator_request_signature")?;
        let digest = avs_crypto::alert_task_digest(message_hash, alert.reference_block_number as u32);

        let tx_hash = self
            .handler
            .process_signed_task_response(ProcessSignedTaskResponseRequest {
                task_index: alert.task_index as u64,
                task_digest: digest,
                operator_signature: signature,
                operator_id,
            })
            .await
            .map_err(|e| Status::internal(e.to_string()))?;

        Ok(Response::new(SignedTaskRespResponse {
            reply: tx_hash != [0u8; 32],
            tx_hash: tx_hash.to_vec(),
        }))
    }
}
