use std::sync::Arc;

use avs_handler::{CreateTaskRequest as HandlerCreateTaskRequest, Handler, ProcessSignedTaskResponseRequest};
use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::{ErrorObject, ErrorObjectOwned};
use serde::{Deserialize, Serialize};

use crate::LatestBlock;

#[derive(Debug, Serialize, Deserialize)]
pub struct InitOperatorParams {
    pub operator_address: String,
    #[serde(with = "hex::serde")]
    pub operator_id: Vec<u8>,
    pub operator_state_retriever_addr: String,
    pub registry_coordinator_addr: String,
    pub layer1_chain_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InitOperatorResult {
    pub ok: bool,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTaskResult {
    #[serde(with = "hex::serde")]
    pub alert_hash: Vec<u8>,
    pub quorum_numbers: Vec<u8>,
    pub quorum_threshold_percentages: Vec<u8>,
    pub task_index: u64,
    pub reference_block_number: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignedTaskRespResult {
    pub reply: bool,
    #[serde(with = "hex::serde")]
    pub tx_hash: Vec<u8>,
}

/// JSON-RPC binding, namespace `aggregator`.
#[rpc(server, namespace = "aggregator")]
pub trait AggregatorJsonRpc {
    #[method(name = "initOperator")]
    async fn init_operator(&self, params: InitOperatorParams) -> RpcResult<InitOperatorResult>;

    #[method(name = "createTask")]
    async fn create_task(&self, alert_hash: String) -> RpcResult<CreateTaskResult>;

    #[method(name = "processSignedTaskResponse")]
    async fn process_signed_task_response(
        &self,
        task_index: u64,
        alert_hash: String,
        reference_block_number: u32,
        operator_request_signature: String,
        operator_id: String,
    ) -> RpcResult<SignedTaskRespResult>;
}

fn bad_request(msg: impl std::fmt::Display) -> ErrorObjectOwned {
    ErrorObject::owned(-32602, msg.to_string(), None::<()>)
}

fn hex_to_array<const N: usize>(s: &str, field: &str) -> RpcResult<[u8; N]> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| bad_request(format!("{field}: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| bad_request(format!("{field} must be {N} bytes")))
}

pub struct AggregatorRpcImpl {
    handler: Handler,
    latest_block: Arc<dyn LatestBlock>,
}

impl AggregatorRpcImpl {
    pub fn new(handler: Handler, latest_block: Arc<dyn LatestBlock>) -> Self {
        Self { handler, latest_block }
    }
}

#[async_trait]
impl AggregatorJsonRpcServer for AggregatorRpcImpl {
    async fn init_operator(&self, params: InitOperatorParams) -> RpcResult<InitOperatorResult> {
        let operator_id: [u8; 32] = params
            .operator_id
            .try_into()
            .map_err(|_| bad_request("operator_id must be 32 bytes"))?;
        let response = self.handler.init_operator(avs_dispatcher::InitOperatorRequest {
            operator_address: params.operator_address,
            operator_id,
            operator_state_retriever_addr: params.operator_state_retriever_addr,
            registry_coordinator_addr: params.registry_coordinator_addr,
            layer1_chain_id: params.layer1_chain_id,
        });
        Ok(InitOperatorResult {
            ok: response.ok,
            reason: response.reason,
        })
    }

    async fn create_task(&self, alert_hash: String) -> RpcResult<CreateTaskResult> {
        let message_hash = hex_to_array::<32>(&alert_hash, "alertHash")?;
        let reference_block = self.latest_block.reference_block();
        let header = self
            .handler
            .create_task(HandlerCreateTaskRequest::Alert {
                message_hash,
                reference_block,
            })
            .await
            .map_err(bad_request)?;
        Ok(CreateTaskResult {
            alert_hash: message_hash.to_vec(),
            quorum_numbers: header.quorum_numbers,
            quorum_threshold_percentages: header.quorum_threshold_percentages,
            task_index: header.index,
            reference_block_number: header.reference_block,
        })
    }

    async fn process_signed_task_response(
        &self,
        task_index: u64,
        alert_hash: String,
        reference_block_number: u32,
        operator_request_signature: String,
        operator_id: String,
    ) -> RpcResult<SignedTaskRespResult> {
        let message_hash = hex_to_array::<32>(&alert_hash, "alertHash")?;
        let operator_id = hex_to_array::<32>(&operator_id, "operatorId")?;
        let operator_signature = hex_to_array::<64>(&operator_request_signature, "operatorRequestSignature")?;
        let digest = avs_crypto::alert_task_digest(message_hash, reference_block_number);

        let tx_hash = self
            .handler
            .process_signed_task_response(ProcessSignedTaskResponseRequest {
                task_index,
                task_digest: digest,
                operator_signature,
                operator_id,
            })
            .await
            .map_err(bad_request)?;

        Ok(SignedTaskRespResult {
            reply: tx_hash != [0u8; 32],
            tx_hash: tx_hash.to_vec(),
        })
    }
}
