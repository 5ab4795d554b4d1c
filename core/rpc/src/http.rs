use std::sync::Arc;

use avs_handler::{CreateTaskRequest as HandlerCreateTaskRequest, Handler, ProcessSignedTaskResponseRequest};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::LatestBlock;

#[derive(Clone)]
struct HttpState {
    handler: Handler,
    latest_block: Arc<dyn LatestBlock>,
}

/// Legacy JSON-over-HTTP binding. One route per method name, matching
/// `Aggregator.InitOperator` / `Aggregator.CreateTask` /
/// `Aggregator.ProcessSignedTaskResponse`.
pub fn legacy_http_router(handler: Handler, latest_block: Arc<dyn LatestBlock>) -> Router {
    let state = HttpState { handler, latest_block };
    Router::new()
        .route("/Aggregator.InitOperator", post(init_operator))
        .route("/Aggregator.CreateTask", post(create_task))
        .route(
            "/Aggregator.ProcessSignedTaskResponse",
            post(process_signed_task_response),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct InitOperatorBody {
    operator_address: String,
    #[serde(with = "hex::serde")]
    operator_id: Vec<u8>,
    operator_state_retriever_addr: String,
    registry_coordinator_addr: String,
    layer1_chain_id: u64,
}

#[derive(Debug, Serialize)]
struct InitOperatorReply {
    ok: bool,
    reason: String,
}

async fn init_operator(State(state): State<HttpState>, Json(body): Json<InitOperatorBody>) -> impl IntoResponse {
    let Ok(operator_id) = body.operator_id.try_into() else {
        return (StatusCode::BAD_REQUEST, "operator_id must be 32 bytes").into_response();
    };
    let response = state.handler.init_operator(avs_dispatcher::InitOperatorRequest {
        operator_address: body.operator_address,
        operator_id,
        operator_state_retriever_addr: body.operator_state_retriever_addr,
        registry_coordinator_addr: body.registry_coordinator_addr,
        layer1_chain_id: body.layer1_chain_id,
    });
    Json(InitOperatorReply {
        ok: response.ok,
        reason: response.reason,
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
struct CreateTaskBody {
    #[serde(with = "hex::serde")]
    alert_hash: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct AlertTaskInfoBody {
    #[serde(with = "hex::serde")]
    alert_hash: Vec<u8>,
    quorum_numbers: Vec<u8>,
    quorum_threshold_percentages: Vec<u8>,
    task_index: u64,
    reference_block_number: u64,
}

async fn create_task(State(state): State<HttpState>, Json(body): Json<CreateTaskBody>) -> impl IntoResponse {
    let Ok(message_hash): Result<[u8; 32], _> = body.alert_hash.clone().try_into() else {
        return (StatusCode::BAD_REQUEST, "alert_hash must be 32 bytes").into_response();
    };
    let reference_block = state.latest_block.reference_block();

    match state
        .handler
        .create_task(HandlerCreateTaskRequest::Alert {
            message_hash,
            reference_block,
        })
        .await
    {
        Ok(header) => Json(AlertTaskInfoBody {
            alert_hash: message_hash.to_vec(),
            quorum_numbers: header.quorum_numbers,
            quorum_threshold_percentages: header.quorum_threshold_percentages,
            task_index: header.index,
            reference_block_number: header.reference_block,
        })
        .into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct SignedTaskRespBody {
    task_index: u64,
    #[serde(with = "hex::serde")]
    alert_hash: Vec<u8>,
    reference_block_number: u32,
    #[serde(with = "hex::serde")]
    operator_request_signature: Vec<u8>,
    #[serde(with = "hex::serde")]
    operator_id: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct SignedTaskRespReply {
    reply: bool,
    #[serde(with = "hex::serde")]
    tx_hash: Vec<u8>,
}

async fn process_signed_task_response(
    State(state): State<HttpState>,
    Json(body): Json<SignedTaskRespBody>,
) -> impl IntoResponse {
    let Ok(message_hash): Result<[u8; 32], _> = body.alert_hash.clone().try_into() else {
        return (StatusCode::BAD_REQUEST, "alert_hash must be 32 bytes").into_response();
    };
    let Ok(operator_id): Result<[u8; 32], _> = body.operator_id.clone().try_into() else {
        return (StatusCode::BAD_REQUEST, "operator_id must be 32 bytes").into_response();
    };
    let Ok(operator_signature): Result<[u8; 64], _> = body.operator_request_signature.clone().try_into() else {
        return (StatusCode::BAD_REQUEST, "operator_request_signature must be 64 bytes").into_response();
    };
    let digest = avs_crypto::alert_task_digest(message_hash, body.reference_block_number);

    match state
        .handler
        .process_signed_task_response(ProcessSignedTaskResponseRequest {
            task_index: body.task_index,
            task_digest: digest,
            operator_signature,
            operator_id,
        })
        .await
    {
        Ok(tx_hash) => Json(SignedTaskRespReply {
            reply: tx_hash != [0u8; 32],
            tx_hash: tx_hash.to_vec(),
        })
        .into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}
