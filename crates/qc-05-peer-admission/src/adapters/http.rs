//! HTTP peer transport.
//!
//! Every route answers HTTP 200 with the `{success, ...}` envelope. Failures,
//! including unparseable bodies and query strings, become `success: false`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        ConnectInfo, Query, State,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::domain::AdmissionOutcome;
use crate::error::AdmissionError;
use crate::events::{
    BlockSubmission, BlocksPayload, CommonBlockPayload, Envelope, PeersPayload,
    TransactionSubmission, TransactionsPayload,
};
use crate::ports::{BlockAdmissionApi, PeerQueryApi, TransactionAdmissionApi};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub blocks: Arc<dyn BlockAdmissionApi>,
    pub transactions: Arc<dyn TransactionAdmissionApi>,
    pub queries: Arc<dyn PeerQueryApi>,
}

/// Build the peer transport router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/peer/blocks", post(submit_block).get(blocks_after))
        .route("/peer/blocks/common", get(common_block))
        .route(
            "/peer/transactions",
            post(submit_transactions).get(transactions_by_ids),
        )
        .route("/peer/status", get(status))
        .route("/peer/list", get(list_peers))
        .with_state(state)
}

/// Bind `addr` and serve the router until the listener fails.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Peer transport listening");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}

fn respond<T: Serialize>(result: Result<T, AdmissionError>) -> Response {
    match result {
        Ok(payload) => Json(Envelope::ok(payload)).into_response(),
        Err(e) => {
            debug!(error = %e, "Request failed");
            Json(Envelope::failure(e.reason().message())).into_response()
        }
    }
}

async fn submit_block(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<BlockSubmission>, JsonRejection>,
) -> Response {
    let submitter = connect.map(|ConnectInfo(addr)| addr.ip());
    let block = match body {
        Ok(Json(submission)) => submission.block,
        Err(e) => return Json(Envelope::failure(e.body_text())).into_response(),
    };

    match state.blocks.admit_block(block, submitter).await {
        AdmissionOutcome::Accepted => Json(Envelope::accepted()).into_response(),
        AdmissionOutcome::Rejected(reason) => {
            Json(Envelope::failure(reason.message())).into_response()
        }
    }
}

async fn submit_transactions(
    State(state): State<AppState>,
    body: Result<Json<TransactionSubmission>, JsonRejection>,
) -> Response {
    let submission = match body {
        Ok(Json(submission)) => submission,
        Err(e) => return Json(Envelope::failure(e.body_text())).into_response(),
    };

    respond(
        state
            .transactions
            .admit_transactions(submission.transactions, submission.is_broadcasted)
            .await,
    )
}

async fn status(State(state): State<AppState>) -> Response {
    respond(state.queries.status().await)
}

async fn list_peers(State(state): State<AppState>) -> Response {
    respond(
        state
            .queries
            .list_peers()
            .await
            .map(|peers| PeersPayload { peers }),
    )
}

#[derive(Debug, Deserialize)]
struct IdsQuery {
    ids: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlocksQuery {
    last_block_id: Option<String>,
    limit: Option<usize>,
}

fn query_ids(query: Result<Query<IdsQuery>, QueryRejection>) -> Result<String, AdmissionError> {
    match query {
        Ok(Query(IdsQuery { ids: Some(ids) })) => Ok(ids),
        Ok(_) => Err(AdmissionError::BadRequest("missing ids".into())),
        Err(e) => Err(AdmissionError::BadRequest(e.body_text())),
    }
}

async fn common_block(
    State(state): State<AppState>,
    query: Result<Query<IdsQuery>, QueryRejection>,
) -> Response {
    let result = match query_ids(query) {
        Ok(ids) => state.queries.common_block(&ids).await,
        Err(e) => Err(e),
    };
    respond(result.map(|common| CommonBlockPayload { common }))
}

async fn transactions_by_ids(
    State(state): State<AppState>,
    query: Result<Query<IdsQuery>, QueryRejection>,
) -> Response {
    let result = match query_ids(query) {
        Ok(ids) => state.queries.transactions_by_ids(&ids).await,
        Err(e) => Err(e),
    };
    respond(result.map(|transactions| TransactionsPayload { transactions }))
}

async fn blocks_after(
    State(state): State<AppState>,
    query: Result<Query<BlocksQuery>, QueryRejection>,
) -> Response {
    let result = match query {
        Ok(Query(BlocksQuery {
            last_block_id: Some(id),
            limit,
        })) => state.queries.blocks_after(&id, limit).await,
        Ok(_) => Err(AdmissionError::BadRequest("missing lastBlockId".into())),
        Err(e) => Err(AdmissionError::BadRequest(e.body_text())),
    };
    respond(result.map(|blocks| BlocksPayload { blocks }))
}
