//! Request handlers.

use axum::{Json, extract::State, http::StatusCode};
use courier_store::Message;
use serde::{Deserialize, Serialize};
use tracing::warn;
use ulid::Ulid;

use crate::{AppState, error::ApiError};

/// Body of `POST /api/send`.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub content: String,
    /// Generated when absent. Must be unique among live records.
    #[serde(default)]
    pub message_id: Option<String>,
}

/// Response of `POST /api/send`.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub message_id: String,
}

/// Body of `POST /api/send-bulk`.
#[derive(Debug, Deserialize)]
pub struct SendBulkRequest {
    pub content: String,
    pub count: u32,
}

/// Response of `POST /api/send-bulk`.
#[derive(Debug, Serialize)]
pub struct SendBulkResponse {
    pub submitted: u32,
}

/// Health check body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub dispatcher: bool,
    pub store: bool,
}

/// Submit one message for delivery.
pub async fn send(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Result<(StatusCode, Json<SendResponse>), ApiError> {
    let message_id = request
        .message_id
        .unwrap_or_else(|| Ulid::new().to_string());

    let message_id = state
        .scheduler
        .submit(Message::new(message_id, request.content))
        .await?;

    Ok((StatusCode::ACCEPTED, Json(SendResponse { message_id })))
}

/// Submit `count` copies of a message, each under a generated id.
///
/// Submission stops at the first failure; the response reports how many
/// were durably accepted before it.
pub async fn send_bulk(
    State(state): State<AppState>,
    Json(request): Json<SendBulkRequest>,
) -> Result<(StatusCode, Json<SendBulkResponse>), ApiError> {
    let mut submitted = 0;

    for _ in 0..request.count {
        let message = Message::new(Ulid::new().to_string(), request.content.clone());
        match state.scheduler.submit(message).await {
            Ok(_) => submitted += 1,
            Err(e) if submitted == 0 => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, submitted, "bulk submission stopped early");
                break;
            }
        }
    }

    Ok((StatusCode::ACCEPTED, Json(SendBulkResponse { submitted })))
}

/// Snapshot of the engine counters.
pub async fn stats(State(state): State<AppState>) -> Json<courier_scheduler::Stats> {
    Json(state.scheduler.stats())
}

/// 200 while the dispatcher is alive and the store answers a probe.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let dispatcher = state.scheduler.is_running();
    let store = state.store.probe().await.is_ok();

    let (code, status) = if dispatcher && store {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    (
        code,
        Json(HealthResponse {
            status,
            dispatcher,
            store,
        }),
    )
}
