//! Message control routes: stop, poll and relabel.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use relay_core::{MessageId, MessageStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::auth::CurrentUser;
use crate::error::ServerError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/messages/{id}/stop", put(stop))
        .route("/messages/{id}/content", get(content))
        .route("/messages/{id}/status", put(set_status))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentResponse {
    pub content: String,
    pub status: MessageStatus,
    pub last_updated: i64,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: MessageStatus,
}

/// `PUT /api/messages/{id}/stop`
async fn stop(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<MessageId>,
) -> Result<Json<Value>, ServerError> {
    let stopped = state.orchestrator.stop(&user_id, &id).await?;
    Ok(Json(json!({ "success": true, "stopped": stopped })))
}

/// `GET /api/messages/{id}/content`
async fn content(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<MessageId>,
) -> Result<Json<ContentResponse>, ServerError> {
    let message = state.orchestrator.owned_message(&user_id, &id).await?;
    Ok(Json(ContentResponse {
        content: message.content,
        status: message.status,
        last_updated: message.updated_at,
    }))
}

/// `PUT /api/messages/{id}/status`
async fn set_status(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<MessageId>,
    body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<Value>, ServerError> {
    let Json(body) = body?;
    state
        .orchestrator
        .set_status(&user_id, &id, body.status)
        .await?;
    Ok(Json(json!({ "success": true })))
}
