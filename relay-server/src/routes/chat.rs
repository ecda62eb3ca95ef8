//! Streaming generation routes.
//!
//! Both routes answer with `text/event-stream`. Every event carries one JSON
//! object: the ids first, then `{"content"}` deltas, then either
//! `{"conversationId", "done": true}` or `{"error"}`. A stopped generation
//! simply ends the stream.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::{Stream, StreamExt, stream};
use llm::ModelId;
use relay_core::{
    Attachment, ConversationId, GenerationEvent, GenerationRequest, GenerationStream, MessageId,
    ResumeRequest,
};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::auth::CurrentUser;
use crate::error::ServerError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/resume", post(resume))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub message: String,
    pub conversation_id: Option<ConversationId>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeBody {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub model: Option<String>,
}

/// Unknown model names are rejected; a missing one selects the default.
fn parse_model(model: Option<&str>) -> Result<ModelId, ServerError> {
    model
        .map(str::parse::<ModelId>)
        .transpose()
        .map_err(|e| ServerError::BadRequest(e.to_string()))
        .map(Option::unwrap_or_default)
}

fn events(
    rx: mpsc::UnboundedReceiver<GenerationEvent>,
) -> impl Stream<Item = Result<Event, axum::Error>> {
    stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((event, rx))
    })
    .map(|event| Event::default().json_data(&event))
}

fn sse(generation: GenerationStream) -> Response {
    // The task keeps running on its own; the response only observes it.
    let GenerationStream { events: rx, .. } = generation;
    Sse::new(events(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// `POST /api/chat`
async fn chat(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(body) = body?;
    let request = GenerationRequest {
        user_id,
        conversation_id: body.conversation_id,
        message: body.message,
        model: parse_model(body.model.as_deref())?,
        system_prompt: body.system_prompt,
        attachments: body.attachments,
    };
    let generation = state.orchestrator.start(request).await?;
    Ok(sse(generation))
}

/// `POST /api/chat/resume`
async fn resume(
    State(state): State<Arc<AppState>>,
    CurrentUser(user_id): CurrentUser,
    body: Result<Json<ResumeBody>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(body) = body?;
    let request = ResumeRequest {
        user_id,
        message_id: body.message_id,
        conversation_id: body.conversation_id,
        model: parse_model(body.model.as_deref())?,
    };
    let generation = state.orchestrator.resume(request).await?;
    Ok(sse(generation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model() {
        assert_eq!(parse_model(None).unwrap(), ModelId::Gpt4oMini);
        assert_eq!(parse_model(Some("gpt-4o")).unwrap(), ModelId::Gpt4o);
        assert!(matches!(
            parse_model(Some("gpt-5-turbo")),
            Err(ServerError::BadRequest(_))
        ));
    }

    #[test]
    fn test_chat_body_accepts_upload_shape() {
        let body: ChatBody = serde_json::from_str(
            r#"{"message":"Hi","model":"claude-opus-4-20250514",
                "attachments":[{"id":"a1","name":"cat.png","mimeType":"image/png","size":3,"url":"/uploads/cat.png"}]}"#,
        )
        .unwrap();
        assert!(body.conversation_id.is_none());
        assert_eq!(body.attachments.len(), 1);
        assert_eq!(body.attachments[0].locator, "/uploads/cat.png");
    }
}
