//! Axum router construction.
//!
//! [`build`] assembles the application router: the health check, the
//! session-protected `/api` routes and the tracing and CORS layers.

mod chat;
mod health;
mod messages;

use axum::Router;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

/// Build the complete router. `allowed_origin` enables CORS for a browser
/// front end served from another origin.
pub fn build(state: Arc<AppState>, allowed_origin: Option<&str>) -> Router {
    let api = Router::new()
        .merge(chat::router())
        .merge(messages::router());

    let mut app = Router::new()
        .merge(health::router())
        .nest("/api", api)
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = allowed_origin {
        match HeaderValue::from_str(origin.trim_end_matches('/')) {
            Ok(origin) => {
                app = app.layer(
                    CorsLayer::new()
                        .allow_origin(origin)
                        .allow_methods([Method::GET, Method::POST, Method::PUT])
                        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                        .allow_credentials(true),
                );
            }
            Err(e) => warn!(origin, error = %e, "ignoring invalid CORS origin"),
        }
    }

    app.with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use config::SessionEntry;
    use relay_core::testing::{ScriptStep, ScriptedProvider, orchestrator};
    use relay_core::{MemoryStore, MessageStatus, StaticSessionValidator};
    use serde_json::Value;
    use tower::ServiceExt;

    const TOKEN: &str = "test-token";

    fn app(steps: Vec<ScriptStep>) -> Router {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState {
            orchestrator: orchestrator(store, ScriptedProvider::new(steps)),
            sessions: Arc::new(StaticSessionValidator::new(&[SessionEntry {
                token: TOKEN.into(),
                user_id: "user-1".into(),
            }])),
        });
        build(state, None)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("authorization", format!("Bearer {}", TOKEN))
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// The JSON payloads of every `data:` line in an SSE body.
    fn sse_events(body: &str) -> Vec<Value> {
        body.lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(Vec::new())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chat_requires_session() {
        let request = Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"message":"Hello"}"#))
            .unwrap();
        let response = app(Vec::new()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_chat_streams_events() {
        let app = app(vec![
            ScriptStep::Delta("Hi".into()),
            ScriptStep::Delta(" there".into()),
            ScriptStep::Delta("!".into()),
        ]);

        let response = app
            .clone()
            .oneshot(post_json("/api/chat", r#"{"message":"Hello","model":"gpt-4o"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let events = sse_events(&body_text(response).await);
        assert_eq!(events.len(), 5);
        let message_id = events[0]["messageId"].as_str().unwrap().to_owned();
        let conversation_id = events[0]["conversationId"].as_str().unwrap().to_owned();
        let text: String = events[1..4]
            .iter()
            .map(|e| e["content"].as_str().unwrap())
            .collect();
        assert_eq!(text, "Hi there!");
        assert_eq!(events[4]["done"], Value::Bool(true));
        assert_eq!(events[4]["conversationId"], conversation_id.as_str());

        let response = app
            .oneshot(
                Request::get(format!("/api/messages/{}/content", message_id))
                    .header("authorization", format!("Bearer {}", TOKEN))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["content"], "Hi there!");
        assert_eq!(body["status"], MessageStatus::Complete.as_str());
        assert!(body["lastUpdated"].is_i64());
    }

    #[tokio::test]
    async fn test_unknown_model_is_bad_request() {
        let response = app(Vec::new())
            .oneshot(post_json("/api/chat", r#"{"message":"Hello","model":"gpt-9"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_vendor_failure_is_a_stream_event() {
        let response = app(vec![ScriptStep::Fail("upstream 500".into())])
            .oneshot(post_json("/api/chat", r#"{"message":"Hello"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let events = sse_events(&body_text(response).await);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1]["error"], "Failed to generate response");
    }

    #[tokio::test]
    async fn test_stop_unknown_message_is_not_found() {
        let request = Request::put(format!("/api/messages/{}/stop", relay_core::MessageId::new()))
            .header("authorization", format!("Bearer {}", TOKEN))
            .body(Body::empty())
            .unwrap();
        let response = app(Vec::new()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_resume_of_complete_message_conflicts() {
        let app = app(vec![ScriptStep::Delta("Done.".into())]);
        let response = app
            .clone()
            .oneshot(post_json("/api/chat", r#"{"message":"Hello"}"#))
            .await
            .unwrap();
        let events = sse_events(&body_text(response).await);

        let body = serde_json::json!({
            "messageId": events[0]["messageId"],
            "conversationId": events[0]["conversationId"],
        });
        let response = app
            .oneshot(post_json("/api/chat/resume", &body.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
