//! Route table and handlers.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{MatchedPath, Path, State};
use axum::http::Request;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, debug_span, error, Span};

use crate::error::ApiError;
use dadpass_messages::MessageStore;

/// Body returned for any key that cannot be delivered.
pub const NOT_AVAILABLE: &str = "Message is no longer available";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub messages: Arc<MessageStore>,
}

impl AppState {
    pub fn new(messages: Arc<MessageStore>) -> Self {
        Self { messages }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMessageRequest {
    message: Option<String>,
    /// Anything that is not a known label string resolves to the default.
    ttl_option: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateMessageResponse {
    message_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadMessageResponse {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl_option: Option<String>,
}

impl ReadMessageResponse {
    fn not_available() -> Self {
        Self {
            message: NOT_AVAILABLE.to_string(),
            ttl_option: None,
        }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/messages", post(create_message))
        .route("/messages/{key}", get(read_message))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// Request span keyed by the route template. The raw URI carries the
/// retrieval key and must stay out of the logs.
fn request_span(request: &Request<Body>) -> Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or("unmatched");
    debug_span!("request", method = %request.method(), route)
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn create_message(
    State(state): State<AppState>,
    payload: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<Json<CreateMessageResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "Rejected create request body");
        ApiError::bad_request("Message is required")
    })?;

    let ttl_option = request.ttl_option.as_ref().and_then(Value::as_str);
    let key = state
        .messages
        .create(request.message.as_deref(), ttl_option)
        .await?;

    Ok(Json(CreateMessageResponse {
        message_key: key.to_string(),
    }))
}

async fn read_message(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<ReadMessageResponse> {
    match state.messages.read(&key).await {
        Ok(Some(retrieved)) => Json(ReadMessageResponse {
            message: retrieved.message,
            ttl_option: Some(retrieved.ttl_option.to_string()),
        }),
        Ok(None) => Json(ReadMessageResponse::not_available()),
        Err(e) => {
            error!(error = %e, "Read failed, answering not available");
            Json(ReadMessageResponse::not_available())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use dadpass_common::{Error, MessageKey, Result};
    use dadpass_crypto::{EnvelopeCipher, MasterKey, KEY_LENGTH};
    use dadpass_messages::{ManualClock, MessageStoreConfig};
    use dadpass_storage::{MemoryStore, RecordStore, StoredMessage};
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::sync::Mutex;
    use tower::ServiceExt;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    const T0: i64 = 1_700_000_000;

    fn app_over(records: Arc<dyn RecordStore>) -> (Router, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let cipher = EnvelopeCipher::new(MasterKey::from_bytes([9u8; KEY_LENGTH]));
        let messages = MessageStore::new(cipher, records, MessageStoreConfig::default())
            .unwrap()
            .with_clock(clock.clone());
        (router(AppState::new(Arc::new(messages))), clock)
    }

    fn app() -> (Router, Arc<ManualClock>) {
        app_over(Arc::new(MemoryStore::new()))
    }

    /// Record store whose every call fails.
    struct BrokenStore;

    #[async_trait]
    impl RecordStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn get(&self, _key: &MessageKey) -> Result<Option<StoredMessage>> {
            Err(Error::Storage("unreachable".into()))
        }

        async fn insert_if_absent(&self, _record: &StoredMessage) -> Result<()> {
            Err(Error::Storage("unreachable".into()))
        }

        async fn delete(&self, _key: &MessageKey) -> Result<()> {
            Err(Error::Storage("unreachable".into()))
        }

        async fn take(&self, _key: &MessageKey) -> Result<Option<StoredMessage>> {
            Err(Error::Storage("unreachable".into()))
        }

        async fn purge_expired(&self, _now: i64) -> Result<usize> {
            Err(Error::Storage("unreachable".into()))
        }
    }

    /// Shared buffer the test subscriber writes formatted events into.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Route this thread's events into a buffer until the guard drops.
    fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/messages")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn create(app: &Router, body: Value) -> String {
        let (status, json) = send(app, post_json(&body.to_string())).await;
        assert_eq!(status, StatusCode::OK);
        json["messageKey"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let (status, json) = send(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn test_create_then_read_once() {
        let (app, clock) = app();
        let key = create(&app, json!({ "message": "Hello world", "ttlOption": "1hour" })).await;
        assert_eq!(key.len(), 10);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));

        clock.advance(1800);
        let (status, json) = send(&app, get(&format!("/messages/{}", key))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "message": "Hello world", "ttlOption": "1hour" }));

        let (status, json) = send(&app, get(&format!("/messages/{}", key))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "message": NOT_AVAILABLE }));
    }

    #[tokio::test]
    async fn test_expired_reads_as_not_available() {
        let (app, clock) = app();
        let key = create(&app, json!({ "message": "soon gone", "ttlOption": "15min" })).await;

        clock.advance(901);
        let (status, json) = send(&app, get(&format!("/messages/{}", key))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "message": NOT_AVAILABLE }));
    }

    #[tokio::test]
    async fn test_ttl_fallbacks() {
        let (app, _) = app();
        for body in [
            json!({ "message": "a" }),
            json!({ "message": "b", "ttlOption": "2weeks" }),
            json!({ "message": "c", "ttlOption": 42 }),
            json!({ "message": "d", "ttlOption": null }),
        ] {
            let key = create(&app, body).await;
            let (_, json) = send(&app, get(&format!("/messages/{}", key))).await;
            assert_eq!(json["ttlOption"], "5days");
        }
    }

    #[tokio::test]
    async fn test_empty_message_is_allowed() {
        let (app, _) = app();
        let key = create(&app, json!({ "message": "" })).await;
        let (_, json) = send(&app, get(&format!("/messages/{}", key))).await;
        assert_eq!(json, json!({ "message": "", "ttlOption": "5days" }));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_bodies() {
        let (app, _) = app();
        for body in ["{}", r#"{"ttlOption":"1day"}"#, r#"{"message":7}"#, "not json", ""] {
            let (status, json) = send(&app, post_json(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?}", body);
            assert_eq!(json, json!({ "error": "Message is required" }));
        }
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_keys() {
        let (app, _) = app();
        for uri in ["/messages/doesNotExist", "/messages/bad-key!", "/messages/%20"] {
            let (status, json) = send(&app, get(uri)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json, json!({ "message": NOT_AVAILABLE }));
        }
    }

    #[tokio::test]
    async fn test_request_logs_omit_retrieval_key() {
        let (logs, _guard) = capture_logs();
        let (app, _) = app();

        let key = create(&app, json!({ "message": "keep it quiet" })).await;
        let (_, json) = send(&app, get(&format!("/messages/{}", key))).await;
        assert_eq!(json["message"], "keep it quiet");

        let output = logs.contents();
        assert!(output.contains("/messages/{key}"), "{}", output);
        assert!(!output.contains(&key), "{}", output);
        assert!(!output.contains("keep it quiet"));
    }

    #[tokio::test]
    async fn test_read_store_failure_is_not_available() {
        let (app, _) = app_over(Arc::new(BrokenStore));
        let (status, json) = send(&app, get("/messages/abcdefghij")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "message": NOT_AVAILABLE }));
    }

    #[tokio::test]
    async fn test_create_store_failure_is_server_error() {
        let (logs, _guard) = capture_logs();
        let (app, _) = app_over(Arc::new(BrokenStore));

        let (status, json) = send(&app, post_json(r#"{"message":"lost"}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, json!({ "error": "Failed to create message" }));

        let reports = logs
            .contents()
            .lines()
            .filter(|line| line.contains("ERROR") && line.contains("unreachable"))
            .count();
        assert_eq!(reports, 1);
    }
}
