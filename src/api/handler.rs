//! Webhook handler - normalizes the request, relays it and reports the outcome.

use async_trait::async_trait;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, warn};

use super::normalize::{self, Escape};
use crate::core::config::BodyPolicy;
use crate::core::models::InboundRequest;
use crate::errors::RelayError;
use crate::slack::relay::SlackRelay;

/// Anything that turns one inbound request into one response.
#[async_trait]
pub trait ApiHandler: Send + Sync {
    async fn handle(&self, request: &InboundRequest) -> ApiResponse;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// JSON body returned to the webhook sender.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseBody {
    pub status: ResponseStatus,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub code: StatusCode,
    pub body: ResponseBody,
}

impl ApiResponse {
    #[must_use]
    pub fn success() -> Self {
        Self {
            code: StatusCode::OK,
            body: ResponseBody {
                status: ResponseStatus::Success,
                data: Map::new(),
            },
        }
    }

    #[must_use]
    pub fn error(code: StatusCode, message: &str) -> Self {
        let mut data = Map::new();
        data.insert("code".to_string(), Value::from(code.as_u16()));
        data.insert("error".to_string(), Value::from(message));
        Self {
            code,
            body: ResponseBody {
                status: ResponseStatus::Error,
                data,
            },
        }
    }

    /// Generic 500 used when something unexpected escapes a handler.
    #[must_use]
    pub fn internal_error() -> Self {
        Self::from(&RelayError::Unhandled(String::new()))
    }
}

impl From<&RelayError> for ApiResponse {
    fn from(error: &RelayError) -> Self {
        Self::error(error.status_code(), error.public_message())
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.code, Json(self.body)).into_response()
    }
}

/// Relays every request to Slack.
pub struct SlackApiHandler {
    relay: SlackRelay,
    body_policy: BodyPolicy,
}

impl SlackApiHandler {
    #[must_use]
    pub fn new(relay: SlackRelay, body_policy: BodyPolicy) -> Self {
        Self { relay, body_policy }
    }

    fn readable_body(&self, request: &InboundRequest) -> Result<String, RelayError> {
        match normalize::get_body(request, Escape::Readable) {
            Ok(body) => Ok(body),
            Err(e) if self.body_policy == BodyPolicy::BestEffort => {
                warn!("Form body could not be decoded, relaying raw text: {}", e);
                Ok(request.raw_text())
            }
            Err(e) => Err(e),
        }
    }

    async fn process(&self, request: &InboundRequest) -> Result<(), RelayError> {
        if !self.relay.is_available() {
            return Err(RelayError::ServiceUnavailable);
        }

        let headers = normalize::get_headers(request);
        let body = self.readable_body(request)?;

        self.relay.relay(&headers, &body, &request.files).await?;
        Ok(())
    }
}

#[async_trait]
impl ApiHandler for SlackApiHandler {
    async fn handle(&self, request: &InboundRequest) -> ApiResponse {
        match self.process(request).await {
            Ok(()) => ApiResponse::success(),
            Err(e) => {
                if matches!(e, RelayError::ServiceUnavailable) {
                    warn!("Rejecting webhook: {}", e);
                } else {
                    error!("Webhook relay failed: {}", e);
                }
                ApiResponse::from(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;
    use crate::core::models::{PostData, UploadedFile};
    use crate::slack::blocks::MessageBlock;
    use crate::slack::client::SlackTransport;
    use axum::http::{HeaderMap, HeaderValue, Method, header};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeTransport {
        posted: Mutex<Vec<Vec<MessageBlock>>>,
        uploads: AtomicUsize,
        fail_post: bool,
    }

    #[async_trait]
    impl SlackTransport for FakeTransport {
        async fn post_message(
            &self,
            _channel: &str,
            blocks: &[MessageBlock],
            _icon_emoji: &str,
        ) -> Result<(), RelayError> {
            self.posted.lock().unwrap().push(blocks.to_vec());
            if self.fail_post {
                Err(RelayError::ApiError("invalid_auth".into()))
            } else {
                Ok(())
            }
        }

        async fn upload_file(&self, _channel: &str, _file: &UploadedFile) -> Result<(), RelayError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn handler(channel: &str, policy: BodyPolicy, transport: Arc<FakeTransport>) -> SlackApiHandler {
        let config = AppConfig {
            slack_bot_token: "xoxb-test".into(),
            slack_channel_id: channel.into(),
            ..AppConfig::default()
        };
        SlackApiHandler::new(SlackRelay::with_transport(&config, transport), policy)
    }

    fn json_request(body: &str) -> InboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer top-secret"));
        InboundRequest::new(Method::POST, headers, body.to_string())
    }

    fn malformed_multipart() -> InboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=zzz"),
        );
        let mut request = InboundRequest::new(Method::POST, headers, "not multipart at all");
        request.post_data = PostData::Malformed("incomplete stream".into());
        request
    }

    #[tokio::test]
    async fn json_post_is_relayed() {
        let transport = Arc::new(FakeTransport::default());
        let handler = handler("C123", BodyPolicy::BestEffort, transport.clone());

        let response = handler.handle(&json_request(r#"{"a":1}"#)).await;

        assert_eq!(response, ApiResponse::success());
        let posted = transport.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].iter().any(|b| b.content == r#"{"a":1}"#));
        assert!(posted[0].iter().all(|b| !b.content.contains("top-secret")));
    }

    #[tokio::test]
    async fn missing_channel_is_503_without_calls() {
        let transport = Arc::new(FakeTransport::default());
        let handler = handler("", BodyPolicy::BestEffort, transport.clone());

        let response = handler.handle(&json_request("{}")).await;

        assert_eq!(response.code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body.status, ResponseStatus::Error);
        assert_eq!(response.body.data["code"], 503);
        assert_eq!(response.body.data["error"], "Service is not available.");
        assert!(transport.posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn api_error_is_500() {
        let transport = Arc::new(FakeTransport {
            fail_post: true,
            ..FakeTransport::default()
        });
        let handler = handler("C123", BodyPolicy::BestEffort, transport.clone());

        let response = handler.handle(&json_request("{}")).await;

        assert_eq!(response.code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body.data["error"], "Unable to process the message.");
        assert_eq!(transport.uploads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn strict_policy_rejects_malformed_form() {
        let transport = Arc::new(FakeTransport::default());
        let handler = handler("C123", BodyPolicy::Strict, transport.clone());

        let response = handler.handle(&malformed_multipart()).await;

        assert_eq!(response.code, StatusCode::BAD_REQUEST);
        assert_eq!(response.body.data["error"], "Invalid POST data.");
        assert!(transport.posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn best_effort_policy_relays_raw_text() {
        let transport = Arc::new(FakeTransport::default());
        let handler = handler("C123", BodyPolicy::BestEffort, transport.clone());

        let response = handler.handle(&malformed_multipart()).await;

        assert_eq!(response.code, StatusCode::OK);
        let posted = transport.posted.lock().unwrap();
        assert!(posted[0].iter().any(|b| b.content == "not multipart at all"));
    }

    #[test]
    fn response_serialization() {
        let ok = serde_json::to_value(ApiResponse::success().body).unwrap();
        assert_eq!(ok, serde_json::json!({"status": "success", "data": {}}));

        let err = serde_json::to_value(ApiResponse::internal_error().body).unwrap();
        assert_eq!(
            err,
            serde_json::json!({
                "status": "error",
                "data": {"code": 500, "error": "Internal server error."}
            })
        );
    }
}
