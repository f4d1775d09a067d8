//! Audit logging wrapper around any [`ApiHandler`].

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use super::handler::{ApiHandler, ApiResponse};
use super::normalize::{self, Escape};
use crate::core::models::InboundRequest;

/// Log target of audit records, routed to their own stream by `setup_logging`.
pub const AUDIT_TARGET: &str = "api_handler";

/// Writes the redacted headers and the escaped body of every request to the
/// audit log, then delegates. Logging never affects the response.
pub struct LoggableApiHandler {
    inner: Arc<dyn ApiHandler>,
}

impl LoggableApiHandler {
    #[must_use]
    pub fn new(inner: Arc<dyn ApiHandler>) -> Self {
        Self { inner }
    }
}

fn audit(request: &InboundRequest) {
    let headers = normalize::get_headers(request);
    match serde_json::to_string(&headers) {
        Ok(json) => info!(target: AUDIT_TARGET, headers = %json, "request headers"),
        Err(e) => error!("Failed to encode headers for audit log: {}", e),
    }

    match normalize::get_body(request, Escape::Strict) {
        Ok(body) => info!(target: AUDIT_TARGET, body = %body, "request body"),
        Err(e) => error!("Failed to normalize body for audit log: {}", e),
    }
}

#[async_trait]
impl ApiHandler for LoggableApiHandler {
    async fn handle(&self, request: &InboundRequest) -> ApiResponse {
        audit(request);
        self.inner.handle(request).await
    }
}
