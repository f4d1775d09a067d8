//! HTTP endpoint: one webhook route plus the `/api/{name}` namespace.

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use super::audit::LoggableApiHandler;
use super::handler::{ApiHandler, ApiResponse, SlackApiHandler};
use super::request;
use crate::core::config::{AppConfig, DEFAULT_MAX_BODY_BYTES};
use crate::slack::relay::SlackRelay;

const VIEW_TEXT: &str = "Webhook relay is running. POST a request to this URL to forward it to Slack.\n";

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<dyn ApiHandler>,
    /// Size bound for multipart parsing; `create_router` sets it from config.
    pub max_body_bytes: usize,
}

impl AppState {
    #[must_use]
    pub fn new(handler: Arc<dyn ApiHandler>) -> Self {
        Self {
            handler,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// The production handler stack for `config`.
#[must_use]
pub fn handler_from_config(config: &AppConfig) -> Arc<dyn ApiHandler> {
    let relay = SlackRelay::from_config(config);
    let handler: Arc<dyn ApiHandler> = Arc::new(SlackApiHandler::new(relay, config.body_policy));
    if config.audit_log {
        Arc::new(LoggableApiHandler::new(handler))
    } else {
        handler
    }
}

pub fn create_router(state: AppState, config: &AppConfig) -> Router {
    let state = AppState {
        max_body_bytes: config.max_body_bytes,
        ..state
    };
    Router::new()
        .route(&config.webhook_path, get(show_view).post(receive_webhook))
        .route("/api/{name}", post(receive_named_webhook))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn start_server(config: AppConfig) -> anyhow::Result<()> {
    if !config.relay_available() {
        info!("SLACK_BOT_TOKEN or SLACK_CHANNEL_ID is empty; webhooks will be answered with 503");
    }

    let state = AppState::new(handler_from_config(&config));
    let app = create_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", config.listen_addr))?;

    info!(path = %config.webhook_path, "Starting HTTP server on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

async fn show_view() -> impl IntoResponse {
    (StatusCode::OK, VIEW_TEXT)
}

async fn receive_webhook(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(&state, "default", method, headers, body).await
}

async fn receive_named_webhook(
    State(state): State<AppState>,
    Path(name): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(&state, &name, method, headers, body).await
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs the handler for one request. Nothing, not even a panic, escapes as
/// anything other than a JSON response.
async fn dispatch(
    state: &AppState,
    endpoint: &str,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let span = info_span!("webhook", request_id = %Uuid::new_v4(), endpoint = %endpoint);

    async move {
        info!(bytes = body.len(), "Received webhook request");

        let outcome = AssertUnwindSafe(async {
            let request = request::from_http(method, headers, body, state.max_body_bytes).await;
            state.handler.handle(&request).await
        })
        .catch_unwind()
        .await;

        let response = match outcome {
            Ok(response) => response,
            Err(payload) => {
                error!("Webhook handler panicked: {}", panic_message(payload.as_ref()));
                ApiResponse::internal_error()
            }
        };

        info!(status = response.code.as_u16(), "Webhook handled");
        response.into_response()
    }
    .instrument(span)
    .await
}
