//! Webhook relay - forwards any HTTP POST it receives to a Slack channel.
//!
//! Every request is normalized into readable header lines and a canonical body
//! text, laid out as Block Kit sections and posted to one configured channel.
//! Files attached to multipart requests are shared in the same channel.
//!
//! # Architecture
//!
//! - `api::request` turns the HTTP request into an `InboundRequest`
//! - `api::normalize` redacts headers and re-serializes the body
//! - `slack::blocks` builds the message, chunking long bodies
//! - `slack::relay` posts it through a `SlackTransport`
//! - `api::handler` maps the outcome to a JSON response, optionally wrapped by
//!   the audit logger in `api::audit`
//! - `api::server` exposes it all through axum
//!
//! # Example
//!
//! ```no_run
//! use webhook_relay::core::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     webhook_relay::setup_logging();
//!
//!     let config = AppConfig {
//!         slack_bot_token: "xoxb-dummy".to_string(),
//!         slack_channel_id: "C12345678".to_string(),
//!         ..AppConfig::default()
//!     };
//!
//!     webhook_relay::api::start_server(config).await
//! }
//! ```

pub mod api;
pub mod core;
pub mod errors;
pub mod slack;

pub use errors::RelayError;

/// Configure structured JSON logging.
///
/// Audit records (target `api_handler`) are written to stdout; all other
/// diagnostics go to stderr, filtered by `RUST_LOG`. Calling this more than
/// once is harmless.
///
/// # Example
///
/// ```
/// webhook_relay::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, filter};

    let audit_target = api::audit::AUDIT_TARGET;
    let default_level = if cfg!(feature = "debug-logs") {
        "debug"
    } else {
        "info"
    };

    let audit_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_writer(std::io::stdout)
        .with_filter(filter::Targets::new().with_target(audit_target, tracing::Level::INFO));

    let diagnostics_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let diagnostics_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(diagnostics_filter)
        .with_filter(filter::filter_fn(move |meta| meta.target() != audit_target));

    let _ = tracing_subscriber::registry()
        .with(audit_layer)
        .with(diagnostics_layer)
        .try_init();
}
