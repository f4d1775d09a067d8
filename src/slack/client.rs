//! Slack API client module
//!
//! `chat.postMessage` goes through a plain reqwest client; file uploads use
//! slack-morphism's external upload flow. Both connections are built on first
//! use and then shared for the lifetime of the client.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::Client;
use serde_json::{Value, json};
use slack_morphism::hyper_tokio::{SlackClientHyperConnector, SlackHyperClient};
use slack_morphism::prelude::{
    SlackApiFilesComplete, SlackApiFilesCompleteUploadExternalRequest,
    SlackApiFilesGetUploadUrlExternalRequest, SlackApiFilesUploadViaUrlRequest,
};
use slack_morphism::{SlackApiToken, SlackApiTokenValue, SlackChannelId};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::core::models::UploadedFile;
use crate::errors::RelayError;
use crate::slack::blocks::MessageBlock;

const CHAT_POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

/// The remote calls the relay needs.
#[async_trait]
pub trait SlackTransport: Send + Sync {
    /// Posts one message made of `blocks` to `channel`.
    async fn post_message(
        &self,
        channel: &str,
        blocks: &[MessageBlock],
        icon_emoji: &str,
    ) -> Result<(), RelayError>;

    /// Shares one uploaded file in `channel`, titled with its original name.
    async fn upload_file(&self, channel: &str, file: &UploadedFile) -> Result<(), RelayError>;
}

/// Plain-text fallback shown in notifications, taken from the first block.
#[must_use]
pub fn fallback_text(blocks: &[MessageBlock]) -> String {
    blocks
        .first()
        .map(|b| b.content.clone())
        .unwrap_or_else(|| "New message received".to_string())
}

/// Build the JSON payload for `chat.postMessage`.
///
/// # Errors
///
/// Returns an error if the blocks cannot be serialized.
pub fn build_post_message_payload(
    channel: &str,
    blocks: &[MessageBlock],
    icon_emoji: &str,
) -> Result<Value, RelayError> {
    Ok(json!({
        "channel": channel,
        "text": fallback_text(blocks),
        "blocks": serde_json::to_value(blocks)?,
        "icon_emoji": icon_emoji,
    }))
}

/// Lazily built network handles.
struct Connection {
    http: Client,
    slack: SlackHyperClient,
}

impl Connection {
    fn build() -> Result<Self, RelayError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let connector = SlackClientHyperConnector::new().map_err(|e| {
            RelayError::HttpError(format!("Failed to create Slack HTTP connector: {e}"))
        })?;
        Ok(Self {
            http,
            slack: SlackHyperClient::new(connector),
        })
    }
}

/// Slack Web API client bound to one bot token.
pub struct SlackClient {
    token: SlackApiToken,
    connection: OnceCell<Connection>,
}

impl fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackClient")
            .field("connected", &self.connection.get().is_some())
            .finish_non_exhaustive()
    }
}

impl SlackClient {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token: SlackApiToken::new(SlackApiTokenValue::new(token)),
            connection: OnceCell::new(),
        }
    }

    fn connection(&self) -> Result<&Connection, RelayError> {
        self.connection.get_or_try_init(|| {
            debug!("Creating Slack API connection");
            Connection::build()
        })
    }
}

#[async_trait]
impl SlackTransport for SlackClient {
    async fn post_message(
        &self,
        channel: &str,
        blocks: &[MessageBlock],
        icon_emoji: &str,
    ) -> Result<(), RelayError> {
        let payload = build_post_message_payload(channel, blocks, icon_emoji)?;

        let resp = self
            .connection()?
            .http
            .post(CHAT_POST_MESSAGE_URL)
            .bearer_auth(&self.token.token_value.0)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RelayError::HttpError(format!("Failed to post message: {e}")))?;

        if !resp.status().is_success() {
            return Err(RelayError::ApiError(format!(
                "chat.postMessage HTTP {}",
                resp.status()
            )));
        }

        let body: Value = resp.json().await.map_err(|e| {
            RelayError::ApiError(format!("chat.postMessage JSON parse error: {e}"))
        })?;

        if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            return Err(RelayError::ApiError(format!(
                "chat.postMessage error: {}",
                body.get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
            )));
        }

        Ok(())
    }

    async fn upload_file(&self, channel: &str, file: &UploadedFile) -> Result<(), RelayError> {
        let content = tokio::fs::read(file.path()).await.map_err(|e| {
            RelayError::FileUpload(format!("cannot read {}: {e}", file.original_name))
        })?;
        let mime = mime_guess::from_path(&file.original_name)
            .first_or_octet_stream()
            .to_string();

        let session = self.connection()?.slack.open_session(&self.token);

        let upload_url = session
            .get_upload_url_external(&SlackApiFilesGetUploadUrlExternalRequest::new(
                file.original_name.clone(),
                content.len(),
            ))
            .await
            .map_err(|e| RelayError::FileUpload(format!("files.getUploadURLExternal: {e}")))?;

        session
            .files_upload_via_url(&SlackApiFilesUploadViaUrlRequest::new(
                upload_url.upload_url,
                content,
                mime,
            ))
            .await
            .map_err(|e| RelayError::FileUpload(format!("upload: {e}")))?;

        let complete = SlackApiFilesCompleteUploadExternalRequest::new(vec![
            SlackApiFilesComplete::new(upload_url.file_id).with_title(file.original_name.clone()),
        ])
        .with_channel_id(SlackChannelId(channel.to_string()));

        session
            .files_complete_upload_external(&complete)
            .await
            .map_err(|e| RelayError::FileUpload(format!("files.completeUploadExternal: {e}")))?;

        Ok(())
    }
}
