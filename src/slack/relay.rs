//! Relays a normalized request to the configured Slack channel.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::config::{AppConfig, DEFAULT_BLOCK_CHUNK_SIZE, DEFAULT_ICON_EMOJI};
use crate::core::models::{RelayReceipt, RelayResult, UploadedFile};
use crate::errors::RelayError;
use crate::slack::blocks::{MAX_BLOCKS_PER_MESSAGE, build_message_blocks};
use crate::slack::client::{SlackClient, SlackTransport};

pub struct SlackRelay {
    channel: String,
    token_present: bool,
    icon_emoji: String,
    chunk_size: usize,
    transport: Arc<dyn SlackTransport>,
}

impl SlackRelay {
    /// Relay backed by the real Slack API.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let transport = Arc::new(SlackClient::new(config.slack_bot_token.clone()));
        Self::with_transport(config, transport)
    }

    /// Relay over an arbitrary transport.
    #[must_use]
    pub fn with_transport(config: &AppConfig, transport: Arc<dyn SlackTransport>) -> Self {
        Self {
            channel: config.slack_channel_id.clone(),
            token_present: !config.slack_bot_token.is_empty(),
            icon_emoji: config.slack_icon_emoji.clone(),
            chunk_size: config.block_chunk_size,
            transport,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.token_present && !self.channel.is_empty()
    }

    /// Posts the message, then shares any uploaded files.
    ///
    /// File upload failures are logged and counted but never fail the relay.
    ///
    /// # Errors
    ///
    /// [`RelayError::ServiceUnavailable`] when the token or channel is missing
    /// (nothing is sent), or the error of the message post.
    pub async fn relay(&self, headers: &[String], body: &str, files: &[UploadedFile]) -> RelayResult {
        if !self.is_available() {
            warn!("Slack relay is not configured; dropping message");
            return Err(RelayError::ServiceUnavailable);
        }

        let chunk_size = if self.chunk_size == 0 {
            DEFAULT_BLOCK_CHUNK_SIZE
        } else {
            self.chunk_size
        };
        let blocks = build_message_blocks(headers, body, chunk_size);
        if blocks.len() > MAX_BLOCKS_PER_MESSAGE {
            warn!(
                blocks = blocks.len(),
                limit = MAX_BLOCKS_PER_MESSAGE,
                "Message exceeds Slack's block limit; the post will likely be rejected"
            );
        }
        let icon = if self.icon_emoji.is_empty() {
            DEFAULT_ICON_EMOJI
        } else {
            self.icon_emoji.as_str()
        };

        self.transport
            .post_message(&self.channel, &blocks, icon)
            .await?;

        info!(
            channel = %self.channel,
            blocks = blocks.len(),
            "Relayed webhook to Slack"
        );

        let mut receipt = RelayReceipt {
            blocks_sent: blocks.len(),
            ..RelayReceipt::default()
        };

        for file in files {
            match self.transport.upload_file(&self.channel, file).await {
                Ok(()) => {
                    receipt.files_uploaded += 1;
                    info!(file = %file.original_name, size = file.size, "Uploaded file to Slack");
                }
                Err(e) => {
                    receipt.files_failed += 1;
                    error!(file = %file.original_name, "File upload failed: {}", e);
                }
            }
        }

        Ok(receipt)
    }
}
