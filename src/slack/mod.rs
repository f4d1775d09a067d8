//! All Slack-specific functionality

pub mod blocks;
pub mod client;
pub mod relay;

// Re-export main types for convenience
pub use blocks::{MessageBlock, build_message_blocks, chunk_text};
pub use client::{SlackClient, SlackTransport};
pub use relay::SlackRelay;
