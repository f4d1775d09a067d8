//! Block Kit message layout for a relayed webhook.
//!
//! The message is a header line, a "Headers" section with the header lines in
//! code blocks, and a "Body" section with the body text in code blocks. Both
//! sections are split at the chunk limit so every block stays under Slack's
//! per-section text cap.

use chrono::{Local, NaiveDateTime};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

/// Slack rejects messages with more blocks than this.
pub const MAX_BLOCKS_PER_MESSAGE: usize = 50;

/// How a block's content is rendered as `mrkdwn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Plain,
    /// Section label, rendered bold.
    Label,
    /// Verbatim text inside a ``` fence.
    Code,
}

/// One `section` block with markdown text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBlock {
    pub style: TextStyle,
    /// Text before markdown decoration is applied.
    pub content: String,
}

impl MessageBlock {
    #[must_use]
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            style: TextStyle::Plain,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn label(content: impl Into<String>) -> Self {
        Self {
            style: TextStyle::Label,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn code(content: impl Into<String>) -> Self {
        Self {
            style: TextStyle::Code,
            content: content.into(),
        }
    }

    /// The `mrkdwn` text sent to Slack.
    #[must_use]
    pub fn markdown(&self) -> String {
        match self.style {
            TextStyle::Plain => self.content.clone(),
            TextStyle::Label => format!("*{}*", self.content),
            TextStyle::Code => format!("```{}```", self.content),
        }
    }
}

#[derive(Serialize)]
struct MarkdownText {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

// Serializes to `{"type":"section","text":{"type":"mrkdwn","text":...}}`.
impl Serialize for MessageBlock {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut section = serializer.serialize_struct("MessageBlock", 2)?;
        section.serialize_field("type", "section")?;
        section.serialize_field(
            "text",
            &MarkdownText {
                kind: "mrkdwn",
                text: self.markdown(),
            },
        )?;
        section.end()
    }
}

/// Byte offset just past the first `max_chars` characters of `s`.
fn slice_end_for_max_chars(s: &str, max_chars: usize) -> usize {
    s.char_indices().nth(max_chars).map_or(s.len(), |(idx, _)| idx)
}

/// Splits `text` into consecutive pieces of at most `max_chars` characters.
///
/// Boundaries fall purely on character count. An empty text yields a single
/// empty piece so the body section is never missing.
#[must_use]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<&str> {
    if text.is_empty() || max_chars == 0 {
        return vec![text];
    }

    let mut chunks = Vec::with_capacity(text.len() / max_chars + 1);
    let mut rest = text;
    while !rest.is_empty() {
        let end = slice_end_for_max_chars(rest, max_chars);
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

#[must_use]
pub fn received_title(at: NaiveDateTime) -> String {
    format!("New message received ({})", at.format("%Y-%m-%d %H:%M:%S"))
}

/// Builds the message for one request, stamped with the current local time.
#[must_use]
pub fn build_message_blocks(headers: &[String], body: &str, chunk_size: usize) -> Vec<MessageBlock> {
    build_message_blocks_at(headers, body, chunk_size, Local::now().naive_local())
}

#[must_use]
pub fn build_message_blocks_at(
    headers: &[String],
    body: &str,
    chunk_size: usize,
    at: NaiveDateTime,
) -> Vec<MessageBlock> {
    let header_text = headers.join("\n");
    let mut blocks = vec![
        MessageBlock::plain(received_title(at)),
        MessageBlock::label("Headers"),
    ];
    blocks.extend(chunk_text(&header_text, chunk_size).into_iter().map(MessageBlock::code));
    blocks.push(MessageBlock::label("Body"));
    blocks.extend(chunk_text(body, chunk_size).into_iter().map(MessageBlock::code));
    blocks
}

/// The body code blocks of a message built by [`build_message_blocks`].
#[must_use]
pub fn body_blocks(blocks: &[MessageBlock]) -> &[MessageBlock] {
    blocks
        .iter()
        .rposition(|b| b.style == TextStyle::Label)
        .and_then(|label| blocks.get(label + 1..))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 1)
            .unwrap()
    }

    #[test]
    fn ten_thousand_chars_split_into_four_blocks() {
        let body = "x".repeat(10_000);
        let chunks = chunk_text(&body, 2900);
        let lengths: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lengths, vec![2900, 2900, 2900, 1300]);
    }

    #[test]
    fn empty_body_yields_one_empty_chunk() {
        assert_eq!(chunk_text("", 2900), vec![""]);
    }

    #[test]
    fn chunks_reassemble_to_the_original_text() {
        let body = "řádek s diakritikou 🎉\n".repeat(137);
        for limit in [1, 7, 64, 2900] {
            let chunks = chunk_text(&body, limit);
            let total = body.chars().count();
            assert_eq!(chunks.len(), total.div_ceil(limit));
            assert!(chunks.iter().all(|c| c.chars().count() <= limit));
            assert_eq!(chunks.concat(), body);
        }
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_chunk() {
        let body = "abcdef";
        assert_eq!(chunk_text(body, 3), vec!["abc", "def"]);
    }

    #[test]
    fn message_layout() {
        let headers = vec!["content-type: application/json".to_string(), "x-a: 1".to_string()];
        let blocks = build_message_blocks_at(&headers, r#"{"a":1}"#, 2900, fixed_time());

        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[0].markdown(), "New message received (2024-03-09 07:05:01)");
        assert_eq!(blocks[1].markdown(), "*Headers*");
        assert_eq!(
            blocks[2].markdown(),
            "```content-type: application/json\nx-a: 1```"
        );
        assert_eq!(blocks[3].markdown(), "*Body*");
        assert_eq!(blocks[4].markdown(), "```{\"a\":1}```");
    }

    #[test]
    fn body_blocks_follow_the_labels() {
        let body = "y".repeat(5000);
        let blocks = build_message_blocks_at(&[], &body, 2900, fixed_time());
        let bodies = body_blocks(&blocks);
        assert_eq!(bodies.len(), 2);
        assert!(bodies.iter().all(|b| b.style == TextStyle::Code));
        let joined: String = bodies.iter().map(|b| b.content.as_str()).collect();
        assert_eq!(joined, body);
    }

    #[test]
    fn long_headers_are_split_like_the_body() {
        let headers: Vec<String> = (0..200)
            .map(|i| format!("x-header-{i:03}: {}", "v".repeat(20)))
            .collect();
        let blocks = build_message_blocks_at(&headers, "b", 2900, fixed_time());

        let header_blocks: Vec<&MessageBlock> = blocks[2..]
            .iter()
            .take_while(|b| b.style == TextStyle::Code)
            .collect();
        assert!(header_blocks.len() > 1);
        assert!(header_blocks.iter().all(|b| b.content.chars().count() <= 2900));
        let joined: String = header_blocks.iter().map(|b| b.content.as_str()).collect();
        assert_eq!(joined, headers.join("\n"));

        let bodies = body_blocks(&blocks);
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].content, "b");
    }

    #[test]
    fn serializes_as_slack_section() {
        let value = serde_json::to_value(MessageBlock::label("Body")).unwrap();
        assert_eq!(
            value,
            json!({"type": "section", "text": {"type": "mrkdwn", "text": "*Body*"}})
        );
    }
}
