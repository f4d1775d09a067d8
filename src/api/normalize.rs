//! Request normalization: readable header lines and a canonical body text.
//!
//! Sensitive header values are redacted here so that nothing downstream
//! (log lines or Slack messages) ever sees them.

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::Formatter;
use std::io;

use crate::core::models::{InboundRequest, PostData};
use crate::errors::RelayError;

/// Placeholder written in place of a sensitive header value.
pub const REDACTED: &str = "*****";

/// Header names (lowercase) whose values are never shown.
pub const SENSITIVE_HEADERS: [&str; 2] = ["authorization", "cookie"];

/// JSON escaping applied when re-serializing a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// Machine-strict output for the audit log: `/` and non-ASCII are escaped.
    Strict,
    /// Human-readable output for Slack: nothing beyond what JSON requires,
    /// and escaped quotes are turned back into plain quotes.
    Readable,
}

#[must_use]
pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|sensitive| name.eq_ignore_ascii_case(sensitive))
}

/// Returns every header as a `"name: value"` line, in request order.
#[must_use]
pub fn get_headers(request: &InboundRequest) -> Vec<String> {
    request
        .headers
        .iter()
        .map(|(name, value)| {
            let name = name.as_str();
            if is_sensitive_header(name) {
                format!("{name}: {REDACTED}")
            } else {
                format!("{name}: {}", String::from_utf8_lossy(value.as_bytes()))
            }
        })
        .collect()
}

#[must_use]
pub fn is_form_content_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    lowered.contains("multipart/form-data")
        || lowered.contains("application/x-www-form-urlencoded")
}

/// Returns the request payload as text.
///
/// Form submissions become a JSON object of their fields. Any other body is
/// parsed as JSON and re-serialized; a body that is not JSON is returned
/// unchanged.
///
/// # Errors
///
/// Returns [`RelayError::BadRequest`] only for a form body that could not be
/// decoded. Callers decide whether that is fatal.
pub fn get_body(request: &InboundRequest, escape: Escape) -> Result<String, RelayError> {
    let is_form = request.content_type().is_some_and(is_form_content_type);

    match &request.post_data {
        PostData::Fields(fields) if is_form => {
            Ok(encode_json(&Value::Object(fields.clone()), escape)?)
        }
        PostData::Malformed(reason) if is_form => Err(RelayError::BadRequest(reason.clone())),
        _ => Ok(reserialize_raw(&request.raw_text(), escape)),
    }
}

/// Parses `raw` as JSON and re-serializes it, or returns it untouched.
#[must_use]
pub fn reserialize_raw(raw: &str, escape: Escape) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|value| encode_json(&value, escape).ok())
        .unwrap_or_else(|| raw.to_string())
}

/// Compact JSON with the given escaping policy.
///
/// # Errors
///
/// Returns an error only if serialization itself fails.
pub fn encode_json(value: &Value, escape: Escape) -> Result<String, serde_json::Error> {
    match escape {
        Escape::Readable => Ok(serde_json::to_string(value)?.replace("\\\"", "\"")),
        Escape::Strict => {
            let mut out = Vec::new();
            let mut serializer = serde_json::Serializer::with_formatter(&mut out, StrictEscapes);
            value.serialize(&mut serializer)?;
            // The formatter only ever writes ASCII.
            Ok(String::from_utf8_lossy(&out).into_owned())
        }
    }
}

/// Escapes `/` as `\/` and every non-ASCII code point as `\uXXXX`.
struct StrictEscapes;

impl Formatter for StrictEscapes {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if ch.is_ascii() && ch != '/' {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..idx])?;
            if ch == '/' {
                writer.write_all(b"\\/")?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
            start = idx + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}
