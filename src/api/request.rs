//! Turns a buffered HTTP request into an [`InboundRequest`].
//!
//! Form fields follow the PHP conventions senders tend to rely on:
//! `a[]=1&a[]=2` builds a list, `u[name]=x` builds an object and a repeated
//! plain key keeps its last value. Names nested deeper than
//! [`MAX_NESTING_DEPTH`] are dropped.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, header};
use multer::{Constraints, Multipart, SizeLimit};
use serde_json::{Map, Value};
use std::convert::Infallible;
use tracing::{debug, warn};

use crate::core::models::{InboundRequest, PostData, UploadedFile};

/// Deepest bracket nesting accepted in a form field name.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Assemble a request, decoding form bodies and spooling uploaded files.
///
/// `max_body_bytes` bounds the multipart stream; it should match the limit the
/// HTTP layer already enforced on `body`.
pub async fn from_http(
    method: Method,
    headers: HeaderMap,
    body: Bytes,
    max_body_bytes: usize,
) -> InboundRequest {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_default();
    let lowered = content_type.to_ascii_lowercase();

    let mut request = InboundRequest::new(method, headers, body);

    if lowered.contains("application/x-www-form-urlencoded") {
        request.post_data = PostData::Fields(parse_urlencoded(&request.body));
    } else if lowered.contains("multipart/form-data") {
        match parse_multipart(&content_type, request.body.clone(), max_body_bytes).await {
            Ok((fields, files)) => {
                debug!(fields = fields.len(), files = files.len(), "Parsed multipart body");
                request.post_data = PostData::Fields(fields);
                request.files = files;
            }
            Err(reason) => {
                warn!("Malformed multipart body: {}", reason);
                request.post_data = PostData::Malformed(reason);
            }
        }
    }

    request
}

#[must_use]
pub fn parse_urlencoded(body: &[u8]) -> Map<String, Value> {
    let mut fields = Map::new();
    for (name, value) in url::form_urlencoded::parse(body) {
        insert_field(&mut fields, &name, value.into_owned());
    }
    fields
}

async fn parse_multipart(
    content_type: &str,
    body: Bytes,
    max_body_bytes: usize,
) -> Result<(Map<String, Value>, Vec<UploadedFile>), String> {
    let boundary = multer::parse_boundary(content_type).map_err(|e| e.to_string())?;
    let limit = u64::try_from(max_body_bytes).unwrap_or(u64::MAX);
    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(limit));
    let stream = futures::stream::once(async move { Ok::<_, Infallible>(body) });
    let mut multipart = Multipart::with_constraints(stream, boundary, constraints);

    let mut fields = Map::new();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| e.to_string())? {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let data = field.bytes().await.map_err(|e| e.to_string())?;
                if file_name.is_empty() {
                    // Browsers send an empty part for an untouched file input.
                    continue;
                }
                files.push(spool(file_name, &data).await?);
            }
            None => {
                let value = field.text().await.map_err(|e| e.to_string())?;
                insert_field(&mut fields, &name, value);
            }
        }
    }

    Ok((fields, files))
}

async fn spool(original_name: String, data: &[u8]) -> Result<UploadedFile, String> {
    let temp = tempfile::Builder::new()
        .prefix("webhook-upload-")
        .tempfile()
        .map_err(|e| format!("cannot create temporary file: {e}"))?;
    tokio::fs::write(temp.path(), data)
        .await
        .map_err(|e| format!("cannot store {original_name}: {e}"))?;
    Ok(UploadedFile::new(temp, original_name, data.len() as u64))
}

/// Splits `a[b][]` into `("a", ["b", ""])`. Names that are not well formed
/// are used verbatim; names nested deeper than [`MAX_NESTING_DEPTH`] yield
/// `None`.
fn split_field_name(name: &str) -> Option<(&str, Vec<&str>)> {
    let Some(open) = name.find('[') else {
        return Some((name, Vec::new()));
    };
    if open == 0 {
        return Some((name, Vec::new()));
    }

    let (base, mut rest) = name.split_at(open);
    let mut path = Vec::new();
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            return Some((name, Vec::new()));
        };
        if path.len() == MAX_NESTING_DEPTH {
            return None;
        }
        path.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    if !rest.is_empty() {
        return Some((name, Vec::new()));
    }
    Some((base, path))
}

/// Inserts one decoded form field, honouring bracket notation.
pub fn insert_field(fields: &mut Map<String, Value>, name: &str, value: String) {
    let Some((base, path)) = split_field_name(name) else {
        debug!(name_len = name.len(), "Dropping form field nested too deeply");
        return;
    };
    if path.is_empty() {
        fields.insert(base.to_string(), Value::String(value));
        return;
    }
    let slot = fields.entry(base.to_string()).or_insert(Value::Null);
    insert_path(slot, &path, value);
}

fn insert_path(slot: &mut Value, path: &[&str], value: String) {
    let Some((key, rest)) = path.split_first() else {
        *slot = Value::String(value);
        return;
    };

    if key.is_empty() {
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(items) = slot {
            items.push(Value::Null);
            if let Some(last) = items.last_mut() {
                insert_path(last, rest, value);
            }
        }
    } else {
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(map) = slot {
            let child = map.entry((*key).to_string()).or_insert(Value::Null);
            insert_path(child, rest, value);
        }
    }
}
