use axum::body::Bytes;
use axum::http::{HeaderMap, Method, header};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::errors::RelayError;

/// Parsed POST fields of a form-encoded or multipart request.
#[derive(Debug, Clone, PartialEq)]
pub enum PostData {
    /// The request was not a form submission.
    Absent,
    Fields(Map<String, Value>),
    /// The body claimed to be a form but could not be decoded.
    Malformed(String),
}

/// A file part of a multipart request, spooled to a temporary file.
///
/// The temporary file is removed when the owning request is dropped.
#[derive(Debug)]
pub struct UploadedFile {
    temp: NamedTempFile,
    /// Filename as sent by the client. Not trusted for anything but display.
    pub original_name: String,
    pub size: u64,
}

impl UploadedFile {
    #[must_use]
    pub fn new(temp: NamedTempFile, original_name: String, size: u64) -> Self {
        Self {
            temp,
            original_name,
            size,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}

/// One inbound webhook request, immutable once received.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub post_data: PostData,
    pub files: Vec<UploadedFile>,
}

impl InboundRequest {
    /// A request with no form data or files attached.
    #[must_use]
    pub fn new(method: Method, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            headers,
            body: body.into(),
            post_data: PostData::Absent,
            files: Vec::new(),
        }
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    /// Raw body as text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn raw_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// What a successful relay did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelayReceipt {
    pub blocks_sent: usize,
    pub files_uploaded: usize,
    pub files_failed: usize,
}

pub type RelayResult = Result<RelayReceipt, RelayError>;
