//! Payload content classification.

use serde::de::IgnoredAny;

use crate::http::Headers;

/// Broad category of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// Valid UTF-8 that is not JSON.
    Text,
    /// Valid UTF-8 that parses as a JSON document.
    Json,
    /// Anything that is not valid UTF-8.
    Binary,
}

impl ContentKind {
    /// Default outgoing `content-type` for a body of this kind.
    pub fn mime(self) -> &'static str {
        match self {
            ContentKind::Text => "text/plain",
            ContentKind::Json => "application/json",
            ContentKind::Binary => "application/octet-stream",
        }
    }
}

pub fn classify(bytes: &[u8]) -> ContentKind {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return ContentKind::Binary;
    };
    if serde_json::from_str::<IgnoredAny>(text).is_ok() {
        ContentKind::Json
    } else {
        ContentKind::Text
    }
}

/// Add a `content-type` derived from `body` unless one is already present.
pub fn apply_default_content_type(headers: &mut Headers, body: Option<&[u8]>) {
    if headers.contains("content-type") {
        return;
    }
    if let Some(body) = body {
        headers.insert("content-type", classify(body).mime());
    }
}
