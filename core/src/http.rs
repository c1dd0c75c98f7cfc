//! HTTP transport types shared by the resolver, dispatcher and RPC layer.
//!
//! # Design
//! Requests and responses are plain data. The dispatcher builds one
//! `HttpRequest` per candidate URL and hands it to a `Transport`, which is the
//! only place that touches the network. Everything else in the crate works on
//! these values, which keeps URL composition, failover decisions and envelope
//! validation deterministic and testable without sockets.
//!
//! All fields use owned types (`String`, `Vec`) so a request can be recorded
//! for the verbose transcript after it has been sent.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// A single header as it appears in configuration and on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered header list with case-insensitive, last-write-wins names.
///
/// Inserting a header whose name already exists removes the old entry and
/// appends the new one, so the list never holds two headers that differ only
/// by case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(Vec<Header>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let header = Header::new(name, value);
        self.remove(&header.name);
        self.0.push(header);
    }

    /// Remove every header matching `name`, ignoring case.
    pub fn remove(&mut self, name: &str) {
        self.0.retain(|h| !h.name.eq_ignore_ascii_case(name));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Layer `other` on top of `self`; entries of `other` win.
    pub fn merge(&mut self, other: &Headers) {
        for header in &other.0 {
            self.insert(header.name.clone(), header.value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Header> for Headers {
    fn from_iter<I: IntoIterator<Item = Header>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for header in iter {
            headers.insert(header.name, header.value);
        }
        headers
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// HTTP basic-auth credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub user: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Value for the `authorization` header.
    pub fn header_value(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.user, self.password));
        format!("Basic {token}")
    }
}

/// A logical call before it has been resolved against any endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub method: String,
    pub url: String,
    pub queries: Vec<String>,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub credential: Option<BasicAuth>,
}

impl Target {
    /// Method names are normalized to upper case.
    pub fn new(method: &str, url: impl Into<String>) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.into(),
            queries: Vec::new(),
            headers: Headers::new(),
            body: None,
            credential: None,
        }
    }

    pub fn with_queries<I, S>(mut self, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.queries = queries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_credential(mut self, credential: Option<BasicAuth>) -> Self {
        self.credential = credential;
        self
    }

    /// Build the immutable attempt for one resolved URL.
    pub(crate) fn request_for(&self, url: &str) -> Result<HttpRequest, ApiError> {
        if self.method.is_empty() || !self.method.bytes().all(is_token_byte) {
            return Err(ApiError::InvalidArgument(format!(
                "invalid HTTP method: {:?}",
                self.method
            )));
        }
        let mut headers = self.headers.clone();
        if let Some(credential) = &self.credential {
            headers.insert("authorization", credential.header_value());
        }
        Ok(HttpRequest {
            method: self.method.clone(),
            url: url.to_string(),
            headers,
            body: self.body.clone(),
        })
    }
}

/// RFC 9110 `tchar`.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// One fully-resolved HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub elapsed: Duration,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// MIME type from `content-type`, with directives such as `charset`
    /// stripped.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
            .map(|value| value.split(';').next().unwrap_or(value).trim())
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with(headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status: 200,
            reason: "OK".to_string(),
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn later_header_overrides_earlier_ignoring_case() {
        let mut headers = Headers::new();
        headers.insert("Accept", "text/plain");
        headers.insert("x-token", "a");
        headers.insert("ACCEPT", "application/json");

        let pairs: Vec<(&str, &str)> = headers
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
            .collect();
        assert_eq!(pairs, vec![("x-token", "a"), ("ACCEPT", "application/json")]);
        assert_eq!(headers.get("accept"), Some("application/json"));
    }

    #[test]
    fn merge_layers_other_on_top() {
        let mut base: Headers = vec![Header::new("a", "1"), Header::new("b", "2")]
            .into_iter()
            .collect();
        let overrides: Headers = vec![Header::new("B", "3")].into_iter().collect();
        base.merge(&overrides);
        assert_eq!(base.get("b"), Some("3"));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn remove_is_case_insensitive() {
        let mut headers: Headers = vec![Header::new("X-Api-Key", "k")].into_iter().collect();
        headers.remove("x-api-key");
        assert!(headers.is_empty());
    }

    #[test]
    fn headers_serialize_as_plain_list() {
        let headers: Headers = vec![Header::new("a", "1")].into_iter().collect();
        let json = serde_json::to_string(&headers).unwrap();
        assert_eq!(json, r#"[{"name":"a","value":"1"}]"#);
    }

    #[test]
    fn basic_auth_header_value() {
        let auth = BasicAuth::new("Aladdin", "open sesame");
        assert_eq!(auth.header_value(), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
    }

    #[test]
    fn request_for_folds_credential_into_headers() {
        let target = Target::new("get", "users")
            .with_credential(Some(BasicAuth::new("Aladdin", "open sesame")));
        let req = target.request_for("http://localhost/users").unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(
            req.headers.get("Authorization"),
            Some("Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==")
        );
    }

    #[test]
    fn request_for_rejects_garbage_method() {
        let target = Target::new("GE T", "users");
        let err = target.request_for("http://localhost/users").unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[test]
    fn content_type_strips_directives() {
        let res = response_with(&[("Content-Type", "application/json; charset=utf-8")]);
        assert_eq!(res.content_type(), Some("application/json"));
    }

    #[test]
    fn content_type_absent() {
        assert_eq!(response_with(&[]).content_type(), None);
    }
}
