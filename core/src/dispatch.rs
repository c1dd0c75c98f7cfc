//! Sequential multi-endpoint dispatch with connection-failure failover.
//!
//! # Design
//! The `Dispatcher` walks the candidate URLs strictly in order and sends one
//! request per candidate through a `Transport`. Only a failure to establish a
//! connection moves on to the next candidate; every other outcome (any HTTP
//! status, a broken exchange, a redirect problem) ends the walk. Redirects are
//! followed here rather than inside the transport so every hop can be written
//! to the verbose transcript.

use std::io::{self, Write};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::classify::apply_default_content_type;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse, Target};
use crate::url::resolve;

/// Verbosity at which request and response headers are written to the sink.
pub const SHOW_HEADERS: u8 = 1;

pub const DEFAULT_MAX_REDIRECTS: usize = 30;

/// Failure reported by a `Transport` for a single request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No connection could be established (DNS, refused, unreachable,
    /// connect timeout). The dispatcher moves on to the next candidate.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The connection was established but the exchange failed.
    #[error("{0}")]
    Exchange(String),
}

/// Executes exactly one HTTP request. Implementations must not follow
/// redirects and must report non-2xx statuses as ordinary responses.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .allow_non_standard_methods(true)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for header in &request.headers {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }

        let started = Instant::now();
        let sent = match &request.body {
            Some(body) => builder.body(body.as_slice()).map(|req| self.agent.run(req)),
            None => builder.body(()).map(|req| self.agent.run(req)),
        };
        let mut response = sent
            .map_err(|e| TransportError::Exchange(format!("invalid request: {e}")))?
            .map_err(from_ureq)?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| TransportError::Exchange(e.to_string()))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
            elapsed: started.elapsed(),
        })
    }
}

fn from_ureq(err: ureq::Error) -> TransportError {
    let connect_failure = match &err {
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => true,
        ureq::Error::Timeout(timeout) => {
            matches!(timeout, ureq::Timeout::Resolve | ureq::Timeout::Connect)
        }
        ureq::Error::Io(e) => is_connect_io_error(e.kind()),
        _ => false,
    };
    if connect_failure {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Exchange(err.to_string())
    }
}

fn is_connect_io_error(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::TimedOut
    )
}

/// One request/response pair of a redirect chain, as shown in the transcript.
///
/// Request headers are the ones the dispatcher built. Headers the transport
/// adds on its own (`host`, `user-agent`, `accept-encoding`, ...) are not
/// listed.
#[derive(Debug, Clone)]
struct Hop {
    method: String,
    url: String,
    request_headers: Vec<(String, String)>,
    status: u16,
    reason: String,
    response_headers: Vec<(String, String)>,
}

impl Hop {
    fn new(request: &HttpRequest, response: &HttpResponse) -> Self {
        Self {
            method: request.method.clone(),
            url: request.url.clone(),
            request_headers: request
                .headers
                .iter()
                .map(|h| (h.name.clone(), h.value.clone()))
                .collect(),
            status: response.status,
            reason: response.reason.clone(),
            response_headers: response.headers.clone(),
        }
    }
}

fn write_transcript(sink: &mut dyn Write, hops: &[Hop]) -> io::Result<()> {
    for (idx, hop) in hops.iter().enumerate() {
        if idx > 0 {
            writeln!(sink)?;
        }
        writeln!(sink, "> {} {}", hop.method, hop.url)?;
        for (name, value) in &hop.request_headers {
            writeln!(sink, "> {name}: {value}")?;
        }
        writeln!(sink)?;
        writeln!(sink, "< {} {}", hop.status, hop.reason)?;
        for (name, value) in &hop.response_headers {
            writeln!(sink, "< {name}: {value}")?;
        }
    }
    sink.flush()
}

/// Build the follow-up request for a redirect response, or `None` when the
/// response carries no `location`.
fn redirect_request(
    request: &HttpRequest,
    response: &HttpResponse,
) -> Result<Option<HttpRequest>, ApiError> {
    let Some(location) = response.header("location") else {
        return Ok(None);
    };
    let transport_error = |message: String| ApiError::Transport {
        url: request.url.clone(),
        message,
    };
    let current = Url::parse(&request.url).map_err(|e| transport_error(e.to_string()))?;
    let next = current
        .join(location)
        .map_err(|e| transport_error(format!("bad redirect location {location:?}: {e}")))?;

    let (method, body) = match response.status {
        303 if request.method != "HEAD" => ("GET".to_string(), None),
        301 | 302 if request.method == "POST" => ("GET".to_string(), None),
        _ => (request.method.clone(), request.body.clone()),
    };

    let mut headers = request.headers.clone();
    if body.is_none() {
        headers.remove("content-type");
        headers.remove("content-length");
    }
    if current.host_str() != next.host_str() || current.port_or_known_default() != next.port_or_known_default() {
        headers.remove("authorization");
    }

    Ok(Some(HttpRequest {
        method,
        url: next.to_string(),
        headers,
        body,
    }))
}

/// Sends a call to the first reachable candidate URL.
#[derive(Debug, Clone)]
pub struct Dispatcher<T = UreqTransport> {
    transport: T,
    max_redirects: usize,
}

impl Dispatcher<UreqTransport> {
    pub fn new() -> Self {
        Self::with_transport(UreqTransport::new())
    }
}

impl Default for Dispatcher<UreqTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Dispatcher<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    pub fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Resolve `target` against `endpoints`, default its `content-type` from
    /// the body, and dispatch it.
    pub fn fetch(
        &self,
        endpoints: &[String],
        target: &Target,
        verbosity: u8,
        sink: Option<&mut dyn Write>,
    ) -> Result<HttpResponse, ApiError> {
        let urls = resolve(endpoints, &target.url, &target.queries)?;
        let mut target = target.clone();
        apply_default_content_type(&mut target.headers, target.body.as_deref());
        self.attempt(&urls, &target, verbosity, sink)
    }

    /// Try each URL in order. Returns the response of the first candidate
    /// that accepted a connection, whatever its status.
    pub fn attempt(
        &self,
        urls: &[String],
        target: &Target,
        verbosity: u8,
        mut sink: Option<&mut dyn Write>,
    ) -> Result<HttpResponse, ApiError> {
        for url in urls {
            let request = target.request_for(url)?;
            debug!(method = %request.method, url = %request.url, "sending request");

            let response = match self.transport.send(&request) {
                Ok(response) => response,
                Err(TransportError::Connect(reason)) => {
                    warn!(url = %url, reason = %reason, "could not connect, trying next candidate");
                    continue;
                }
                Err(TransportError::Exchange(message)) => {
                    return Err(ApiError::Transport {
                        url: url.clone(),
                        message,
                    });
                }
            };

            let mut hops = Vec::new();
            let outcome = self.follow_redirects(request, response, &mut hops);
            if verbosity >= SHOW_HEADERS {
                if let Some(sink) = sink.as_deref_mut() {
                    if let Err(e) = write_transcript(sink, &hops) {
                        warn!(error = %e, "failed to write transcript");
                    }
                }
            }
            return outcome;
        }

        info!(candidates = urls.len(), "no candidate endpoint accepted a connection");
        Err(ApiError::Connectivity {
            attempted: urls.to_vec(),
        })
    }

    fn follow_redirects(
        &self,
        mut request: HttpRequest,
        mut response: HttpResponse,
        hops: &mut Vec<Hop>,
    ) -> Result<HttpResponse, ApiError> {
        loop {
            hops.push(Hop::new(&request, &response));
            if !response.is_redirect() {
                return Ok(response);
            }
            let Some(next) = redirect_request(&request, &response)? else {
                return Ok(response);
            };
            if hops.len() > self.max_redirects {
                return Err(ApiError::Transport {
                    url: next.url,
                    message: format!("exceeded {} redirects", self.max_redirects),
                });
            }

            debug!(status = response.status, location = %next.url, "following redirect");
            response = self.transport.send(&next).map_err(|e| ApiError::Transport {
                url: next.url.clone(),
                message: e.to_string(),
            })?;
            request = next;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    /// What a scripted URL answers with.
    pub(crate) enum Reply {
        Respond(HttpResponse),
        Refuse,
        Break,
    }

    pub(crate) fn response(status: u16, headers: &[(&str, &str)], body: &[u8]) -> HttpResponse {
        HttpResponse {
            status,
            reason: match status {
                200 => "OK",
                302 => "Found",
                303 => "See Other",
                307 => "Temporary Redirect",
                500 => "Internal Server Error",
                _ => "",
            }
            .to_string(),
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body: body.to_vec(),
            elapsed: Duration::from_millis(1),
        }
    }

    /// Transport that answers from a URL-keyed script and records every
    /// request it receives. Unknown URLs refuse the connection.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        script: HashMap<String, Reply>,
        pub(crate) requests: RefCell<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn on(mut self, url: &str, reply: Reply) -> Self {
            self.script.insert(url.to_string(), reply);
            self
        }

        pub(crate) fn urls(&self) -> Vec<String> {
            self.requests.borrow().iter().map(|r| r.url.clone()).collect()
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.borrow_mut().push(request.clone());
            match self.script.get(&request.url) {
                Some(Reply::Respond(res)) => Ok(res.clone()),
                Some(Reply::Break) => Err(TransportError::Exchange("connection reset".to_string())),
                Some(Reply::Refuse) | None => Err(TransportError::Connect("refused".to_string())),
            }
        }
    }
}
