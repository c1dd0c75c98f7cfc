//! Error types for the resolution, dispatch and RPC layers.
//!
//! # Design
//! Each variant corresponds to one failure class a caller must be able to tell
//! apart (the CLI maps them to distinct exit codes). `Connectivity` is the only
//! variant the dispatcher produces on its own, and only after every candidate
//! failed to connect; `InvalidResponse` and `ErrorResponse` come exclusively
//! from the RPC layer.

use thiserror::Error;

/// Errors returned by the resolver, dispatcher, RPC client and renderer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A query fragment, target, header or method was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No candidate endpoint accepted a connection.
    #[error("could not connect to any endpoint (tried {})", attempted.join(", "))]
    Connectivity { attempted: Vec<String> },

    /// The connection was established but the exchange failed afterwards
    /// (protocol error, broken body, redirect loop, ...).
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The RPC response body is not a valid response envelope.
    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String, raw: Vec<u8> },

    /// The remote signaled a logical RPC error.
    #[error("error response {code}: {message}")]
    ErrorResponse {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
        /// The whole parsed response document.
        response: serde_json::Value,
    },

    /// The request envelope could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing rendered output failed.
    #[error("failed to render response: {0}")]
    Render(#[source] std::io::Error),
}
