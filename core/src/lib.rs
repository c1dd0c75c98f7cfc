//! Multi-endpoint request resolution and dispatch.
//!
//! # Overview
//! Turns a logical call (method, target, query fragments, headers, body) and
//! an ordered list of base endpoints into concrete URLs, delivers the call to
//! the first endpoint that accepts a connection, and, for JSON-RPC calls,
//! validates the response envelope recursively.
//!
//! # Design
//! - `url::resolve` and `classify::classify` are pure functions.
//! - `Dispatcher` is the only component that performs I/O, through the
//!   `Transport` trait; `UreqTransport` is the blocking production
//!   implementation. Everything is synchronous and sequential.
//! - Configuration (endpoints, default headers, credentials) is always passed
//!   in explicitly; the crate holds no global state.
//! - Rendering is a `Renderer` collaborator; `StreamRenderer` writes to plain
//!   `Write` streams and never spawns processes.

pub mod classify;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod jsonrpc;
pub mod render;
pub mod url;

pub use classify::{classify, ContentKind};
pub use dispatch::{Dispatcher, Transport, TransportError, UreqTransport, SHOW_HEADERS};
pub use error::ApiError;
pub use http::{BasicAuth, Header, Headers, HttpRequest, HttpResponse, Target};
pub use jsonrpc::{Params, ResponseNode, RpcClient, RpcRequest};
pub use render::{hex_dump, Renderer, StreamRenderer};
pub use crate::url::{escape_query, resolve};
