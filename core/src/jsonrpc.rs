//! JSON-RPC request envelopes and recursive response validation.
//!
//! # Design
//! `RpcClient` posts a request envelope through the `Dispatcher`, so failover
//! and transcript behavior are exactly those of plain calls. The response body
//! is parsed into a `ResponseNode` tree only to decide success or failure; on
//! success the caller gets the original bytes back untouched.

use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dispatch::{Dispatcher, Transport, UreqTransport};
use crate::error::ApiError;
use crate::http::{BasicAuth, Headers, Target};
use crate::url::normalize_endpoint;

const JSONRPC_VERSION: &str = "2.0";

/// Call parameters, by position or by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

/// A request envelope as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    jsonrpc: &'static str,
    pub method: String,
    pub params: Params,
    pub id: u64,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Params) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
            id: 1,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }
}

/// A parsed response envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseNode {
    Success {
        result: Value,
        id: Option<Value>,
    },
    Error {
        code: i64,
        message: String,
        data: Option<Value>,
        id: Option<Value>,
    },
    /// Batches may nest.
    Batch(Vec<ResponseNode>),
}

impl ResponseNode {
    /// Interpret a JSON document as a response node. The error string
    /// describes the first element that is not a valid envelope.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(ResponseNode::from_value)
                .collect::<Result<Vec<_>, _>>()
                .map(ResponseNode::Batch),
            Value::Object(object) => {
                let id = object.get("id").cloned();
                match object.get("error") {
                    Some(Value::Null) | None => {}
                    Some(error) => return error_node(error, id),
                }
                match object.get("result") {
                    Some(result) => Ok(ResponseNode::Success {
                        result: result.clone(),
                        id,
                    }),
                    None => Err("object has neither \"result\" nor \"error\"".to_string()),
                }
            }
            other => Err(format!("expected an object or an array, found {}", kind_of(other))),
        }
    }

    /// First `Error` node in depth-first order, if any.
    pub fn first_error(&self) -> Option<&ResponseNode> {
        match self {
            ResponseNode::Success { .. } => None,
            ResponseNode::Error { .. } => Some(self),
            ResponseNode::Batch(nodes) => nodes.iter().find_map(ResponseNode::first_error),
        }
    }
}

fn error_node(error: &Value, id: Option<Value>) -> Result<ResponseNode, String> {
    let Value::Object(error) = error else {
        return Err(format!("\"error\" must be an object, found {}", kind_of(error)));
    };
    let code = error
        .get("code")
        .and_then(Value::as_i64)
        .ok_or_else(|| "\"error.code\" must be an integer".to_string())?;
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .ok_or_else(|| "\"error.message\" must be a string".to_string())?;
    Ok(ResponseNode::Error {
        code,
        message: message.to_string(),
        data: error.get("data").cloned(),
        id,
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse `raw` as a response envelope and fail on the first logical error.
pub fn validate(raw: &[u8]) -> Result<ResponseNode, ApiError> {
    let invalid = |reason: String| ApiError::InvalidResponse {
        reason,
        raw: raw.to_vec(),
    };
    let document: Value = serde_json::from_slice(raw).map_err(|e| invalid(e.to_string()))?;
    let node = ResponseNode::from_value(&document).map_err(invalid)?;

    if let Some(ResponseNode::Error {
        code,
        message,
        data,
        ..
    }) = node.first_error()
    {
        return Err(ApiError::ErrorResponse {
            code: *code,
            message: message.clone(),
            data: data.clone(),
            response: document,
        });
    }
    Ok(node)
}

/// Sends JSON-RPC calls to the first reachable endpoint.
pub struct RpcClient<T = UreqTransport> {
    dispatcher: Dispatcher<T>,
    endpoints: Vec<String>,
    headers: Headers,
    credential: Option<BasicAuth>,
}

impl RpcClient<UreqTransport> {
    pub fn new(endpoints: Vec<String>, headers: Headers, credential: Option<BasicAuth>) -> Self {
        Self::with_dispatcher(Dispatcher::new(), endpoints, headers, credential)
    }
}

impl<T: Transport> RpcClient<T> {
    pub fn with_dispatcher(
        dispatcher: Dispatcher<T>,
        endpoints: Vec<String>,
        headers: Headers,
        credential: Option<BasicAuth>,
    ) -> Self {
        Self {
            dispatcher,
            endpoints,
            headers,
            credential,
        }
    }

    /// POST `request` and return the raw response body once it validates.
    pub fn send(
        &self,
        request: &RpcRequest,
        verbosity: u8,
        sink: Option<&mut dyn Write>,
    ) -> Result<Vec<u8>, ApiError> {
        let body = serde_json::to_vec(request)?;

        let mut headers = Headers::new();
        headers.insert("content-type", "application/json");
        headers.merge(&self.headers);

        let target = Target::new("POST", "")
            .with_headers(headers)
            .with_body(body)
            .with_credential(self.credential.clone());
        let urls: Vec<String> = self.endpoints.iter().map(|e| normalize_endpoint(e)).collect();

        let response = self.dispatcher.attempt(&urls, &target, verbosity, sink)?;
        validate(&response.body)?;
        Ok(response.body)
    }
}
