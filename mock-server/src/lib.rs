use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Number of requests a server instance has received.
pub type Hits = Arc<AtomicUsize>;

/// Bytes that are not valid UTF-8.
pub const BINARY_BODY: &[u8] = &[0x93, 0xfa, 0x96, 0x7b, 0x8c, 0xea];

/// What `/echo` reports about the request it received.
#[derive(Debug, Serialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: serde_json::Map<String, Value>,
    pub body: String,
}

pub fn app() -> Router {
    app_with_hits(Hits::default())
}

pub fn app_with_hits(hits: Hits) -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/echo/{*rest}", any(echo))
        .route("/status/{code}", any(status))
        .route("/redirect/{hops}", any(redirect))
        .route("/binary", get(binary))
        .route("/rpc", post(rpc))
        .route("/canned/{name}", post(canned))
        .layer(middleware::from_fn_with_state(hits, count_hits))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_hits(listener: TcpListener, hits: Hits) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_hits(hits)).await
}

async fn count_hits(State(hits): State<Hits>, request: Request, next: Next) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    next.run(request).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            )
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, format!("status {code}")).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "invalid status code").into_response(),
    }
}

/// Redirect `hops` times before landing on `/echo`.
async fn redirect(Path(hops): Path<u32>) -> Response {
    let location = if hops <= 1 {
        "/echo".to_string()
    } else {
        format!("/redirect/{}", hops - 1)
    };
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn binary() -> Response {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        BINARY_BODY,
    )
        .into_response()
}

async fn rpc(body: Bytes) -> Json<Value> {
    let Ok(document) = serde_json::from_slice::<Value>(&body) else {
        return Json(rpc_error(Value::Null, -32700, "Parse error", None));
    };
    match document {
        Value::Array(calls) => Json(Value::Array(calls.iter().map(handle_call).collect())),
        call => Json(handle_call(&call)),
    }
}

fn handle_call(call: &Value) -> Value {
    let id = call.get("id").cloned().unwrap_or(Value::Null);
    let params = call.get("params").cloned().unwrap_or_else(|| json!([]));
    match call.get("method").and_then(Value::as_str) {
        Some("echo") => json!({"jsonrpc": "2.0", "result": params, "id": id}),
        Some("sum") => {
            let total: i64 = params
                .as_array()
                .map(|items| items.iter().filter_map(Value::as_i64).sum())
                .unwrap_or(0);
            json!({"jsonrpc": "2.0", "result": total, "id": id})
        }
        Some("fail") => rpc_error(id, -32000, "requested failure", Some(params)),
        Some(_) => rpc_error(id, -32601, "Method not found", None),
        None => rpc_error(id, -32600, "Invalid Request", None),
    }
}

fn rpc_error(id: Value, code: i64, message: &str, data: Option<Value>) -> Value {
    let mut error = json!({"code": code, "message": message});
    if let Some(data) = data {
        error["data"] = data;
    }
    json!({"jsonrpc": "2.0", "error": error, "id": id})
}

/// Fixed response bodies, whatever the request was.
async fn canned(Path(name): Path<String>) -> Response {
    let body: &'static str = match name.as_str() {
        "ok-batch" => r#"[{"jsonrpc":"2.0","result":1,"id":1},{"jsonrpc":"2.0","result":2,"id":2}]"#,
        "mixed-batch" => {
            r#"[{"jsonrpc":"2.0","result":1,"id":1},{"jsonrpc":"2.0","error":{"code":-32601,"message":"not found"},"id":2}]"#
        }
        "html" => return (StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").into_response(),
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}
