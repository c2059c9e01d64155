use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::post};
use galuchat_mcp_runtime::rpc::{RpcError, error_response};
use serde_json::Value;

use crate::state::{AppState, ServiceSettings};

pub fn router(settings: &ServiceSettings) -> Router<AppState> {
    Router::new().route(&settings.path("/rpc"), post(rpc_post))
}

/// JSON-RPC 2.0 / MCP endpoint
///
/// Accepts a single message or a batch. Protocol errors are returned in the
/// JSON-RPC body with HTTP 200; a message made only of notifications gets 204.
#[utoipa::path(
    post,
    path = "/mcp/rpc",
    request_body(content = Object, description = "JSON-RPC 2.0 request or batch"),
    responses(
        (status = 200, description = "JSON-RPC response or batch of responses", body = Object),
        (status = 204, description = "Only notifications were sent"),
        (status = 429, description = "Too many requests from this client", body = galuchat_core::error::ApiError)
    ),
    tag = "mcp"
)]
pub async fn rpc_post(State(state): State<AppState>, body: Bytes) -> Response {
    let incoming: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!(event = "rpc_parse_error", error = %err, "Unparseable JSON-RPC body");
            return (
                StatusCode::OK,
                Json(error_response(Value::Null, RpcError::parse_error())),
            )
                .into_response();
        }
    };

    // An empty batch is answered with one error object, not an array.
    let single_reply = incoming.as_array().is_none_or(Vec::is_empty);
    let mut responses = state.mcp.handle_incoming_message(incoming).await;

    if responses.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }

    if single_reply && let Some(single) = responses.pop() {
        return (StatusCode::OK, Json(single)).into_response();
    }

    (StatusCode::OK, Json(Value::Array(responses))).into_response()
}
