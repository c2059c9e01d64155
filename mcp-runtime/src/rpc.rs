use serde_json::{Map, Value, json};

use crate::definitions::{RESOLVE_POINTS, SUMMARIZE_STAYS, tool_definitions};
use crate::tools::{ResolvePointsArgs, SummarizeStaysArgs, ToolDispatcher, ToolError};

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const MCP_SERVER_NAME: &str = "galuchat-mcp";

/// Application-defined code for provider failures.
pub const PROVIDER_ERROR: i64 = -32000;

#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "Parse error".to_string(),
            data: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
            data: None,
        }
    }

    fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<ToolError> for RpcError {
    fn from(err: ToolError) -> Self {
        match &err {
            ToolError::InvalidInput(invalid) => Self {
                code: -32602,
                message: err.code().as_str().to_string(),
                data: None,
            }
            .with_data(json!({
                "message": invalid.to_string(),
                "location": invalid.location(),
            })),
            ToolError::Resolve(resolve) => Self {
                code: PROVIDER_ERROR,
                message: resolve.code().as_str().to_string(),
                data: None,
            }
            .with_data(json!({ "message": resolve.to_string() })),
        }
    }
}

pub fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn error_response(id: Value, error: RpcError) -> Value {
    let mut payload = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    });
    if let Some(data) = error.data {
        payload["error"]["data"] = data;
    }
    payload
}

fn build_tool_call_response(envelope: Value) -> Value {
    let text = serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| "{}".to_string());
    json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": envelope
    })
}

/// JSON-RPC / MCP method table over a [`ToolDispatcher`].
///
/// Stateless apart from the dispatcher, so one instance serves both the HTTP
/// `/rpc` route and the stdio loop.
#[derive(Debug, Clone)]
pub struct McpServer {
    dispatcher: ToolDispatcher,
}

impl McpServer {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Handles a single message or a batch. Notifications produce no entry,
    /// so an empty vector means "nothing to send back".
    pub async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        // No id: a notification, never answered.
        let id = obj.get("id").cloned()?;

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            return Some(error_response(
                id,
                RpcError::invalid_request("method must be a string"),
            ));
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        Some(match self.handle_request(method, params).await {
            Ok(payload) => success_response(id, payload),
            Err(err) => error_response(id, err),
        })
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    pub fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": format!(
                "Use resolve_points to turn lat/lon into district codes and addresses (at most {} points per call). Use summarize_stays to group a time-ordered trajectory into stays. Per-point problems are reported in `errors` by index; the rest of the batch still succeeds.",
                self.dispatcher.limits().max_points
            )
        })
    }

    pub fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = tool_definitions()
            .iter()
            .map(|tool| tool.to_value())
            .collect();
        json!({ "tools": tools, "nextCursor": null })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => Value::Object(map.clone()),
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let envelope = match name {
            RESOLVE_POINTS => {
                let args: ResolvePointsArgs = parse_arguments(args)?;
                to_envelope(self.dispatcher.resolve_points(args).await)?
            }
            SUMMARIZE_STAYS => {
                let args: SummarizeStaysArgs = parse_arguments(args)?;
                to_envelope(self.dispatcher.summarize_stays(args).await)?
            }
            _ => return Err(RpcError::method_not_found(name)),
        };

        Ok(build_tool_call_response(envelope))
    }
}

fn parse_arguments<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, RpcError> {
    serde_json::from_value(args).map_err(|err| {
        RpcError::invalid_params("INVALID_INPUT").with_data(json!({
            "message": format!("Invalid arguments: {err}"),
            "location": { "field": "arguments" },
        }))
    })
}

fn to_envelope<T: serde::Serialize>(result: Result<T, ToolError>) -> Result<Value, RpcError> {
    let output = result.map_err(|err| {
        tracing::warn!(
            event = "tool_call_failed",
            code = err.code().as_str(),
            error = %err,
            "Tool call failed"
        );
        RpcError::from(err)
    })?;
    serde_json::to_value(output).map_err(|err| RpcError::internal(err.to_string()))
}
