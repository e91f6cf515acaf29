//! Tool-server protocol message handling

use crate::error::{McpError, Result};
use crate::types::{
    InitializeParams, InitializeResult, JsonRpcRequest, JsonRpcResponse, McpClientOptions,
    ToolCallParams, ToolCallResult, ToolDescriptor, ToolListResult, METHOD_NOT_FOUND,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, trace, warn};

/// Classified inbound frame
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// Response to one of our requests
    Response(JsonRpcResponse),
    /// Server-initiated notification (no id)
    Notification(JsonRpcRequest),
    /// Server-initiated request (has id, expects a response)
    Request(JsonRpcRequest),
}

/// Protocol handler for tool-server messages
pub struct ProtocolHandler;

impl ProtocolHandler {
    /// Build `initialize` params
    pub fn initialize_params(options: &McpClientOptions) -> Result<Value> {
        let params = InitializeParams {
            protocol_version: options.protocol_version.clone(),
            capabilities: json!({}),
            client_info: options.client_info.clone(),
        };
        Ok(serde_json::to_value(params)?)
    }

    /// Parse initialize result
    pub fn parse_initialize_result(
        result: Value,
        expected_version: &str,
    ) -> Result<InitializeResult> {
        let init: InitializeResult = Self::decode("initialize", result)?;

        if !init.protocol_version.is_empty() && init.protocol_version != expected_version {
            warn!(
                "Protocol version mismatch: requested {}, server answered {}",
                expected_version, init.protocol_version
            );
        }

        debug!(
            "Tool server initialized: {} v{}",
            init.server_info.name, init.server_info.version
        );
        Ok(init)
    }

    /// Parse tools/list result
    pub fn parse_tool_list(result: Value) -> Result<Vec<ToolDescriptor>> {
        let list: ToolListResult = Self::decode("tools/list", result)?;
        debug!("Tool server listed {} tools", list.tools.len());
        Ok(list.tools)
    }

    /// Build tools/call params; a null argument value is sent as `{}`
    pub fn tool_call_params(name: &str, arguments: Value) -> Result<Value> {
        let arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };
        let params = ToolCallParams {
            name: name.to_string(),
            arguments,
        };
        Ok(serde_json::to_value(params)?)
    }

    /// Parse tools/call result
    pub fn parse_tool_call_result(result: Value) -> Result<ToolCallResult> {
        let result: ToolCallResult = Self::decode("tools/call", result)?;
        if result.is_error {
            debug!("Tool call reported isError with {} parts", result.content.len());
        }
        Ok(result)
    }

    /// Classify an inbound frame (response, notification, or server request)
    pub fn parse_message(value: &Value) -> Result<ServerMessage> {
        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        let has_method = value.get("method").is_some();

        if has_id && (value.get("result").is_some() || value.get("error").is_some()) {
            let response: JsonRpcResponse = serde_json::from_value(value.clone())
                .map_err(|e| McpError::InvalidMessage(format!("Malformed response: {}", e)))?;
            return Ok(ServerMessage::Response(response));
        }

        if has_method {
            let request: JsonRpcRequest = serde_json::from_value(value.clone())
                .map_err(|e| McpError::InvalidMessage(format!("Malformed request: {}", e)))?;
            trace!("Server message: {}", request.method);
            return Ok(if has_id {
                ServerMessage::Request(request)
            } else {
                ServerMessage::Notification(request)
            });
        }

        Err(McpError::InvalidMessage(format!("Unknown message type: {}", value)).into())
    }

    /// Answer a server request the client does not implement
    pub fn method_not_found(request: &JsonRpcRequest) -> JsonRpcResponse {
        JsonRpcResponse::failure(
            request.id.clone().unwrap_or(Value::Null),
            METHOD_NOT_FOUND,
            format!("Method not found: {}", request.method),
        )
    }

    fn decode<T: DeserializeOwned>(method: &str, result: Value) -> Result<T> {
        serde_json::from_value(result).map_err(|e| {
            McpError::InvalidMessage(format!("Malformed {} result: {}", method, e)).into()
        })
    }
}
