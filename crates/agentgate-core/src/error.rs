//! Error types for AgentGate Core

use std::time::Duration;
use thiserror::Error;

/// Main error type for AgentGate operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Tool server error: {0}")]
    Mcp(#[from] McpError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Tool-server (JSON-RPC over stdio) errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Failed to spawn tool server '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Request {id} ({method}) timed out after {after:?}")]
    Timeout {
        method: String,
        id: u64,
        after: Duration,
    },

    #[error("Request {id} ({method}) was cancelled")]
    Cancelled { method: String, id: u64 },

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Invalid state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Tool registry and tool execution errors
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("Tool already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Tool name '{0}' cannot be offered to the model")]
    InvalidName(String),

    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool '{tool}' failed: {reason}")]
    Failed { tool: String, reason: String },
}

/// Sandbox/filesystem errors
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Path not granted: {0}")]
    PathNotGranted(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Command execution is disabled by policy")]
    CommandsDisabled,

    #[error("Command blocked by policy (matched '{pattern}'): {command}")]
    CommandBlocked { command: String, pattern: String },
}

/// Language-model endpoint errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Missing API key for model endpoint")]
    MissingApiKey,

    #[error("Network error calling model endpoint: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Model API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Model returned an empty response")]
    EmptyResponse,
}

impl McpError {
    /// Build an RPC error from a wire error object
    pub fn rpc(error: &crate::types::JsonRpcError) -> Self {
        Self::Rpc {
            code: error.code,
            message: error.message.clone(),
            data: error.data.clone(),
        }
    }
}

impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_display() {
        let err = Error::Mcp(McpError::Rpc {
            code: -32601,
            message: "Method not found".to_string(),
            data: None,
        });
        assert_eq!(
            err.to_string(),
            "Tool server error: RPC error -32601: Method not found"
        );
    }

    #[test]
    fn test_error_serializes_as_string() {
        let err = Error::Tool(ToolError::NotFound("fs:nope".to_string()));
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Tool error: Unknown tool: fs:nope\"");
    }
}
