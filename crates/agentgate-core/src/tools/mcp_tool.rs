//! Tool handler backed by a tool-server client

use super::registry::ToolHandler;
use crate::error::Result;
use crate::mcp::McpClient;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Forwards calls to `tools/call` on a shared client
pub struct McpToolHandler {
    client: Arc<McpClient>,
    /// Name of the tool as the server knows it (without the skill prefix)
    remote_name: String,
}

impl McpToolHandler {
    pub fn new(client: Arc<McpClient>, remote_name: impl Into<String>) -> Self {
        Self {
            client,
            remote_name: remote_name.into(),
        }
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

#[async_trait]
impl ToolHandler for McpToolHandler {
    async fn call(&self, arguments: Value) -> Result<String> {
        self.client.call_tool(&self.remote_name, arguments).await
    }
}
