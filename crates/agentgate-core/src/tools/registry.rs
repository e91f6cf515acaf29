//! Tool registry
//!
//! Maps opaque tool names to handlers, local or backed by a tool server.
//! Registration order is preserved so the model is always offered tools in
//! the same order.
//!
//! Tools are offered to the model under their [`function_name`], so a call
//! may name a tool either way.

use super::mcp_tool::McpToolHandler;
use super::schema;
use crate::error::{Result, ToolError};
use crate::mcp::McpClient;
use crate::types::{
    function_name, McpClientOptions, McpServerConfig, ToolDefinition, ToolDescriptor,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Executes one tool with already-validated arguments
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<String>;
}

/// A tool the model can be offered
#[derive(Clone)]
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.descriptor.name)
            .finish()
    }
}

/// Ordered tool registry
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    /// name -> position in `tools`
    index: HashMap<String, usize>,
    /// model-facing function name -> position in `tools`
    functions: HashMap<String, usize>,
    /// Tool-server clients owned by this registry
    clients: Vec<Arc<McpClient>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under `descriptor.name`
    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<()> {
        let function = function_name(&descriptor.name);
        if function.is_empty() {
            return Err(ToolError::InvalidName(descriptor.name).into());
        }
        if self.index.contains_key(&descriptor.name) || self.functions.contains_key(&function) {
            return Err(ToolError::AlreadyRegistered(descriptor.name).into());
        }

        debug!("Registering tool: {} (offered as {})", descriptor.name, function);
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.functions.insert(function, self.tools.len());
        self.tools.push(RegisteredTool {
            descriptor,
            handler,
        });
        Ok(())
    }

    /// Look a tool up by its registered name or its model-facing function name
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index
            .get(name)
            .or_else(|| self.functions.get(name))
            .map(|&position| &self.tools[position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools
            .iter()
            .map(|tool| tool.descriptor.name.as_str())
            .collect()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|tool| tool.descriptor.clone())
            .collect()
    }

    /// Tool definitions in the function-calling format the model expects
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition::from(&tool.descriptor))
            .collect()
    }

    /// Parse, validate and run one tool call.
    ///
    /// `arguments` is the JSON-encoded string the model produced; an empty
    /// string means no arguments.
    pub async fn execute(&self, name: &str, arguments: &str) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let name = tool.descriptor.name.as_str();

        let arguments = Self::parse_arguments(name, arguments)?;
        schema::validate(&tool.descriptor.input_schema, &arguments).map_err(|reason| {
            ToolError::InvalidArguments {
                tool: name.to_string(),
                reason,
            }
        })?;

        debug!("Executing tool {} with {}", name, arguments);
        tool.handler.call(arguments).await
    }

    fn parse_arguments(name: &str, raw: &str) -> Result<Value> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Value::Object(Default::default()));
        }

        serde_json::from_str(raw).map_err(|e| {
            ToolError::InvalidArguments {
                tool: name.to_string(),
                reason: format!("arguments are not valid JSON: {}", e),
            }
            .into()
        })
    }

    // ========================================================================
    // Tool servers
    // ========================================================================

    /// Start a tool server and register each of its tools as `skill:tool`.
    ///
    /// Returns the number of tools registered. The client is owned by the
    /// registry and closed by [`ToolRegistry::close_all`].
    pub async fn register_mcp_server(
        &mut self,
        skill: &str,
        config: &McpServerConfig,
        options: McpClientOptions,
    ) -> Result<usize> {
        let client = Arc::new(McpClient::connect(config, options).await?);
        self.register_mcp_client(skill, client).await
    }

    /// Register the tools of an already-initialized client
    pub async fn register_mcp_client(
        &mut self,
        skill: &str,
        client: Arc<McpClient>,
    ) -> Result<usize> {
        let tools = match client.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                client.close().await;
                return Err(e);
            }
        };

        let mut registered = 0;
        for tool in tools {
            let full_name = format!("{}:{}", skill, tool.name);
            let handler = Arc::new(McpToolHandler::new(Arc::clone(&client), tool.name.clone()));
            match self.register(tool.renamed(full_name.clone()), handler) {
                Ok(()) => registered += 1,
                Err(e) => warn!("Skipping tool {}: {}", full_name, e),
            }
        }

        info!(
            "Registered {} tools from tool server '{}' as skill '{}'",
            registered,
            client.name(),
            skill
        );
        self.clients.push(client);
        Ok(registered)
    }

    pub fn clients(&self) -> &[Arc<McpClient>] {
        &self.clients
    }

    /// Close every owned tool-server client
    pub async fn close_all(&self) {
        for client in &self.clients {
            client.close().await;
        }
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("clients", &self.clients.len())
            .finish()
    }
}
