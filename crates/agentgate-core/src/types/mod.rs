//! Core type definitions for AgentGate
//!
//! This module contains all shared types used across the crate,
//! including JSON-RPC envelopes, tool-server payloads, conversation
//! messages and configuration types.

mod chat_types;
mod jsonrpc_types;
mod mcp_types;

pub use chat_types::*;
pub use jsonrpc_types::*;
pub use mcp_types::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Tool server (child process) configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<String>,
}

impl McpServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Per-connection tuning for a tool-server client
#[derive(Debug, Clone)]
pub struct McpClientOptions {
    /// Deadline applied to every request awaiting a response
    pub request_timeout: Duration,
    pub protocol_version: String,
    pub client_info: ClientInfo,
}

impl Default for McpClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            client_info: ClientInfo::default(),
        }
    }
}

/// Shell command execution policy for the `fs:exec` tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPolicy {
    pub enabled: bool,
    pub blocked_patterns: Vec<String>,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            blocked_patterns: vec![
                "rm -rf /".to_string(),
                "> /dev/sda".to_string(),
                "mkfs".to_string(),
                "dd if=/dev/zero".to_string(),
                ":(){ :|:& };:".to_string(),
            ],
        }
    }
}

/// Directory entry returned by the listing tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: Option<u64>,
}
