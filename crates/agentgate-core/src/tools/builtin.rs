//! Builtin local tools: `fs:read`, `fs:write`, `fs:list`, `fs:exec`

use super::registry::{ToolHandler, ToolRegistry};
use crate::error::{Result, ToolError};
use crate::sandbox::{FileSystemHandler, PermissionManager, TerminalHandler};
use crate::types::{CommandPolicy, ToolDescriptor};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub const FS_READ: &str = "fs:read";
pub const FS_WRITE: &str = "fs:write";
pub const FS_LIST: &str = "fs:list";
pub const FS_EXEC: &str = "fs:exec";

/// Register the four builtin tools
pub fn register_builtin_tools(
    registry: &mut ToolRegistry,
    permissions: Arc<PermissionManager>,
    policy: CommandPolicy,
) -> Result<()> {
    registry.register(
        ReadFileTool::descriptor(),
        Arc::new(ReadFileTool {
            permissions: Arc::clone(&permissions),
        }),
    )?;
    registry.register(
        WriteFileTool::descriptor(),
        Arc::new(WriteFileTool {
            permissions: Arc::clone(&permissions),
        }),
    )?;
    registry.register(
        ListDirectoryTool::descriptor(),
        Arc::new(ListDirectoryTool {
            permissions: Arc::clone(&permissions),
        }),
    )?;
    registry.register(
        ExecTool::descriptor(),
        Arc::new(ExecTool {
            permissions,
            policy,
        }),
    )?;
    Ok(())
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|e| {
        ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn path_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": { "type": "string", "description": description }
        },
        "required": ["path"]
    })
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

#[derive(Deserialize)]
struct ExecArgs {
    command: String,
}

// ============================================================================
// fs:read
// ============================================================================

pub struct ReadFileTool {
    permissions: Arc<PermissionManager>,
}

impl ReadFileTool {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            FS_READ,
            "Read the contents of a text file",
            path_schema("File path, absolute or relative to the workspace"),
        )
    }
}

#[async_trait]
impl ToolHandler for ReadFileTool {
    async fn call(&self, arguments: Value) -> Result<String> {
        let args: PathArgs = parse_args(FS_READ, arguments)?;
        FileSystemHandler::read_text_file(&self.permissions, &args.path).await
    }
}

// ============================================================================
// fs:write
// ============================================================================

pub struct WriteFileTool {
    permissions: Arc<PermissionManager>,
}

impl WriteFileTool {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            FS_WRITE,
            "Write text to a file, creating it (and parent directories) if needed",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path" },
                    "content": { "type": "string", "description": "Full file contents" }
                },
                "required": ["path", "content"]
            }),
        )
    }
}

#[async_trait]
impl ToolHandler for WriteFileTool {
    async fn call(&self, arguments: Value) -> Result<String> {
        let args: WriteArgs = parse_args(FS_WRITE, arguments)?;
        let (path, size) =
            FileSystemHandler::write_file(&self.permissions, &args.path, &args.content).await?;
        Ok(format!("Wrote {} bytes to {}", size, path.display()))
    }
}

// ============================================================================
// fs:list
// ============================================================================

pub struct ListDirectoryTool {
    permissions: Arc<PermissionManager>,
}

impl ListDirectoryTool {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            FS_LIST,
            "List the entries of a directory",
            path_schema("Directory path"),
        )
    }
}

#[async_trait]
impl ToolHandler for ListDirectoryTool {
    async fn call(&self, arguments: Value) -> Result<String> {
        let args: PathArgs = parse_args(FS_LIST, arguments)?;
        let entries = FileSystemHandler::list_directory(&self.permissions, &args.path).await?;

        Ok(entries.iter().fold(String::new(), |mut out, entry| {
            out.push_str(if entry.is_dir { "[DIR]  " } else { "[FILE] " });
            out.push_str(&entry.name);
            out.push('\n');
            out
        }))
    }
}

// ============================================================================
// fs:exec
// ============================================================================

pub struct ExecTool {
    permissions: Arc<PermissionManager>,
    policy: CommandPolicy,
}

impl ExecTool {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            FS_EXEC,
            "Run a shell command in the workspace and return its output",
            json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Command line passed to sh -c" }
                },
                "required": ["command"]
            }),
        )
    }
}

#[async_trait]
impl ToolHandler for ExecTool {
    async fn call(&self, arguments: Value) -> Result<String> {
        let args: ExecArgs = parse_args(FS_EXEC, arguments)?;
        let output = TerminalHandler::execute(
            &self.policy,
            &args.command,
            Some(self.permissions.base_dir()),
        )
        .await?;
        Ok(output.to_tool_text())
    }
}
