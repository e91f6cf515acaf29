//! Tools the agent can call
//!
//! Every tool is addressed by an opaque `skill:tool` name. Builtin tools run
//! locally inside the sandbox; tool-server tools are proxied over a
//! [`crate::mcp::McpClient`].

pub mod builtin;
mod mcp_tool;
mod registry;
pub mod schema;

pub use builtin::register_builtin_tools;
pub use mcp_tool::McpToolHandler;
pub use registry::{RegisteredTool, ToolHandler, ToolRegistry};

#[cfg(test)]
pub use registry::MockToolHandler;
