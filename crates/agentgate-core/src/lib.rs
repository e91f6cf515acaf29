//! AgentGate Core Library
//!
//! This crate provides the core functionality for AgentGate, including:
//! - A JSON-RPC tool-server (MCP) client over child-process stdio
//! - A tool registry with local sandboxed tools and tool-server proxies
//! - The agent turn orchestrator and its language-model collaborator
//! - Skills, per-user sessions and message routing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     agentgate-core                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  gateway/      - Inbound message -> session -> turn -> reply │
//! │  agent/        - Turn orchestration, system prompt          │
//! │  llm/          - Chat-completions client                    │
//! │  tools/        - Tool registry, builtins, tool-server proxy │
//! │  mcp/          - Transport, correlator, protocol client     │
//! │  sandbox/      - Path permissions, files, shell policy      │
//! │  skills/       - SKILL.md prompt skills, skill.json servers │
//! │  session/      - Bounded per-user history                   │
//! │  types/        - Shared type definitions                    │
//! │  config.rs     - Environment configuration                  │
//! │  error.rs      - Error types                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod gateway;
pub mod llm;
pub mod mcp;
pub mod sandbox;
pub mod session;
pub mod skills;
pub mod tools;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;

pub use agent::{Orchestrator, TurnOutcome, TurnState};
pub use config::{GatewayConfig, ModelConfig};
pub use gateway::{Gateway, InboundMessage, OutboundMessage};
pub use llm::{ChatModel, OpenAiClient};
pub use mcp::{ConnectionState, McpClient};
pub use sandbox::{FileSystemHandler, PermissionManager, TerminalHandler};
pub use session::{Session, SessionManager};
pub use skills::{SkillSet, SlashCommand};
pub use tools::{register_builtin_tools, ToolHandler, ToolRegistry};
