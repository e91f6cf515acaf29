//! Tool-server (MCP) client
//!
//! JSON-RPC 2.0 over a child process's stdio, one message per line.
//!
//! - [`transport`]: process spawning, line framing, serialized writes
//! - [`correlator`]: id allocation and response delivery
//! - [`protocol`]: message construction and classification
//! - [`client`]: connection lifecycle and the tool operations

pub mod client;
pub mod correlator;
pub mod protocol;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{ConnectionState, McpClient};
pub use correlator::{Correlator, PendingRequest};
pub use protocol::{ProtocolHandler, ServerMessage};
pub use transport::Transport;
