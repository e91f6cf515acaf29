pub mod chat;
pub mod check;
pub mod mcp;
