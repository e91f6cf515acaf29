//! File system sandbox and command policy
//!
//! This module provides:
//! - Path confinement to granted roots
//! - File operations with permission checks
//! - Shell execution behind a blocked-pattern policy

mod filesystem;
pub mod permissions;
mod terminal;

pub use filesystem::FileSystemHandler;
pub use permissions::PermissionManager;
pub use terminal::{CommandOutput, TerminalHandler};
