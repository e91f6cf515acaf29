//! Agent orchestration
//!
//! Interleaves model replies with tool execution for a single turn.

mod orchestrator;
mod prompt;

pub use orchestrator::{Orchestrator, ToolExecution, TurnOutcome, TurnState};
pub use prompt::build_system_prompt;
