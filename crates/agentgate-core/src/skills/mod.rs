//! Skills
//!
//! Prompt skills (`SKILL.md`) extend the system prompt and the slash-command
//! vocabulary; tool skills (`skill.json`) contribute tool servers.

mod loader;
mod manifest;

pub use loader::{Requirements, Skill, SkillSet, SkillSource, SlashCommand, SKILL_FILE};
pub use manifest::{
    discover_manifests, register_tool_skills, McpLaunch, ToolSkillManifest, MANIFEST_FILE,
};
