//! `skill.json` tool-skill manifests
//!
//! A tool skill directory holds a `skill.json` naming a tool server to spawn.
//! Its tools are registered as `<skill>:<tool>`.

use super::loader::skill_dirs;
use crate::error::Result;
use crate::tools::ToolRegistry;
use crate::types::{McpClientOptions, McpServerConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const MANIFEST_FILE: &str = "skill.json";

/// Tool server launched for a tool skill
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct McpLaunch {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolSkillManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub mcp: Option<McpLaunch>,
    /// Directory the manifest was read from
    #[serde(skip)]
    pub dir: PathBuf,
}

impl ToolSkillManifest {
    pub async fn load(dir: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(dir.join(MANIFEST_FILE)).await?;
        let mut manifest: Self = serde_json::from_str(&raw)?;
        manifest.dir = dir.to_path_buf();
        Ok(manifest)
    }

    /// Server configuration, run from the skill directory
    pub fn server_config(&self) -> Option<McpServerConfig> {
        self.mcp.as_ref().map(|launch| McpServerConfig {
            name: self.name.clone(),
            command: launch.command.clone(),
            args: launch.args.clone(),
            env: launch.env.clone(),
            cwd: Some(self.dir.to_string_lossy().into_owned()),
        })
    }
}

/// Read every `skill.json` under `roots`; unreadable manifests are skipped
pub async fn discover_manifests(roots: &[PathBuf]) -> Vec<ToolSkillManifest> {
    let mut manifests = Vec::new();
    for root in roots {
        for dir in skill_dirs(root) {
            if !dir.join(MANIFEST_FILE).is_file() {
                continue;
            }
            match ToolSkillManifest::load(&dir).await {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => debug!("Skipping invalid manifest in {}: {}", dir.display(), e),
            }
        }
    }
    manifests
}

/// Start the tool server of every manifest that names one and register its
/// tools. A server that fails to start is logged and skipped. Returns the
/// number of tools registered.
pub async fn register_tool_skills(
    registry: &mut ToolRegistry,
    manifests: &[ToolSkillManifest],
    options: &McpClientOptions,
) -> usize {
    let mut total = 0;
    for manifest in manifests {
        let Some(config) = manifest.server_config() else {
            debug!("Tool skill {} has no tool server; nothing to register", manifest.name);
            continue;
        };

        match registry
            .register_mcp_server(&manifest.name, &config, options.clone())
            .await
        {
            Ok(count) => total += count,
            Err(e) => warn!("Failed to start tool skill {}: {}", manifest.name, e),
        }
    }
    info!("Registered {} tool(s) from tool skills", total);
    total
}
