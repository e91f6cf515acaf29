//! Assemble tools and skills from configuration

use agentgate_core::config::GatewayConfig;
use agentgate_core::skills::{discover_manifests, register_tool_skills, SkillSet};
use agentgate_core::{register_builtin_tools, PermissionManager, ToolRegistry};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Workspace plus every extra root that can be resolved
pub fn permissions(config: &GatewayConfig) -> Result<PermissionManager> {
    let mut permissions = PermissionManager::for_workspace(&config.workspace)
        .with_context(|| format!("invalid workspace {}", config.workspace.display()))?;

    for root in &config.extra_roots {
        if let Err(e) = permissions.grant_access(root) {
            warn!("Not granting {}: {}", root.display(), e);
        }
    }
    Ok(permissions)
}

/// Builtin tools plus the tools of every `skill.json` tool server
pub async fn tool_registry(config: &GatewayConfig) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_builtin_tools(
        &mut registry,
        Arc::new(permissions(config)?),
        config.command_policy.clone(),
    )?;

    let manifests = discover_manifests(&config.skill_roots()).await;
    register_tool_skills(&mut registry, &manifests, &config.mcp_options()).await;

    info!("Tool registry ready: {}", registry.names().join(", "));
    Ok(registry)
}

pub async fn skills(config: &GatewayConfig) -> SkillSet {
    SkillSet::load(&config.skill_roots()).await
}
