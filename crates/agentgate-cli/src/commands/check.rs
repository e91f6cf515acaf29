//! Component self-test that needs no model endpoint

use crate::bootstrap;
use agentgate_core::config::{GatewayConfig, ENV_API_KEY};
use agentgate_core::tools::builtin::{FS_EXEC, FS_READ, FS_WRITE};
use agentgate_core::{register_builtin_tools, ToolRegistry};
use anyhow::Result;
use serde_json::json;
use std::sync::Arc;

const PREVIEW_CHARS: usize = 300;

pub async fn run(config: GatewayConfig) -> Result<()> {
    println!("AgentGate component check");
    println!("=========================");

    let scratch = tempfile::tempdir()?;
    let mut permissions = bootstrap::permissions(&config)?;
    permissions.grant_access(scratch.path())?;

    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, Arc::new(permissions), config.command_policy.clone())?;

    println!("\nTools:");
    println!("  Registered tools: {}", registry.len());
    for name in registry.names() {
        println!("    - {}", name);
    }

    println!("\nTool execution:");
    let args = json!({ "command": "echo 'Hello from AgentGate!'" }).to_string();
    report("exec", registry.execute(FS_EXEC, &args).await);

    println!("\nFile I/O:");
    let path = scratch.path().join("check.txt");
    let args = json!({ "path": path, "content": "Test content from AgentGate" }).to_string();
    report("write", registry.execute(FS_WRITE, &args).await);
    let args = json!({ "path": path }).to_string();
    report("read", registry.execute(FS_READ, &args).await);

    println!("\nSkills:");
    let skills = bootstrap::skills(&config).await;
    println!("  Loaded skills: {}", skills.len());
    for skill in skills.iter_all() {
        println!("    - {} ({}) {}", skill.name, skill.source, skill.slash_command());
        let missing = skill.requires.missing();
        if !missing.is_empty() {
            println!("      [unavailable: missing {}]", missing.join(", "));
        }
        if skill.model_invocable {
            println!("      [auto-invoke]");
        }
        if skill.user_invocable {
            println!("      [user-invoke]");
        }
    }

    println!("\nSkills prompt:");
    let prompt = skills.system_prompt_section();
    if prompt.is_empty() {
        println!("  No model-invocable skills found");
    } else {
        println!("  Generated prompt length: {} chars", prompt.chars().count());
        let preview: String = prompt.chars().take(PREVIEW_CHARS).collect();
        println!("  Preview:\n{}...", preview);
    }

    println!("\nSlash commands:");
    println!("{}", skills.slash_help());

    println!("=========================");
    if config.model.api_key.is_some() {
        println!("{} found; `agentgate chat` is ready", ENV_API_KEY);
    } else {
        println!("{} not set; model calls skipped", ENV_API_KEY);
        println!("  export {}='sk-...'", ENV_API_KEY);
    }

    Ok(())
}

fn report(label: &str, result: agentgate_core::Result<String>) {
    match result {
        Ok(output) => println!("  ok {}: {}", label, output.trim_end()),
        Err(e) => println!("  FAILED {}: {}", label, e),
    }
}
