//! Talk to one tool server directly

use agentgate_core::config::GatewayConfig;
use agentgate_core::{McpClient, McpServerConfig};
use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

#[derive(Debug, Args)]
pub struct McpArgs {
    /// Tool call to make after listing tools
    #[arg(long)]
    pub call: Option<String>,

    /// JSON object of arguments for --call
    #[arg(long = "args", default_value = "{}")]
    pub arguments: String,

    /// Server executable
    pub command: String,

    /// Arguments passed to the server
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

pub async fn run(config: GatewayConfig, args: McpArgs) -> Result<()> {
    let arguments: Value =
        serde_json::from_str(&args.arguments).context("--args must be a JSON object")?;

    let server = McpServerConfig::new(args.command.clone(), args.command.clone()).with_args(args.args.clone());
    let client = McpClient::connect(&server, config.mcp_options()).await?;

    let outcome = inspect(&client, args.call.as_deref(), arguments).await;
    client.close().await;
    outcome
}

async fn inspect(client: &McpClient, call: Option<&str>, arguments: Value) -> Result<()> {
    if let Some(info) = client.server_info() {
        println!("Server: {} {}", info.name, info.version);
    }
    if let Some(version) = client.protocol_version() {
        println!("Protocol: {}", version);
    }
    if let Some(instructions) = client.instructions() {
        println!("Instructions: {}", instructions);
    }

    let tools = client.list_tools().await?;
    println!("\nTools ({}):", tools.len());
    for tool in &tools {
        println!("  - {}: {}", tool.name, tool.description);
    }

    if let Some(name) = call {
        let output = client.call_tool(name, arguments).await?;
        println!("\n{} ->\n{}", name, output);
    }
    Ok(())
}
