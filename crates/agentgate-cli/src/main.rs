//! AgentGate command-line front end
//!
//! Chat with the agent on the console, self-test the local components, or
//! poke at a single tool server.

use agentgate_core::config::GatewayConfig;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod bootstrap;
mod commands;

#[derive(Debug, Parser)]
#[command(name = "agentgate", version, about = "Tool-calling agent gateway")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Flags layered over the environment configuration
#[derive(Debug, Args)]
struct Overrides {
    /// Workspace root for relative paths and project skills
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Model name sent to the completion endpoint
    #[arg(long, global = true)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Tool-server request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Extra directory the file tools may access (repeatable)
    #[arg(long = "allow", global = true, default_value = "/tmp")]
    allow: Vec<PathBuf>,

    /// Disable the shell tool
    #[arg(long, global = true)]
    no_exec: bool,
}

impl Overrides {
    fn apply(self, config: &mut GatewayConfig) {
        if let Some(workspace) = self.workspace {
            config.workspace = workspace;
        }
        if let Some(model) = self.model {
            config.model.model = model;
        }
        if let Some(base_url) = self.base_url {
            config.model.base_url = base_url;
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout = Duration::from_secs(timeout);
        }
        config.extra_roots = self.allow;
        if self.no_exec {
            config.command_policy.enabled = false;
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chat with the agent on the console
    Chat,
    /// Self-test tools and skills without calling the model
    Check,
    /// Connect to a tool server and list (or call) its tools
    Mcp(commands::mcp::McpArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (stdout is reserved for replies)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    let mut config = GatewayConfig::from_env()?;
    cli.overrides.apply(&mut config);

    match cli.command {
        Command::Chat => commands::chat::run(config).await,
        Command::Check => commands::check::run(config).await,
        Command::Mcp(args) => commands::mcp::run(config, args).await,
    }
}
