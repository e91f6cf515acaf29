//! Console channel

use crate::bootstrap;
use agentgate_core::config::GatewayConfig;
use agentgate_core::{Gateway, InboundMessage, OpenAiClient, Orchestrator, SessionManager};
use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

const CHANNEL: &str = "console";
const CONSOLE_USER: &str = "console";

pub async fn run(config: GatewayConfig) -> Result<()> {
    let model = OpenAiClient::new(&config.model).context("set OPENAI_API_KEY to chat")?;
    let registry = Arc::new(bootstrap::tool_registry(&config).await?);
    let skills = Arc::new(bootstrap::skills(&config).await);

    let orchestrator = Orchestrator::new(
        Arc::new(model),
        Arc::clone(&registry),
        config.model.model.clone(),
    )
    .with_skills_section(&skills.system_prompt_section());

    let gateway = Arc::new(Gateway::new(
        Arc::new(orchestrator),
        Arc::new(SessionManager::new(config.history_limit)),
        skills,
    ));

    let (inbound_tx, inbound_rx) = mpsc::channel(100);
    let (outbound_tx, mut outbound_rx) = mpsc::channel(100);
    let router = tokio::spawn(gateway.run(inbound_rx, outbound_tx));

    info!("Console channel ready (model: {})", config.model.model);
    println!("AgentGate console. Type /help for slash commands, exit to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "exit" || text == "quit" {
            break;
        }

        inbound_tx
            .send(InboundMessage::new(CHANNEL, CONSOLE_USER, CONSOLE_USER, text))
            .await
            .context("gateway stopped")?;

        match outbound_rx.recv().await {
            Some(reply) => println!("{}\n", reply.text),
            None => break,
        }
    }

    drop(inbound_tx);
    router.await.context("gateway task failed")?;
    registry.close_all().await;
    Ok(())
}
