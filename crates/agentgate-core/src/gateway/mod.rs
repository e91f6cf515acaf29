//! Message routing
//!
//! Channel adapters push [`InboundMessage`]s into the gateway; each one is
//! answered with exactly one [`OutboundMessage`] on the same channel and chat.

use crate::agent::Orchestrator;
use crate::session::SessionManager;
use crate::skills::{SkillSet, SlashCommand};
use crate::types::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Reply sent when a turn fails
pub const APOLOGY: &str = "Sorry, something went wrong while processing your message.";

/// Message received from a chat channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub user_id: String,
    pub chat_id: String,
    pub text: String,
    /// Channel name, e.g. `console`
    pub channel: String,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        chat_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            chat_id: chat_id.into(),
            text: text.into(),
            channel: channel.into(),
            received_at: Utc::now(),
        }
    }
}

/// Reply routed back to the originating channel and chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Id of the inbound message this answers
    pub reply_to: String,
    pub user_id: String,
    pub chat_id: String,
    pub channel: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

impl OutboundMessage {
    fn reply(message: &InboundMessage, text: String) -> Self {
        Self {
            reply_to: message.id.clone(),
            user_id: message.user_id.clone(),
            chat_id: message.chat_id.clone(),
            channel: message.channel.clone(),
            text,
            sent_at: Utc::now(),
        }
    }
}

pub struct Gateway {
    orchestrator: Arc<Orchestrator>,
    sessions: Arc<SessionManager>,
    skills: Arc<SkillSet>,
}

impl Gateway {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        sessions: Arc<SessionManager>,
        skills: Arc<SkillSet>,
    ) -> Self {
        Self {
            orchestrator,
            sessions,
            skills,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn skills(&self) -> &Arc<SkillSet> {
        &self.skills
    }

    /// Answer one message.
    ///
    /// The user's session stays locked until the reply is recorded, so two
    /// messages from one user never interleave their history updates.
    pub async fn handle(&self, message: InboundMessage) -> OutboundMessage {
        info!(
            user = message.user_id.as_str(),
            channel = message.channel.as_str(),
            "Inbound message: {}",
            message.text
        );

        let mut user_text = message.text.clone();
        match self.skills.resolve_slash(&message.text) {
            Some(SlashCommand::Help) => {
                return OutboundMessage::reply(&message, self.skills.slash_help());
            }
            Some(SlashCommand::Tool {
                skill,
                tool,
                arguments,
            }) => {
                debug!(skill = skill.as_str(), tool = tool.as_str(), "Dispatching slash command to tool");
                let reply = match self.orchestrator.tools().execute(&tool, &arguments).await {
                    Ok(output) => output,
                    Err(e) => format!("Error: {}", e),
                };
                let session = self.sessions.session(&message.user_id);
                let mut session = session.lock().await;
                session.push(ChatMessage::user(message.text.clone()));
                session.push(ChatMessage::assistant(reply.clone()));
                return OutboundMessage::reply(&message, reply);
            }
            Some(SlashCommand::Prompt { skill, text }) => {
                debug!(skill = skill.as_str(), "Injecting skill prompt");
                user_text = text;
            }
            None => {}
        }

        let session = self.sessions.session(&message.user_id);
        let mut session = session.lock().await;
        session.push(ChatMessage::user(user_text));

        let reply = match self.orchestrator.run_turn(&session.snapshot()).await {
            Ok(outcome) => outcome.content,
            Err(e) => {
                error!(user = message.user_id.as_str(), "Turn failed: {}", e);
                APOLOGY.to_string()
            }
        };

        session.push(ChatMessage::assistant(reply.clone()));
        OutboundMessage::reply(&message, reply)
    }

    /// Route messages until `inbound_rx` closes, one task per message.
    ///
    /// Returns once every in-flight message has been answered.
    pub async fn run(
        self: Arc<Self>,
        mut inbound_rx: mpsc::Receiver<InboundMessage>,
        outbound_tx: mpsc::Sender<OutboundMessage>,
    ) {
        let mut in_flight = JoinSet::new();

        while let Some(message) = inbound_rx.recv().await {
            let gateway = Arc::clone(&self);
            let outbound_tx = outbound_tx.clone();
            in_flight.spawn(async move {
                let reply = gateway.handle(message).await;
                if outbound_tx.send(reply).await.is_err() {
                    warn!("Outbound channel closed; dropping reply");
                }
            });

            // Reap finished tasks so the set does not grow unbounded
            while let Some(result) = in_flight.try_join_next() {
                if let Err(e) = result {
                    error!("Message task failed: {}", e);
                }
            }
        }

        while let Some(result) = in_flight.join_next().await {
            if let Err(e) = result {
                error!("Message task failed: {}", e);
            }
        }
        debug!("Gateway inbound channel closed");
    }
}
