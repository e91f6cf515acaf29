//! One conversational turn
//!
//! A turn makes at most two model calls. The first is offered every registered
//! tool; when it asks for tool calls they run one after another in the order
//! given, each result goes back into the conversation as a `tool` message, and
//! a second call without tools produces the final answer. Tool calls requested
//! by that second reply are not executed.

use super::prompt::build_system_prompt;
use crate::error::Result;
use crate::llm::{ChatModel, CompletionRequest};
use crate::tools::ToolRegistry;
use crate::types::{ChatMessage, ToolCall};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Progress of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingModel,
    ExecutingTools,
    AwaitingFinal,
    Done,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnState::AwaitingModel => "awaiting_model",
            TurnState::ExecutingTools => "executing_tools",
            TurnState::AwaitingFinal => "awaiting_final",
            TurnState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of one executed tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExecution {
    pub call_id: String,
    pub tool: String,
    /// Text placed in the tool-result message
    pub output: String,
    pub is_error: bool,
}

/// Result of [`Orchestrator::run_turn`]
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Final assistant content, returned verbatim
    pub content: String,
    /// States visited, in order
    pub states: Vec<TurnState>,
    pub executions: Vec<ToolExecution>,
    /// Tool calls in the final reply that were left unexecuted
    pub ignored_tool_calls: usize,
}

/// Drives turns against a model and a tool registry
pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    model_name: String,
    system_prompt: String,
}

impl Orchestrator {
    /// Orchestrator whose system prompt lists the registered tools
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Arc<ToolRegistry>,
        model_name: impl Into<String>,
    ) -> Self {
        let system_prompt = build_system_prompt(&tools.descriptors(), "");
        Self {
            model,
            tools,
            model_name: model_name.into(),
            system_prompt,
        }
    }

    /// Rebuild the system prompt with a skills section
    pub fn with_skills_section(mut self, skills_section: &str) -> Self {
        self.system_prompt = build_system_prompt(&self.tools.descriptors(), skills_section);
        self
    }

    /// Replace the system prompt entirely
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Run one turn over `history`, which should end with the user message.
    ///
    /// Tool failures become `"Error: ..."` results and never abort the turn;
    /// model failures do.
    pub async fn run_turn(&self, history: &[ChatMessage]) -> Result<TurnOutcome> {
        let mut states = vec![TurnState::AwaitingModel];
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend_from_slice(history);

        let request = CompletionRequest::new(self.model_name.clone(), messages.clone())
            .with_tools(self.tools.definitions());
        let reply = self.model.complete(request).await?.into_message()?;

        if !reply.has_tool_calls() {
            states.push(TurnState::Done);
            debug!("Turn finished without tool calls");
            return Ok(TurnOutcome {
                content: reply.content,
                states,
                executions: Vec::new(),
                ignored_tool_calls: 0,
            });
        }

        states.push(TurnState::ExecutingTools);
        info!("Model requested {} tool call(s)", reply.tool_calls.len());

        let calls = reply.tool_calls;
        messages.push(ChatMessage::assistant_tool_calls(calls.clone()));

        let mut executions = Vec::with_capacity(calls.len());
        for call in &calls {
            let execution = self.execute_call(call).await;
            messages.push(ChatMessage::tool_result(
                execution.call_id.clone(),
                execution.output.clone(),
            ));
            executions.push(execution);
        }

        states.push(TurnState::AwaitingFinal);
        let request = CompletionRequest::new(self.model_name.clone(), messages);
        let final_reply = self.model.complete(request).await?.into_message()?;

        let ignored_tool_calls = final_reply.tool_calls.len();
        if ignored_tool_calls > 0 {
            debug!(
                "Final reply requested {} more tool call(s); not executing",
                ignored_tool_calls
            );
        }

        states.push(TurnState::Done);
        Ok(TurnOutcome {
            content: final_reply.content,
            states,
            executions,
            ignored_tool_calls,
        })
    }

    async fn execute_call(&self, call: &ToolCall) -> ToolExecution {
        // Report the registered name, not the model-facing alias.
        let tool = self
            .tools
            .get(&call.function.name)
            .map_or(call.function.name.as_str(), |tool| tool.descriptor.name.as_str());
        debug!(tool, id = call.id.as_str(), "Executing tool call");

        let (output, is_error) = match self.tools.execute(tool, &call.function.arguments).await {
            Ok(output) => (output, false),
            Err(e) => {
                warn!(tool, "Tool call failed: {}", e);
                (format!("Error: {}", e), true)
            }
        };

        ToolExecution {
            call_id: call.id.clone(),
            tool: tool.to_string(),
            output,
            is_error,
        }
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("model", &self.model_name)
            .field("tools", &self.tools.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ModelError, ToolError};
    use crate::llm::{ChatCompletion, MockChatModel};
    use crate::tools::MockToolHandler;
    use crate::types::{Role, ToolDescriptor};
    use mockall::predicate::eq;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry_with(name: &str, handler: MockToolHandler) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolDescriptor::new(name, "test tool", json!({ "type": "object" })),
                Arc::new(handler),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn reply(content: &str) -> ChatCompletion {
        ChatCompletion::from_message(ChatMessage::assistant(content))
    }

    fn tool_reply(calls: Vec<ToolCall>) -> ChatCompletion {
        ChatCompletion::from_message(ChatMessage::assistant_tool_calls(calls))
    }

    #[tokio::test]
    async fn test_turn_without_tool_calls() {
        let mut handler = MockToolHandler::new();
        handler.expect_call().times(0);

        let mut model = MockChatModel::new();
        model
            .expect_complete()
            .withf(|request| {
                request.tools.len() == 1
                    && request.messages[0].role == Role::System
                    && request.messages[1].content == "hi"
            })
            .times(1)
            .returning(|_| Ok(reply("hello")));

        let orchestrator =
            Orchestrator::new(Arc::new(model), registry_with("fs:list", handler), "test-model");
        let outcome = orchestrator
            .run_turn(&[ChatMessage::user("hi")])
            .await
            .unwrap();

        assert_eq!(outcome.content, "hello");
        assert_eq!(outcome.states, vec![TurnState::AwaitingModel, TurnState::Done]);
        assert!(outcome.executions.is_empty());
    }

    #[tokio::test]
    async fn test_tool_results_are_reinserted_in_call_order() {
        let mut seq = Sequence::new();
        let mut handler = MockToolHandler::new();
        handler
            .expect_call()
            .with(eq(json!({ "n": 1 })))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("first".to_string()));
        handler
            .expect_call()
            .with(eq(json!({ "n": 2 })))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("second".to_string()));

        let mut model = MockChatModel::new();
        let mut turns = Sequence::new();
        model
            .expect_complete()
            .times(1)
            .in_sequence(&mut turns)
            .returning(|_| {
                Ok(tool_reply(vec![
                    ToolCall::function("call_1", "demo:count", r#"{"n":1}"#),
                    ToolCall::function("call_2", "demo__count", r#"{"n":2}"#),
                ]))
            });
        model
            .expect_complete()
            .withf(|request| {
                let tail: Vec<_> = request.messages.iter().skip(2).collect();
                request.tools.is_empty()
                    && tail.len() == 3
                    && tail[0].role == Role::Assistant
                    && tail[0].tool_calls.len() == 2
                    && tail[1].tool_call_id.as_deref() == Some("call_1")
                    && tail[1].content == "first"
                    && tail[2].tool_call_id.as_deref() == Some("call_2")
                    && tail[2].content == "second"
            })
            .times(1)
            .in_sequence(&mut turns)
            .returning(|_| Ok(reply("counted twice")));

        let orchestrator =
            Orchestrator::new(Arc::new(model), registry_with("demo:count", handler), "m");
        let outcome = orchestrator
            .run_turn(&[ChatMessage::user("count")])
            .await
            .unwrap();

        assert_eq!(outcome.content, "counted twice");
        assert_eq!(
            outcome.states,
            vec![
                TurnState::AwaitingModel,
                TurnState::ExecutingTools,
                TurnState::AwaitingFinal,
                TurnState::Done
            ]
        );
        assert_eq!(outcome.executions.len(), 2);
        assert_eq!(outcome.executions[1].output, "second");
        assert_eq!(outcome.executions[1].tool, "demo:count");
    }

    #[tokio::test]
    async fn test_tool_failure_becomes_error_text() {
        let mut handler = MockToolHandler::new();
        handler.expect_call().times(1).returning(|_| {
            Err(ToolError::Failed {
                tool: "demo:boom".to_string(),
                reason: "exploded".to_string(),
            }
            .into())
        });

        let mut model = MockChatModel::new();
        let mut turns = Sequence::new();
        model
            .expect_complete()
            .times(1)
            .in_sequence(&mut turns)
            .returning(|_| {
                Ok(tool_reply(vec![
                    ToolCall::function("a", "demo:boom", "{}"),
                    ToolCall::function("b", "demo:missing", "{}"),
                ]))
            });
        model
            .expect_complete()
            .times(1)
            .in_sequence(&mut turns)
            .returning(|_| Ok(reply("sorry, both failed")));

        let orchestrator =
            Orchestrator::new(Arc::new(model), registry_with("demo:boom", handler), "m");
        let outcome = orchestrator
            .run_turn(&[ChatMessage::user("go")])
            .await
            .unwrap();

        assert_eq!(outcome.content, "sorry, both failed");
        assert!(outcome.executions.iter().all(|e| e.is_error));
        assert!(outcome.executions[0].output.starts_with("Error: "));
        assert!(outcome.executions[0].output.contains("exploded"));
        assert!(outcome.executions[1].output.contains("Unknown tool: demo:missing"));
    }

    #[tokio::test]
    async fn test_nested_tool_calls_are_not_executed() {
        let mut handler = MockToolHandler::new();
        handler
            .expect_call()
            .times(1)
            .returning(|_| Ok("once".to_string()));

        let mut model = MockChatModel::new();
        let mut turns = Sequence::new();
        model
            .expect_complete()
            .times(1)
            .in_sequence(&mut turns)
            .returning(|_| Ok(tool_reply(vec![ToolCall::function("1", "demo:t", "{}")])));
        model
            .expect_complete()
            .times(1)
            .in_sequence(&mut turns)
            .returning(|_| {
                let mut message = ChatMessage::assistant("partial answer");
                message.tool_calls = vec![ToolCall::function("2", "demo:t", "{}")];
                Ok(ChatCompletion::from_message(message))
            });

        let orchestrator = Orchestrator::new(Arc::new(model), registry_with("demo:t", handler), "m");
        let outcome = orchestrator
            .run_turn(&[ChatMessage::user("go")])
            .await
            .unwrap();

        assert_eq!(outcome.content, "partial answer");
        assert_eq!(outcome.ignored_tool_calls, 1);
        assert_eq!(outcome.executions.len(), 1);
    }

    #[tokio::test]
    async fn test_model_failure_aborts_turn() {
        let mut model = MockChatModel::new();
        model
            .expect_complete()
            .times(1)
            .returning(|_| Err(ModelError::EmptyResponse.into()));

        let orchestrator = Orchestrator::new(
            Arc::new(model),
            Arc::new(ToolRegistry::new()),
            "m",
        );
        let result = orchestrator.run_turn(&[ChatMessage::user("hi")]).await;
        assert!(matches!(result, Err(Error::Model(ModelError::EmptyResponse))));
    }

    #[test]
    fn test_skills_section_in_prompt() {
        let orchestrator = Orchestrator::new(
            Arc::new(MockChatModel::new()),
            Arc::new(ToolRegistry::new()),
            "m",
        )
        .with_skills_section("# Available Skills");
        assert!(orchestrator.system_prompt().ends_with("\n\n# Available Skills"));
    }
}
