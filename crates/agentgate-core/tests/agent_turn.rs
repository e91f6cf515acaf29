//! End-to-end turns with a scripted model and real tools

mod common;

use agentgate_core::llm::ChatCompletion;
use agentgate_core::tools::builtin::{FS_EXEC, FS_LIST};
use agentgate_core::{
    register_builtin_tools, ChatMessage, CommandPolicy, McpClientOptions, Orchestrator,
    PermissionManager, Role, ToolCall, ToolRegistry, TurnState,
};
use common::{echo_server, fake_client, ScriptedModel};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn builtin_registry(workspace: &TempDir) -> ToolRegistry {
    let permissions = Arc::new(PermissionManager::for_workspace(workspace.path()).unwrap());
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, permissions, CommandPolicy::default()).unwrap();
    registry
}

fn tool_calls(calls: Vec<ToolCall>) -> ChatCompletion {
    ChatCompletion::from_message(ChatMessage::assistant_tool_calls(calls))
}

/// Function names the chat-completions API accepts: `[a-zA-Z0-9_-]{1,64}`
fn is_function_name(name: &str) -> bool {
    (1..=64).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[tokio::test]
async fn test_list_files_turn() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("a.txt"), "a").unwrap();
    std::fs::create_dir(workspace.path().join("sub")).unwrap();

    let list_args = json!({ "path": workspace.path() }).to_string();
    let mut final_reply = ChatMessage::assistant("There is one file, a.txt, and one directory, sub.");
    final_reply.tool_calls = vec![ToolCall::function(
        "call_2",
        FS_EXEC,
        r#"{"command":"touch must-not-exist"}"#,
    )];

    let model = ScriptedModel::new(vec![
        tool_calls(vec![ToolCall::function("call_1", FS_LIST, list_args)]),
        ChatCompletion::from_message(final_reply),
    ]);
    let orchestrator = Orchestrator::new(
        model.clone(),
        Arc::new(builtin_registry(&workspace)),
        "test-model",
    );

    let outcome = orchestrator
        .run_turn(&[ChatMessage::user("list files in /tmp")])
        .await
        .unwrap();

    assert_eq!(
        outcome.content,
        "There is one file, a.txt, and one directory, sub."
    );
    assert_eq!(
        outcome.states,
        vec![
            TurnState::AwaitingModel,
            TurnState::ExecutingTools,
            TurnState::AwaitingFinal,
            TurnState::Done
        ]
    );
    assert_eq!(outcome.ignored_tool_calls, 1);
    assert!(!workspace.path().join("must-not-exist").exists());

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 4);
    assert_eq!(requests[0].messages.len(), 2);
    assert!(requests[1].tools.is_empty());

    let messages = &requests[1].messages;
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[1].content, "list files in /tmp");
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(messages[2].tool_calls[0].id, "call_1");
    assert_eq!(messages[3].role, Role::Tool);
    assert_eq!(messages[3].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(messages[3].content, "[DIR]  sub\n[FILE] a.txt\n");
}

#[tokio::test]
async fn test_blocked_command_does_not_abort_turn() {
    let workspace = TempDir::new().unwrap();
    let model = ScriptedModel::new(vec![
        tool_calls(vec![
            ToolCall::function("c1", FS_EXEC, r#"{"command":"rm -rf /"}"#),
            ToolCall::function("c2", FS_EXEC, r#"{"command":"echo still here"}"#),
        ]),
        ChatCompletion::from_message(ChatMessage::assistant("I refused to wipe the disk.")),
    ]);
    let orchestrator = Orchestrator::new(
        model.clone(),
        Arc::new(builtin_registry(&workspace)),
        "test-model",
    );

    let outcome = orchestrator
        .run_turn(&[ChatMessage::user("clean up everything")])
        .await
        .unwrap();
    assert_eq!(outcome.content, "I refused to wipe the disk.");

    let requests = model.requests();
    assert_eq!(requests.len(), 2);

    let results: Vec<_> = requests[1]
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].content.starts_with("Error: "));
    assert!(results[0].content.contains("blocked"));
    assert_eq!(results[1].content, "still here\n");
    assert!(outcome.executions[0].is_error);
    assert!(!outcome.executions[1].is_error);
}

#[tokio::test]
async fn test_turn_through_tool_server() {
    let client = fake_client(McpClientOptions::default(), echo_server);
    client.initialize().await.unwrap();

    let mut registry = ToolRegistry::new();
    registry
        .register_mcp_client("demo", Arc::new(client))
        .await
        .unwrap();
    let registry = Arc::new(registry);

    let model = ScriptedModel::new(vec![
        tool_calls(vec![
            ToolCall::function("e1", "demo:echo", r#"{"text":"ping"}"#),
            ToolCall::function("e2", "demo:echo", r#"{"text":42}"#),
        ]),
        ChatCompletion::from_message(ChatMessage::assistant("pong")),
    ]);
    let orchestrator = Orchestrator::new(model.clone(), Arc::clone(&registry), "test-model");

    let outcome = orchestrator
        .run_turn(&[ChatMessage::user("echo ping")])
        .await
        .unwrap();
    assert_eq!(outcome.content, "pong");
    assert_eq!(outcome.executions[0].output, "ping\n");
    assert!(outcome.executions[1].is_error);
    assert!(outcome.executions[1].output.contains("must be of type string"));

    let offered: Vec<_> = model.requests()[0]
        .tools
        .iter()
        .map(|t| t.function.name.clone())
        .collect();
    assert_eq!(offered, vec!["demo__echo", "demo__mixed"]);

    registry.close_all().await;
}

#[tokio::test]
async fn test_reply_without_tool_calls_is_single_call() {
    let workspace = TempDir::new().unwrap();
    let model = ScriptedModel::new(vec![ChatCompletion::from_message(ChatMessage::assistant(
        "Hello!",
    ))]);
    let orchestrator = Orchestrator::new(
        model.clone(),
        Arc::new(builtin_registry(&workspace)),
        "test-model",
    );

    let history = vec![
        ChatMessage::user("hi"),
        ChatMessage::assistant("hello"),
        ChatMessage::user("how are you?"),
    ];
    let outcome = orchestrator.run_turn(&history).await.unwrap();

    assert_eq!(outcome.content, "Hello!");
    assert_eq!(outcome.states, vec![TurnState::AwaitingModel, TurnState::Done]);
    assert_eq!(model.requests().len(), 1);
    assert_eq!(model.requests()[0].messages[1..], history[..]);
}

#[tokio::test]
async fn test_requests_use_chat_completions_wire_format() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("a.txt"), "a").unwrap();

    let model = ScriptedModel::new(vec![
        tool_calls(vec![ToolCall::function(
            "call_1",
            "fs__list",
            r#"{"path":"."}"#,
        )]),
        ChatCompletion::from_message(ChatMessage::assistant("One file.")),
    ]);
    let orchestrator = Orchestrator::new(
        model.clone(),
        Arc::new(builtin_registry(&workspace)),
        "gpt-4o-mini",
    );

    let outcome = orchestrator
        .run_turn(&[ChatMessage::user("what is here?")])
        .await
        .unwrap();
    assert_eq!(outcome.content, "One file.");
    assert_eq!(outcome.executions[0].tool, FS_LIST);
    assert!(!outcome.executions[0].is_error);

    let requests = model.requests();
    let first = serde_json::to_value(&requests[0]).unwrap();
    assert_eq!(first["model"], "gpt-4o-mini");
    assert!(first["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains("- fs__list: "));

    let tools = first["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 4);
    for tool in tools {
        assert_eq!(tool["type"], "function");
        let name = tool["function"]["name"].as_str().unwrap();
        assert!(is_function_name(name), "invalid function name {}", name);
        assert_eq!(tool["function"]["parameters"]["type"], "object");
    }

    let second = serde_json::to_value(&requests[1]).unwrap();
    assert!(second.get("tools").is_none());
    let messages = second["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(
        messages[1],
        json!({ "role": "user", "content": "what is here?" })
    );
    assert_eq!(
        messages[2],
        json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": { "name": "fs__list", "arguments": "{\"path\":\".\"}" }
            }]
        })
    );
    assert_eq!(
        messages[3],
        json!({ "role": "tool", "content": "[FILE] a.txt\n", "tool_call_id": "call_1" })
    );
}
