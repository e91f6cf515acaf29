//! Conversation types shared by the orchestrator and the model client
//!
//! Field names follow the OpenAI chat-completions wire format.

use super::mcp_types::ToolDescriptor;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Message author role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Assistant placeholder recording the tool calls it requested
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Tool-role message carrying the textual result of one tool call
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Tool call issued by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn function(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function name plus JSON-encoded arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// Tool offered to the model (`{"type":"function","function":{...}}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDescriptor> for ToolDefinition {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            kind: function_kind(),
            function: FunctionDefinition {
                name: function_name(&descriptor.name),
                description: descriptor.description.clone(),
                parameters: descriptor.input_schema.clone(),
            },
        }
    }
}

/// Longest function name the chat-completions API accepts
pub const MAX_FUNCTION_NAME_LEN: usize = 64;

/// Name a tool is offered to the model under.
///
/// Function names are limited to `[a-zA-Z0-9_-]{1,64}`, so the `skill:tool`
/// separator becomes `__` and any other character outside that set becomes
/// `_`. The mapping is lossy; [`ToolRegistry`](crate::tools::ToolRegistry)
/// keeps the reverse index.
pub fn function_name(tool_name: &str) -> String {
    let mut name = String::with_capacity(tool_name.len() + 1);
    for c in tool_name.chars() {
        match c {
            ':' => name.push_str("__"),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => name.push(c),
            _ => name.push('_'),
        }
    }
    name.truncate(MAX_FUNCTION_NAME_LEN);
    name
}

fn function_kind() -> String {
    "function".to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assistant_reply_with_null_content() {
        let message: ChatMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": { "name": "fs:list", "arguments": "{\"path\":\"/tmp\"}" }
            }]
        }))
        .unwrap();

        assert_eq!(message.content, "");
        assert!(message.has_tool_calls());
        assert_eq!(message.tool_calls[0].function.name, "fs:list");
    }

    #[test]
    fn test_tool_result_serialization() {
        let message = ChatMessage::tool_result("call_1", "done");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_1");
        assert!(value.get("tool_calls").is_none());
    }

    #[test]
    fn test_definition_from_descriptor() {
        let descriptor = ToolDescriptor::new("fs:read", "Read a file", json!({ "type": "object" }));
        let definition = ToolDefinition::from(&descriptor);
        let value = serde_json::to_value(definition).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "fs__read");
        assert_eq!(value["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_function_names() {
        assert_eq!(function_name("fs:exec"), "fs__exec");
        assert_eq!(function_name("web-search"), "web-search");
        assert_eq!(function_name("git hub.v2:pr/list"), "git_hub_v2__pr_list");
        assert_eq!(function_name("ünï:x"), "_n___x");

        let long = function_name(&format!("server:{}", "a".repeat(100)));
        assert_eq!(long.len(), MAX_FUNCTION_NAME_LEN);
        assert!(long.starts_with("server__aaa"));
    }
}
