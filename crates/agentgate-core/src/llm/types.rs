//! Chat-completions request/response bodies

use crate::error::ModelError;
use crate::types::{ChatMessage, ToolDefinition};
use serde::{Deserialize, Serialize};

/// One completion request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Omitted from the body when empty, which disables tool calling
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// Completion response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl ChatCompletion {
    /// Single-choice completion wrapping `message`
    pub fn from_message(message: ChatMessage) -> Self {
        Self {
            id: None,
            choices: vec![Choice {
                message,
                finish_reason: None,
            }],
            usage: None,
        }
    }

    /// The first choice's message
    pub fn into_message(self) -> Result<ChatMessage, ModelError> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(ModelError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ToolDefinition, ToolDescriptor};
    use serde_json::json;

    #[test]
    fn test_tools_omitted_when_empty() {
        let request = CompletionRequest::new("gpt-4o-mini", vec![ChatMessage::user("hi")]);
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("tools").is_none());
        assert_eq!(body["messages"][0], json!({ "role": "user", "content": "hi" }));

        let descriptor = ToolDescriptor::new("fs:list", "List", json!({ "type": "object" }));
        let body = serde_json::to_value(
            request.with_tools(vec![ToolDefinition::from(&descriptor)]),
        )
        .unwrap();
        assert_eq!(body["tools"][0]["function"]["name"], "fs__list");
    }

    #[test]
    fn test_parse_tool_call_completion() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_a",
                        "type": "function",
                        "function": { "name": "fs:read", "arguments": "{\"path\":\"a\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        }))
        .unwrap();

        assert_eq!(completion.usage.unwrap().total_tokens, 15);
        let message = completion.into_message().unwrap();
        assert_eq!(message.tool_calls[0].id, "call_a");
    }

    #[test]
    fn test_empty_choices() {
        let completion: ChatCompletion = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(matches!(completion.into_message(), Err(ModelError::EmptyResponse)));
    }
}
