//! Shared fixtures: an in-process tool server and a scripted model

#![allow(dead_code)]

use agentgate_core::llm::{ChatCompletion, ChatModel, CompletionRequest};
use agentgate_core::{McpClient, McpClientOptions, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Frame the fake server sends, after `delay`
pub struct Frame {
    pub delay: Duration,
    pub message: Value,
}

impl Frame {
    pub fn now(message: Value) -> Self {
        Self::after(Duration::ZERO, message)
    }

    pub fn after(delay: Duration, message: Value) -> Self {
        Self { delay, message }
    }
}

/// Client wired to a fake server; `handler` maps each received message to
/// the frames sent back. Delayed frames are written independently, so
/// replies can overtake each other.
pub fn fake_client<F>(options: McpClientOptions, handler: F) -> McpClient
where
    F: Fn(&Value) -> Vec<Frame> + Send + Sync + 'static,
{
    let (client_io, server_io) = duplex(256 * 1024);
    let (reader, writer) = tokio::io::split(client_io);
    let client = McpClient::from_streams("fake", reader, writer, options);

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Value>();
    let (read_half, mut write_half) = tokio::io::split(server_io);

    tokio::spawn(async move {
        while let Some(message) = frame_rx.recv().await {
            let mut line = serde_json::to_vec(&message).unwrap();
            line.push(b'\n');
            if write_half.write_all(&line).await.is_err() {
                break;
            }
        }
    });

    let handler = Arc::new(handler);
    tokio::spawn(async move {
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let message: Value = serde_json::from_str(&line).unwrap();
            for frame in handler(&message) {
                let frame_tx = frame_tx.clone();
                if frame.delay.is_zero() {
                    let _ = frame_tx.send(frame.message);
                } else {
                    tokio::spawn(async move {
                        tokio::time::sleep(frame.delay).await;
                        let _ = frame_tx.send(frame.message);
                    });
                }
            }
        }
    });

    client
}

pub fn result(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

/// Handshake and listing replies shared by every fake server
pub fn standard_reply(message: &Value) -> Option<Value> {
    let id = message.get("id")?;
    match message["method"].as_str()? {
        "initialize" => Some(result(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "serverInfo": { "name": "fake", "version": "1.2.3" },
                "capabilities": { "tools": {} }
            }),
        )),
        "tools/list" => Some(result(
            id,
            json!({
                "tools": [
                    {
                        "name": "echo",
                        "description": "Echo text back",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "text": { "type": "string" } },
                            "required": ["text"]
                        }
                    },
                    {
                        "name": "mixed",
                        "description": "Returns an image and a caption",
                        "inputSchema": { "type": "object" }
                    }
                ]
            }),
        )),
        _ => None,
    }
}

/// Text of a `tools/call` for `echo`, if that is what `message` is
pub fn echo_text(message: &Value) -> Option<String> {
    if message["method"] != "tools/call" || message["params"]["name"] != "echo" {
        return None;
    }
    Some(message["params"]["arguments"]["text"].as_str()?.to_string())
}

pub fn text_content(id: &Value, parts: &[&str]) -> Value {
    let content: Vec<Value> = parts
        .iter()
        .map(|text| json!({ "type": "text", "text": text }))
        .collect();
    result(id, json!({ "content": content }))
}

/// Echo server: `echo` answers with its text, `mixed` with an image plus a caption
pub fn echo_server(message: &Value) -> Vec<Frame> {
    if let Some(reply) = standard_reply(message) {
        return vec![Frame::now(reply)];
    }
    let Some(id) = message.get("id") else {
        return Vec::new();
    };
    if let Some(text) = echo_text(message) {
        return vec![Frame::now(text_content(id, &[&text]))];
    }
    if message["params"]["name"] == "mixed" {
        return vec![Frame::now(result(
            id,
            json!({
                "content": [
                    { "type": "image", "data": "iVBORw0KGgo=", "mimeType": "image/png" },
                    { "type": "text", "text": "a caption" }
                ]
            }),
        ))];
    }
    vec![Frame::now(json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": -32601, "message": "Method not found" }
    }))]
}

/// Model that replays canned completions and records every request
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<ChatCompletion>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ChatCompletion>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<ChatCompletion> {
        self.requests.lock().push(request);
        Ok(self
            .replies
            .lock()
            .pop_front()
            .expect("scripted model ran out of replies"))
    }
}
