//! In-process fake tool server for unit tests

use super::McpClient;
use crate::types::McpClientOptions;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader};

pub type Seen = Arc<Mutex<Vec<Value>>>;

/// Wire a client to an in-process fake server driven by `handler`
pub fn scripted_client<F>(handler: F) -> (McpClient, Seen)
where
    F: Fn(&Value) -> Option<Value> + Send + 'static,
{
    let (client_io, server_io) = duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(client_io);
    let client = McpClient::from_streams("fake", reader, writer, McpClientOptions::default());

    let seen = Seen::default();
    let log = Arc::clone(&seen);
    tokio::spawn(async move {
        let (read_half, mut write_half) = tokio::io::split(server_io);
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let value: Value = serde_json::from_str(&line).unwrap();
            log.lock().push(value.clone());
            if let Some(reply) = handler(&value) {
                let mut frame = serde_json::to_vec(&reply).unwrap();
                frame.push(b'\n');
                if write_half.write_all(&frame).await.is_err() {
                    break;
                }
            }
        }
    });

    (client, seen)
}

pub fn echo_server(message: &Value) -> Option<Value> {
    let id = message.get("id")?.clone();
    let result = match message.get("method")?.as_str()? {
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": { "name": "fake", "version": "0.1.0" },
            "capabilities": { "tools": {} }
        }),
        "tools/list" => json!({
            "tools": [{
                "name": "echo",
                "description": "Echo text back",
                "inputSchema": {
                    "type": "object",
                    "properties": { "text": { "type": "string" } },
                    "required": ["text"]
                }
            }]
        }),
        "tools/call" => {
            let text = message["params"]["arguments"]["text"].as_str().unwrap_or("");
            json!({
                "content": [
                    { "type": "text", "text": text },
                    { "type": "image", "data": "", "mimeType": "image/png" },
                    { "type": "text", "text": "done" }
                ],
                "isError": text == "fail"
            })
        }
        _ => {
            return Some(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": "Method not found" }
            }))
        }
    };
    Some(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}
