//! Newline-delimited JSON-RPC transport over a child process's stdin/stdout

use crate::error::{McpError, Result};
use crate::types::McpServerConfig;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Frames above this size are dropped without being parsed
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

const CHANNEL_CAPACITY: usize = 100;

/// One encoded message plus the slot the writer task reports the write outcome to
type Outbound = (String, oneshot::Sender<std::io::Result<()>>);

/// Transport layer for tool-server communication
///
/// All writes go through a single writer task, so concurrent senders never
/// interleave partial frames. Inbound lines are decoded into JSON values by a
/// reader task and delivered on the channel returned at construction.
pub struct Transport {
    /// Tool server name, used in logs
    label: String,
    /// Channel to the stdin writer task
    outbound_tx: mpsc::Sender<Outbound>,
    /// Stops the background tasks
    cancel: CancellationToken,
    /// Background tasks (writer, reader, stderr drain)
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Transport {
    /// Spawn a tool-server process and wire a transport to its stdio
    pub fn spawn(config: &McpServerConfig) -> Result<(Self, mpsc::Receiver<Value>, Child)> {
        debug!(
            "Spawning tool server '{}': {} {:?} (cwd: {:?})",
            config.name, config.command, config.args, config.cwd
        );

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &config.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| McpError::Spawn {
            command: config.command.clone(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stderr".to_string()))?;

        let (transport, inbound_rx) = Self::from_streams(config.name.clone(), stdout, stdin);

        // Drain stderr so the server can't stall on a full pipe.
        let stderr_task = tokio::spawn(Self::drain_stderr_task(
            transport.label.clone(),
            stderr,
            transport.cancel.clone(),
        ));
        transport.tasks.lock().push(stderr_task);

        Ok((transport, inbound_rx, child))
    }

    /// Wire a transport over arbitrary byte streams
    pub fn from_streams<R, W>(
        label: impl Into<String>,
        reader: R,
        writer: W,
    ) -> (Self, mpsc::Receiver<Value>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let label = label.into();
        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::channel::<Outbound>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<Value>(CHANNEL_CAPACITY);

        let writer_task = tokio::spawn(Self::write_task(
            label.clone(),
            writer,
            outbound_rx,
            cancel.clone(),
        ));
        let reader_task = tokio::spawn(Self::read_task(
            label.clone(),
            reader,
            inbound_tx,
            cancel.clone(),
        ));

        (
            Self {
                label,
                outbound_tx,
                cancel,
                tasks: Mutex::new(vec![writer_task, reader_task]),
            },
            inbound_rx,
        )
    }

    /// Encode one message and write it as a single line.
    ///
    /// Resolves once the frame has been flushed; a broken pipe is reported to
    /// the caller that issued the write.
    pub async fn send<T: Serialize>(&self, message: &T) -> Result<()> {
        let json = serde_json::to_string(message)?;
        let (ack_tx, ack_rx) = oneshot::channel();

        self.outbound_tx
            .send((json, ack_tx))
            .await
            .map_err(|_| McpError::ConnectionClosed)?;

        ack_rx
            .await
            .map_err(|_| McpError::ConnectionClosed)?
            .map_err(|e| McpError::Transport(format!("Failed to write to '{}': {}", self.label, e)))?;

        Ok(())
    }

    /// Stop the background tasks and wait for them to finish
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in &tasks {
            task.abort();
        }
        for result in join_all(tasks).await {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    warn!(server = %self.label, "Transport task failed: {}", e);
                }
            }
        }
        debug!(server = %self.label, "Transport shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Background task to write to stdin
    async fn write_task<W>(
        label: String,
        writer: W,
        mut rx: mpsc::Receiver<Outbound>,
        cancel: CancellationToken,
    ) where
        W: AsyncWrite + Unpin,
    {
        let mut writer = BufWriter::new(writer);

        loop {
            let (line, ack) = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(outbound) => outbound,
                    None => break,
                },
            };

            trace!(server = %label, "Sending: {}", line);
            let result = Self::write_frame(&mut writer, &line).await;
            let failed = result.is_err();
            if let Err(e) = &result {
                error!(server = %label, "Failed to write to tool server: {}", e);
            }
            let _ = ack.send(result);

            // A failed pipe is fatal to the connection.
            if failed {
                break;
            }
        }
        debug!(server = %label, "Writer task ended");
    }

    async fn write_frame<W>(writer: &mut W, line: &str) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(b'\n');
        writer.write_all(&frame).await?;
        writer.flush().await
    }

    /// Background task to read stdout lines
    async fn read_task<R>(
        label: String,
        reader: R,
        tx: mpsc::Sender<Value>,
        cancel: CancellationToken,
    ) where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => {
                    debug!(server = %label, "Tool server stdout closed");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(server = %label, "Error reading tool server stdout: {}", e);
                    break;
                }
            }

            let Some(value) = decode_frame(&label, &buf) else {
                continue;
            };

            if tx.send(value).await.is_err() {
                warn!(server = %label, "Inbound channel closed");
                break;
            }
        }
    }

    /// Background task to drain stderr.
    async fn drain_stderr_task(label: String, stderr: ChildStderr, cancel: CancellationToken) {
        let mut lines = BufReader::new(stderr).lines();

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                next = lines.next_line() => next,
            };

            match next {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        // Servers often log here; never fatal.
                        warn!(server = %label, "stderr: {}", trimmed);
                    }
                }
                Ok(None) => {
                    debug!(server = %label, "Tool server stderr closed");
                    break;
                }
                Err(e) => {
                    error!(server = %label, "Error reading tool server stderr: {}", e);
                    break;
                }
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

/// Decode one raw line into a JSON value.
///
/// Blank lines, oversized lines and lines that are not JSON yield `None`;
/// the drop is logged and never surfaced to callers.
pub(crate) fn decode_frame(label: &str, raw: &[u8]) -> Option<Value> {
    let line = raw.trim_ascii();
    if line.is_empty() {
        return None;
    }

    if line.len() > MAX_FRAME_BYTES {
        debug!(server = %label, "Dropping oversized frame ({} bytes)", line.len());
        return None;
    }

    match serde_json::from_slice::<Value>(line) {
        Ok(value) => Some(value),
        Err(e) => {
            let snippet = String::from_utf8_lossy(line).chars().take(300).collect::<String>();
            debug!(server = %label, "Dropping malformed frame ({}): {}", e, snippet);
            None
        }
    }
}
