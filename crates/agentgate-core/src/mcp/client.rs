//! Tool-server client
//!
//! Owns one child process, its transport, and the correlator for requests
//! issued over it. Lifecycle:
//!
//! ```text
//! Uninitialized ──spawn──▶ Initializing ──initialize──▶ Ready
//!        └──────────────────────┴────────────────────────┴──▶ Closed
//! ```

use super::correlator::Correlator;
use super::protocol::{ProtocolHandler, ServerMessage};
use super::transport::Transport;
use crate::error::{Error, McpError, Result};
use crate::types::{
    InitializeResult, JsonRpcResponse, McpClientOptions, McpServerConfig, ServerInfo,
    ToolCallResult, ToolDescriptor, METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_TOOLS_CALL,
    METHOD_TOOLS_LIST,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client for one tool server
pub struct McpClient {
    /// Server name, used in logs and for namespacing its tools
    name: String,
    options: McpClientOptions,
    transport: Arc<Transport>,
    correlator: Arc<Correlator>,
    /// Child process handle (absent when wired over plain streams)
    child: tokio::sync::Mutex<Option<Child>>,
    state: Arc<RwLock<ConnectionState>>,
    /// Result of the `initialize` handshake
    init_result: RwLock<Option<InitializeResult>>,
    /// Most recent `tools/list` snapshot
    tools: RwLock<Vec<ToolDescriptor>>,
    /// Inbound message processing task
    message_task: Mutex<Option<JoinHandle<()>>>,
}

impl McpClient {
    /// Spawn the server process and wire the transport.
    ///
    /// The client is left in `Initializing`; call [`McpClient::initialize`]
    /// (or use [`McpClient::connect`]) before issuing tool calls.
    pub fn spawn(config: &McpServerConfig, options: McpClientOptions) -> Result<Self> {
        info!("Starting tool server: {} ({})", config.name, config.command);
        let (transport, inbound_rx, child) = Transport::spawn(config)?;
        Ok(Self::wire(
            config.name.clone(),
            options,
            transport,
            inbound_rx,
            Some(child),
        ))
    }

    /// Wire a client over arbitrary byte streams (no child process)
    pub fn from_streams<R, W>(
        name: impl Into<String>,
        reader: R,
        writer: W,
        options: McpClientOptions,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let name = name.into();
        let (transport, inbound_rx) = Transport::from_streams(name.clone(), reader, writer);
        Self::wire(name, options, transport, inbound_rx, None)
    }

    /// Spawn and run the initialize handshake
    pub async fn connect(config: &McpServerConfig, options: McpClientOptions) -> Result<Self> {
        let client = Self::spawn(config, options)?;
        if let Err(e) = client.initialize().await {
            error!("Tool server '{}' failed to initialize: {}", config.name, e);
            client.close().await;
            return Err(e);
        }
        Ok(client)
    }

    fn wire(
        name: String,
        options: McpClientOptions,
        transport: Transport,
        inbound_rx: mpsc::Receiver<Value>,
        child: Option<Child>,
    ) -> Self {
        let transport = Arc::new(transport);
        let correlator = Arc::new(Correlator::new(Arc::clone(&transport)));
        let state = Arc::new(RwLock::new(ConnectionState::Uninitialized));

        // Transport is wired; the loop below may only ever move us to Closed.
        *state.write() = ConnectionState::Initializing;

        let message_task = tokio::spawn(Self::message_loop(
            name.clone(),
            inbound_rx,
            Arc::clone(&transport),
            Arc::clone(&correlator),
            Arc::clone(&state),
        ));

        Self {
            name,
            options,
            transport,
            correlator,
            child: tokio::sync::Mutex::new(child),
            state,
            init_result: RwLock::new(None),
            tools: RwLock::new(Vec::new()),
            message_task: Mutex::new(Some(message_task)),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Run the `initialize` handshake and move to `Ready`
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let current = self.state();
        if current != ConnectionState::Initializing {
            return Err(McpError::InvalidState {
                expected: ConnectionState::Initializing.as_str(),
                actual: current.as_str(),
            }
            .into());
        }

        info!("Initializing tool server '{}'", self.name);
        let params = ProtocolHandler::initialize_params(&self.options)?;
        let result = self.request(METHOD_INITIALIZE, Some(params)).await?;
        let init = ProtocolHandler::parse_initialize_result(result, &self.options.protocol_version)?;

        *self.init_result.write() = Some(init.clone());

        // Best effort: no response expected, failure leaves the state alone.
        if let Err(e) = self.correlator.notify(METHOD_INITIALIZED, None).await {
            warn!("Failed to send initialized notification to '{}': {}", self.name, e);
        }

        {
            let mut state = self.state.write();
            if *state == ConnectionState::Initializing {
                *state = ConnectionState::Ready;
            }
        }

        info!(
            "Tool server '{}' ready ({} v{})",
            self.name, init.server_info.name, init.server_info.version
        );
        Ok(init)
    }

    /// Terminate the server process and release every waiter.
    ///
    /// No shutdown handshake; in-flight requests resolve with
    /// `ConnectionClosed`. Safe to call more than once.
    pub async fn close(&self) {
        *self.state.write() = ConnectionState::Closed;
        self.correlator.close();

        if let Some(mut child) = self.child.lock().await.take() {
            match child.try_wait() {
                Ok(Some(status)) => debug!("Tool server '{}' already exited: {}", self.name, status),
                _ => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill tool server '{}': {}", self.name, e);
                    }
                }
            }
        }

        self.transport.shutdown().await;

        let task = self.message_task.lock().take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }

        info!("Tool server '{}' closed", self.name);
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Send a request and wait for its result (bounded by the request timeout)
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.call_with_cancel(method, params, &CancellationToken::new())
            .await
    }

    /// Send a request and wait for its result, the timeout, or `cancel`.
    ///
    /// Cancellation only stops the wait; the server may still finish the work
    /// and its late response is discarded.
    pub async fn call_with_cancel(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        if self.state() == ConnectionState::Closed {
            return Err(McpError::ConnectionClosed.into());
        }

        let pending = match self.correlator.send(method, params).await {
            Ok(pending) => pending,
            Err(e @ Error::Mcp(McpError::Transport(_) | McpError::ConnectionClosed)) => {
                // A broken pipe or a dead writer is fatal to this connection.
                error!("Tool server '{}' transport failed: {}", self.name, e);
                *self.state.write() = ConnectionState::Closed;
                self.correlator.close();
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        trace!("Awaiting {} (id {}) from '{}'", method, pending.id(), self.name);
        pending
            .wait_with_cancel(self.options.request_timeout, cancel)
            .await
    }

    /// List the server's tools and cache the snapshot
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let result = self.request(METHOD_TOOLS_LIST, None).await?;
        let tools = ProtocolHandler::parse_tool_list(result)?;
        *self.tools.write() = tools.clone();
        Ok(tools)
    }

    /// Invoke a tool and return the typed result
    pub async fn call_tool_raw(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        debug!("Calling tool '{}' on '{}'", name, self.name);
        let params = ProtocolHandler::tool_call_params(name, arguments)?;
        let result = self.request(METHOD_TOOLS_CALL, Some(params)).await?;
        ProtocolHandler::parse_tool_call_result(result)
    }

    /// Invoke a tool and return the concatenation of its text parts
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        Ok(self.call_tool_raw(name, arguments).await?.text())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn server_info(&self) -> Option<ServerInfo> {
        self.init_result
            .read()
            .as_ref()
            .map(|init| init.server_info.clone())
    }

    /// Protocol version the server answered with
    pub fn protocol_version(&self) -> Option<String> {
        self.init_result
            .read()
            .as_ref()
            .map(|init| init.protocol_version.clone())
    }

    pub fn instructions(&self) -> Option<String> {
        self.init_result
            .read()
            .as_ref()
            .and_then(|init| init.instructions.clone())
    }

    /// Snapshot from the last successful `list_tools`
    pub fn cached_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.read().clone()
    }

    pub fn pending_requests(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Message processing loop
    async fn message_loop(
        name: String,
        mut inbound_rx: mpsc::Receiver<Value>,
        transport: Arc<Transport>,
        correlator: Arc<Correlator>,
        state: Arc<RwLock<ConnectionState>>,
    ) {
        while let Some(value) = inbound_rx.recv().await {
            match ProtocolHandler::parse_message(&value) {
                Ok(ServerMessage::Response(response)) => {
                    correlator.dispatch(response);
                }
                Ok(ServerMessage::Notification(notification)) => {
                    debug!("Notification from '{}': {}", name, notification.method);
                }
                Ok(ServerMessage::Request(request)) => {
                    let id = request.id.clone().unwrap_or(Value::Null);
                    let response = match request.method.as_str() {
                        "ping" => JsonRpcResponse::success(id, json!({})),
                        _ => {
                            debug!("Rejecting server request '{}' from '{}'", request.method, name);
                            ProtocolHandler::method_not_found(&request)
                        }
                    };
                    if let Err(e) = transport.send(&response).await {
                        warn!("Failed to answer server request from '{}': {}", name, e);
                    }
                }
                Err(e) => {
                    debug!("Ignoring message from '{}': {}", name, e);
                }
            }
        }

        debug!("Tool server '{}' disconnected", name);
        *state.write() = ConnectionState::Closed;
        correlator.close();
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.correlator.close();
        if let Some(task) = self.message_task.lock().take() {
            task.abort();
        }
        // The child (if any) is killed on drop.
    }
}

impl fmt::Debug for McpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpClient")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
