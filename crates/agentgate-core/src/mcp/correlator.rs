//! Request/response correlation
//!
//! Every outgoing request gets a fresh numeric id and a single-slot delivery
//! channel. The read side hands each response to [`Correlator::dispatch`],
//! which wakes exactly the caller that owns the id. Responses for ids that
//! are unknown (already timed out, cancelled, duplicated or unsolicited) are
//! dropped.

use super::transport::Transport;
use crate::error::{Error, McpError, Result};
use crate::types::{JsonRpcRequest, JsonRpcResponse};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Id counter and waiters, guarded together so allocation and registration
/// happen atomically.
#[derive(Debug)]
struct PendingTable {
    next_id: u64,
    waiters: HashMap<u64, oneshot::Sender<JsonRpcResponse>>,
    closed: bool,
}

impl PendingTable {
    fn new() -> Self {
        Self {
            next_id: 1,
            waiters: HashMap::new(),
            closed: false,
        }
    }
}

/// Pending-request table bound to one transport
pub struct Correlator {
    transport: Arc<Transport>,
    table: Arc<Mutex<PendingTable>>,
}

impl Correlator {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            transport,
            table: Arc::new(Mutex::new(PendingTable::new())),
        }
    }

    /// Number of requests still awaiting a response
    pub fn pending_count(&self) -> usize {
        self.table.lock().waiters.len()
    }

    pub fn is_closed(&self) -> bool {
        self.table.lock().closed
    }

    /// Allocate the next id and register its waiter
    fn register(&self, method: &str) -> Result<PendingRequest> {
        let (tx, rx) = oneshot::channel();
        let mut table = self.table.lock();
        if table.closed {
            return Err(McpError::ConnectionClosed.into());
        }

        let id = table.next_id;
        table.next_id += 1;
        table.waiters.insert(id, tx);

        Ok(PendingRequest {
            id,
            method: method.to_string(),
            rx,
            table: self.table.clone(),
        })
    }

    /// Send a request and return the handle its caller awaits.
    ///
    /// The waiter is registered before the frame is written, so a response
    /// can never beat its own registration. If the write fails the handle is
    /// dropped, which removes the entry again.
    pub async fn send(&self, method: &str, params: Option<Value>) -> Result<PendingRequest> {
        let pending = self.register(method)?;
        let request = JsonRpcRequest::new(pending.id, method, params);

        trace!("Sending request {} ({})", pending.id, method);
        self.transport.send(&request).await?;
        Ok(pending)
    }

    /// Send a notification (no id, no response)
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if self.is_closed() {
            return Err(McpError::ConnectionClosed.into());
        }
        self.transport
            .send(&JsonRpcRequest::notification(method, params))
            .await
    }

    /// Deliver a response to the waiter that owns its id.
    ///
    /// Returns `false` when no live waiter matched.
    pub fn dispatch(&self, response: JsonRpcResponse) -> bool {
        let Some(id) = response.numeric_id() else {
            debug!("Dropping response without a numeric id: {:?}", response.id);
            return false;
        };

        let waiter = self.table.lock().waiters.remove(&id);
        match waiter {
            Some(tx) => {
                if tx.send(response).is_err() {
                    // Caller gave up between removal and delivery.
                    debug!("Waiter for request {} already abandoned", id);
                    return false;
                }
                true
            }
            None => {
                debug!("Dropping response for unknown or expired request {}", id);
                false
            }
        }
    }

    /// Refuse new requests and release every waiter with `ConnectionClosed`
    pub fn close(&self) {
        let mut table = self.table.lock();
        if table.closed {
            return;
        }
        table.closed = true;
        let abandoned = table.waiters.len();
        // Dropping the senders wakes each receiver with a closed-channel error.
        table.waiters.clear();
        debug!("Correlator closed ({} pending requests released)", abandoned);
    }
}

/// Handle for one in-flight request
///
/// Dropping the handle unregisters its id, so a response that arrives after a
/// timeout or cancellation finds no waiter and is discarded.
#[derive(Debug)]
pub struct PendingRequest {
    id: u64,
    method: String,
    rx: oneshot::Receiver<JsonRpcResponse>,
    table: Arc<Mutex<PendingTable>>,
}

impl PendingRequest {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Wait for the response or the deadline
    pub async fn wait(self, timeout: Duration) -> Result<Value> {
        self.wait_with_cancel(timeout, &CancellationToken::new()).await
    }

    /// Wait for the response, the deadline, or the cancel signal, whichever
    /// comes first. An RPC error response becomes `McpError::Rpc`.
    pub async fn wait_with_cancel(
        mut self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        tokio::select! {
            biased;
            response = &mut self.rx => match response {
                Ok(response) => response.into_result().map_err(Error::from),
                Err(_) => Err(McpError::ConnectionClosed.into()),
            },
            () = cancel.cancelled() => {
                debug!("Request {} ({}) cancelled", self.id, self.method);
                Err(McpError::Cancelled {
                    method: self.method.clone(),
                    id: self.id,
                }
                .into())
            }
            () = tokio::time::sleep(timeout) => {
                debug!("Request {} ({}) timed out after {:?}", self.id, self.method, timeout);
                Err(McpError::Timeout {
                    method: self.method.clone(),
                    id: self.id,
                    after: timeout,
                }
                .into())
            }
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        self.table.lock().waiters.remove(&self.id);
    }
}
