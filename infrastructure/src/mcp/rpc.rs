//! Newline-delimited JSON-RPC peer.
//!
//! [`RpcPeer`] owns the write half of a byte stream and spawns a single
//! background reader task that owns the read half. Requests register a
//! `oneshot` sender under their id; the reader fulfils it when the matching
//! response arrives. When the reader ends (EOF or I/O error) every pending
//! sender is dropped, so waiters observe [`McpClientError::TransportClosed`].

use super::error::{McpClientError, Result};
use super::protocol::{
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, JsonRpcResponseOut, MessageKind,
    classify_message,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Default time to wait for a single response.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;
type Writer = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

pub struct RpcPeer {
    label: String,
    writer: Writer,
    pending: Pending,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    reader_handle: JoinHandle<()>,
    request_timeout: Duration,
}

impl RpcPeer {
    /// Start the reader task over `reader` and keep `writer` for requests.
    pub fn new<R, W>(label: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let label = label.into();
        let writer: Writer = Arc::new(Mutex::new(Box::new(writer)));
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let reader_handle = tokio::spawn(Self::reader_loop(
            label.clone(),
            BufReader::new(reader),
            Arc::clone(&pending),
            Arc::clone(&closed),
            Arc::clone(&writer),
        ));

        Self {
            label,
            writer,
            pending,
            closed,
            next_id: AtomicU64::new(1),
            reader_handle,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Whether the background reader is still running.
    pub fn is_reader_alive(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && !self.reader_handle.is_finished()
    }

    /// Send a request and wait for the correlated response's `result`.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method, params);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock().await;
            // Checked under the lock: the reader sets it before draining.
            if self.closed.load(Ordering::SeqCst) {
                return Err(McpClientError::TransportClosed);
            }
            pending.insert(id, tx);
        }

        if let Err(e) = Self::write_frame(&self.writer, &request).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(McpClientError::TransportClosed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(McpClientError::Timeout(method.to_string()));
            }
        };

        if let Some(error) = response.error {
            return Err(McpClientError::RpcError {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<serde_json::Value>) -> Result<()> {
        Self::write_frame(&self.writer, &JsonRpcNotification::new(method, params)).await
    }

    /// Stop the reader task and refuse further requests.
    pub async fn shutdown(&self) {
        self.reader_handle.abort();
        let mut pending = self.pending.lock().await;
        self.closed.store(true, Ordering::SeqCst);
        pending.clear();
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    async fn write_frame(writer: &Writer, message: &impl Serialize) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        trace!("RPC sending: {}", line);
        line.push('\n');

        let mut w = writer.lock().await;
        w.write_all(line.as_bytes()).await?;
        w.flush().await?;
        Ok(())
    }

    async fn reader_loop<R>(
        label: String,
        mut reader: BufReader<R>,
        pending: Pending,
        closed: Arc<AtomicBool>,
        writer: Writer,
    ) where
        R: AsyncRead + Send + Unpin,
    {
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    debug!(server = %label, "RPC reader: transport closed");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(server = %label, "RPC reader: read error: {}", e);
                    break;
                }
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            trace!("RPC received: {}", trimmed);

            let value: serde_json::Value = match serde_json::from_str(trimmed) {
                Ok(v) => v,
                Err(e) => {
                    // Servers sometimes print log lines to stdout
                    debug!(server = %label, "RPC reader: skipping non-JSON line: {}", e);
                    continue;
                }
            };

            match classify_message(&value) {
                MessageKind::Response => {
                    let response: JsonRpcResponse = match serde_json::from_value(value) {
                        Ok(r) => r,
                        Err(e) => {
                            warn!(server = %label, "RPC reader: malformed response: {}", e);
                            continue;
                        }
                    };
                    let Some(id) = response.id else { continue };
                    let sender = pending.lock().await.remove(&id);
                    match sender {
                        Some(tx) => {
                            let _ = tx.send(response);
                        }
                        None => debug!(server = %label, "RPC reader: no waiter for id={}", id),
                    }
                }
                MessageKind::IncomingRequest { id } => {
                    let method = value
                        .get("method")
                        .and_then(|m| m.as_str())
                        .unwrap_or_default();
                    let reply = if method == "ping" {
                        JsonRpcResponseOut::result(id, serde_json::json!({}))
                    } else {
                        debug!(server = %label, method, "RPC reader: rejecting server request");
                        JsonRpcResponseOut::method_not_found(id, method)
                    };
                    if let Err(e) = Self::write_frame(&writer, &reply).await {
                        warn!(server = %label, "RPC reader: failed to answer request: {}", e);
                    }
                }
                MessageKind::Notification => {
                    trace!(server = %label, "RPC reader: notification ignored");
                }
            }
        }

        let mut pending = pending.lock().await;
        closed.store(true, Ordering::SeqCst);
        pending.clear();
    }
}

impl Drop for RpcPeer {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}
