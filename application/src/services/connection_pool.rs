//! Connection pool for remote tool servers.
//!
//! Owned by one agent-execution instance. Connections are cached by
//! [`ConnectionCacheKey`]; concurrent [`acquire`](ConnectionPool::acquire)
//! calls for the same key share a single in-flight connection attempt.
//!
//! # Lifecycle of a key
//!
//! ```text
//! (none) ──acquire──▶ Locked (shared connect future)
//!                        ├── success ──▶ Cached ──dead on reuse──▶ (none)
//!                        └── failure ──▶ (none)          ── retry on next acquire
//! ```
//!
//! The cache and the lock map live behind one mutex so the check-then-insert
//! of a lock is atomic. The mutex is never held across a connect or close.

use crate::ports::tool_server::{ConnectionError, ToolServerConnection, ToolServerConnector};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use relay_domain::{ConnectionCacheKey, ConnectionScope, RemoteToolConfig};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type ConnectResult = Result<Arc<dyn ToolServerConnection>, ConnectionError>;
type ConnectFuture = Shared<BoxFuture<'static, ConnectResult>>;

#[derive(Default)]
struct PoolState {
    cache: HashMap<ConnectionCacheKey, Arc<dyn ToolServerConnection>>,
    locks: HashMap<ConnectionCacheKey, ConnectFuture>,
    /// Bumped by teardown; attempts started before it must not repopulate the cache.
    epoch: u64,
}

/// Outcome of [`ConnectionPool::teardown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownSummary {
    pub closed: usize,
    pub failed: usize,
}

/// Pooled, deduplicated connections to remote tool servers.
pub struct ConnectionPool {
    connector: Arc<dyn ToolServerConnector>,
    scope: ConnectionScope,
    state: Arc<Mutex<PoolState>>,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn ToolServerConnector>, scope: ConnectionScope) -> Self {
        Self {
            connector,
            scope,
            state: Arc::new(Mutex::new(PoolState::default())),
        }
    }

    pub fn scope(&self) -> &ConnectionScope {
        &self.scope
    }

    pub fn cache_key(
        &self,
        tool: &RemoteToolConfig,
        forwarded_headers: &BTreeMap<String, String>,
    ) -> ConnectionCacheKey {
        ConnectionCacheKey::new(
            &self.scope,
            &tool.tool_id,
            tool.credential_ref.as_deref(),
            forwarded_headers,
        )
    }

    /// Return a live connection for `tool`, connecting at most once per key
    /// at any time.
    pub async fn acquire(
        &self,
        tool: &RemoteToolConfig,
        forwarded_headers: &BTreeMap<String, String>,
    ) -> ConnectResult {
        let key = self.cache_key(tool, forwarded_headers);

        let cached = self.state.lock().await.cache.get(&key).cloned();
        if let Some(conn) = cached {
            if conn.is_alive().await {
                debug!(tool_id = %tool.tool_id, "Reusing pooled connection");
                return Ok(conn);
            }
            warn!(tool_id = %tool.tool_id, "Pooled connection is dead, replacing");
            let mut state = self.state.lock().await;
            if state
                .cache
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &conn))
            {
                state.cache.remove(&key);
            }
        }

        let attempt = {
            let mut state = self.state.lock().await;
            if let Some(conn) = state.cache.get(&key) {
                // Another caller reconnected while we checked liveness.
                return Ok(Arc::clone(conn));
            }
            match state.locks.get(&key) {
                Some(in_flight) => {
                    debug!(tool_id = %tool.tool_id, "Awaiting in-flight connection attempt");
                    in_flight.clone()
                }
                None => {
                    let attempt = self.connect_attempt(key.clone(), tool, forwarded_headers, state.epoch);
                    state.locks.insert(key.clone(), attempt.clone());
                    attempt
                }
            }
        };

        attempt.await
    }

    /// Build the shared future for one connection attempt.
    ///
    /// The future itself moves the result into the cache and removes the
    /// lock, so the bookkeeping happens even if the caller that started the
    /// attempt is dropped while others still wait on it.
    fn connect_attempt(
        &self,
        key: ConnectionCacheKey,
        tool: &RemoteToolConfig,
        forwarded_headers: &BTreeMap<String, String>,
        epoch: u64,
    ) -> ConnectFuture {
        let connector = Arc::clone(&self.connector);
        let state = Arc::clone(&self.state);
        let server = tool.server.clone();
        let headers = forwarded_headers.clone();
        let tool_id = tool.tool_id.clone();

        async move {
            info!(tool_id = %tool_id, server = %server.server_id(), "Connecting to tool server");
            let result = connector.connect(&server, &headers).await;

            let stale = {
                let mut state = state.lock().await;
                if state.epoch == epoch {
                    state.locks.remove(&key);
                    if let Ok(conn) = &result {
                        state.cache.insert(key, Arc::clone(conn));
                    }
                    false
                } else {
                    true
                }
            };

            match &result {
                Ok(conn) if stale => {
                    debug!(tool_id = %tool_id, "Pool was torn down during connect, closing");
                    if let Err(e) = conn.close().await {
                        warn!(tool_id = %tool_id, error = %e, "Failed to close stale connection");
                    }
                }
                Ok(_) => debug!(tool_id = %tool_id, "Tool server connected"),
                Err(e) => warn!(tool_id = %tool_id, error = %e, "Tool server connection failed"),
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Close every cached connection and clear the pool.
    ///
    /// One connection's close failure is logged and does not stop the
    /// others. The cache and lock maps are empty afterwards regardless.
    pub async fn teardown(&self) -> TeardownSummary {
        let (connections, residual_locks) = {
            let mut state = self.state.lock().await;
            state.epoch += 1;
            let connections: Vec<_> = state.cache.drain().collect();
            let residual_locks = state.locks.len();
            state.locks.clear();
            (connections, residual_locks)
        };

        if residual_locks > 0 {
            debug!(count = residual_locks, "Dropped in-flight connection attempts");
        }

        let results = join_all(connections.iter().map(|(key, conn)| async move {
            (key, conn.server_id().to_string(), conn.close().await)
        }))
        .await;

        let mut summary = TeardownSummary::default();
        for (key, server_id, result) in results {
            match result {
                Ok(()) => summary.closed += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(key = %key, server = %server_id, error = %e, "Failed to close tool server connection");
                }
            }
        }
        info!(closed = summary.closed, failed = summary.failed, "Connection pool torn down");
        summary
    }

    /// Number of cached connections.
    pub async fn cached_count(&self) -> usize {
        self.state.lock().await.cache.len()
    }

    /// Number of in-flight connection attempts.
    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.locks.len()
    }
}
