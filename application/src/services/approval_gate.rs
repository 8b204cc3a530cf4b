//! Approval gate: suspend a tool call until an external actor decides.
//!
//! Pending requests live in a table keyed by call id. Each entry owns the
//! sending half of a `oneshot` channel; the suspended tool call awaits the
//! receiving half. Resolution removes the entry, so a second resolve for the
//! same call is rejected.
//!
//! Only the waiting call is suspended. Other tool calls in the same step and
//! other agents keep running.

use relay_domain::{ApprovalDecision, ApprovalRequest};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("Approval already pending for call {0}")]
    AlreadyPending(String),

    #[error("No pending approval for call {0}")]
    NotPending(String),

    #[error("Approval for call {0} was cancelled")]
    Cancelled(String),
}

struct PendingApproval {
    request: ApprovalRequest,
    sender: oneshot::Sender<ApprovalDecision>,
}

/// Table of approval requests awaiting a decision.
#[derive(Default)]
pub struct ApprovalGate {
    pending: Mutex<HashMap<String, PendingApproval>>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, PendingApproval>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `request` into the pending table.
    ///
    /// The entry is resolvable as soon as this returns, so callers register
    /// before announcing the request to anyone who might resolve it.
    /// Dropping the returned waiter removes the entry.
    pub fn register(&self, request: ApprovalRequest) -> Result<ApprovalWaiter<'_>, ApprovalError> {
        let call_id = request.call_id.clone();
        let mut table = self.table();
        if table.contains_key(&call_id) {
            return Err(ApprovalError::AlreadyPending(call_id));
        }
        let (sender, receiver) = oneshot::channel();
        table.insert(call_id.clone(), PendingApproval { request, sender });
        debug!(call_id = %call_id, "Approval registered");
        Ok(ApprovalWaiter {
            gate: self,
            call_id,
            receiver,
            settled: false,
        })
    }

    /// Register `request` and wait for its decision.
    ///
    /// If the entry is cancelled (see [`cancel_owner`](Self::cancel_owner))
    /// the wait ends with [`ApprovalError::Cancelled`].
    pub async fn wait_for_approval(
        &self,
        request: ApprovalRequest,
    ) -> Result<ApprovalDecision, ApprovalError> {
        self.register(request)?.wait().await
    }

    /// Settle a pending request. Each request can be resolved exactly once.
    pub fn resolve(&self, call_id: &str, decision: ApprovalDecision) -> Result<(), ApprovalError> {
        let entry = self
            .table()
            .remove(call_id)
            .ok_or_else(|| ApprovalError::NotPending(call_id.to_string()))?;
        info!(
            call_id = %call_id,
            tool = %entry.request.tool_name,
            approved = decision.is_approved(),
            "Approval resolved"
        );
        entry
            .sender
            .send(decision)
            .map_err(|_| ApprovalError::NotPending(call_id.to_string()))
    }

    /// Orphan every pending request owned by `owner_id`.
    ///
    /// Their waiters observe [`ApprovalError::Cancelled`]. Returns the
    /// number of requests removed.
    pub fn cancel_owner(&self, owner_id: &str) -> usize {
        let mut table = self.table();
        let before = table.len();
        table.retain(|_, pending| pending.request.owner_id != owner_id);
        let removed = before - table.len();
        if removed > 0 {
            info!(owner_id = %owner_id, count = removed, "Cancelled pending approvals");
        }
        removed
    }

    pub fn is_pending(&self, call_id: &str) -> bool {
        self.table().contains_key(call_id)
    }

    /// Snapshot of all pending requests.
    pub fn pending_requests(&self) -> Vec<ApprovalRequest> {
        self.table()
            .values()
            .map(|pending| pending.request.clone())
            .collect()
    }
}

/// Receiving side of a registered approval.
///
/// Dropped before a decision arrives, it removes its pending entry.
pub struct ApprovalWaiter<'a> {
    gate: &'a ApprovalGate,
    call_id: String,
    receiver: oneshot::Receiver<ApprovalDecision>,
    settled: bool,
}

impl ApprovalWaiter<'_> {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub async fn wait(mut self) -> Result<ApprovalDecision, ApprovalError> {
        debug!(call_id = %self.call_id, "Waiting for approval");
        let result = (&mut self.receiver).await;
        self.settled = true;
        result.map_err(|_| ApprovalError::Cancelled(self.call_id.clone()))
    }
}

impl Drop for ApprovalWaiter<'_> {
    fn drop(&mut self) {
        if !self.settled && self.gate.table().remove(&self.call_id).is_some() {
            debug!(call_id = %self.call_id, "Abandoned approval removed");
        }
    }
}
