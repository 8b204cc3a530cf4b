//! Tool invocation wrapper.
//!
//! [`wrap_tool`] decorates any invocable tool (pool-backed, sandboxed
//! function, transfer or delegation) with the same per-call behavior:
//!
//! ```text
//! resolve call id ─▶ span attributes ─▶ stream input (visible calls only)
//!        ─▶ [approval gate] ─▶ execute ─▶ persist result ─▶ stream output
//! ```
//!
//! Stream emission, session recording, history persistence and telemetry
//! are best-effort: their failures are logged and never change the result of
//! the tool call. Tool failures are unwrapped to their root cause, reported,
//! and returned to the caller unchanged.

use crate::ports::collaborator::{HistoryStore, NoHistory};
use crate::ports::session_recorder::{NoSessionRecorder, SessionRecorder};
use crate::ports::stream_sink::StreamSink;
use crate::ports::telemetry::{NoTelemetry, TelemetrySink, events};
use crate::services::approval_bus::{ApprovalBus, ApprovalBusEvent};
use crate::services::approval_gate::{ApprovalError, ApprovalGate};
use async_trait::async_trait;
use relay_domain::core::string::{chunk_chars, truncate};
use relay_domain::{
    ApprovalDecision, ApprovalMetadata, ApprovalRequest, InvocableTool, Message, SessionEvent,
    SessionEventKind, ToolCallContext, ToolCallOutcome, ToolCallRecord, ToolDefinition,
    ToolDenial, ToolEntry, ToolError, ToolKind, ToolPolicy, ToolStreamEvent, is_internal_tool,
};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{Instrument, debug, warn};

/// Output bytes shown in debug logs.
const OUTPUT_PREVIEW_BYTES: usize = 200;

/// Records of every wrapped call made during a turn.
#[derive(Clone, Default)]
pub struct ToolCallLog(Arc<Mutex<Vec<ToolCallRecord>>>);

impl ToolCallLog {
    pub fn push(&self, record: ToolCallRecord) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn snapshot(&self) -> Vec<ToolCallRecord> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Per-turn environment shared by every wrapped tool.
pub struct StreamContext {
    conversation_id: String,
    session_id: String,
    owner_id: String,
    /// Key on the approval bus when the turn has no direct user stream
    stream_id: Option<String>,
    sink: Option<Arc<dyn StreamSink>>,
    recorder: Arc<dyn SessionRecorder>,
    history: Arc<dyn HistoryStore>,
    telemetry: Arc<dyn TelemetrySink>,
    approvals: Arc<ApprovalGate>,
    approval_bus: Arc<ApprovalBus>,
    input_delta_chunk_chars: usize,
    records: ToolCallLog,
}

impl StreamContext {
    pub fn new(conversation_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let conversation_id = conversation_id.into();
        Self {
            session_id: conversation_id.clone(),
            conversation_id,
            owner_id: owner_id.into(),
            stream_id: None,
            sink: None,
            recorder: Arc::new(NoSessionRecorder),
            history: Arc::new(NoHistory),
            telemetry: Arc::new(NoTelemetry),
            approvals: Arc::new(ApprovalGate::new()),
            approval_bus: Arc::new(ApprovalBus::default()),
            input_delta_chunk_chars: 16,
            records: ToolCallLog::default(),
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_stream_id(mut self, stream_id: Option<String>) -> Self {
        self.stream_id = stream_id;
        self
    }

    /// Direct user stream. `None` for delegated agents.
    pub fn with_sink(mut self, sink: Option<Arc<dyn StreamSink>>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn SessionRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = history;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_approvals(mut self, gate: Arc<ApprovalGate>, bus: Arc<ApprovalBus>) -> Self {
        self.approvals = gate;
        self.approval_bus = bus;
        self
    }

    pub fn with_input_delta_chunk_chars(mut self, chars: usize) -> Self {
        self.input_delta_chunk_chars = chars;
        self
    }

    // ==================== Accessors ====================

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    pub fn records(&self) -> &ToolCallLog {
        &self.records
    }

    // ==================== Best-effort side effects ====================

    fn emit(&self, event: ToolStreamEvent) {
        if let Some(sink) = &self.sink
            && let Err(e) = sink.emit(event)
        {
            warn!(error = %e, "Failed to emit tool stream event");
        }
    }

    async fn record(&self, kind: SessionEventKind, payload: serde_json::Value) {
        let event = SessionEvent::new(&self.session_id, kind, &self.owner_id, payload);
        if let Err(e) = self.recorder.record_event(event).await {
            warn!(kind = %kind, error = %e, "Failed to record session event");
        }
    }
}

/// How a tool was registered for this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRegistration {
    pub kind: ToolKind,
    pub policy: ToolPolicy,
    /// Correlates calls with the originating tool/function/delegation registration
    pub relationship_id: String,
    /// Remote server identity, for pool-backed tools
    pub server_id: Option<String>,
}

impl ToolRegistration {
    pub fn new(kind: ToolKind, relationship_id: impl Into<String>) -> Self {
        Self {
            kind,
            policy: ToolPolicy::default(),
            relationship_id: relationship_id.into(),
            server_id: None,
        }
    }

    pub fn with_policy(mut self, policy: ToolPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }
}

/// Decorate `entry` with telemetry, streaming, history and approval.
///
/// Declarations have no executable entry point and are returned unchanged.
pub fn wrap_tool(
    entry: ToolEntry,
    context: &Arc<StreamContext>,
    registration: ToolRegistration,
) -> ToolEntry {
    match entry {
        ToolEntry::Declaration(_) => entry,
        ToolEntry::Invocable(inner) => ToolEntry::Invocable(Arc::new(WrappedTool {
            inner,
            context: Arc::clone(context),
            registration,
        })),
    }
}

fn new_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

struct WrappedTool {
    inner: Arc<dyn InvocableTool>,
    context: Arc<StreamContext>,
    registration: ToolRegistration,
}

#[async_trait]
impl InvocableTool for WrappedTool {
    fn definition(&self) -> &ToolDefinition {
        self.inner.definition()
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolCallContext,
    ) -> Result<serde_json::Value, ToolError> {
        let call_id = ctx.call_id.clone().unwrap_or_else(new_call_id);
        let definition = self.inner.definition();
        let span = tracing::info_span!(
            "tool.execute",
            tool = %definition.name,
            call_id = %call_id,
            conversation_id = %self.context.conversation_id,
            tool_purpose = %definition.description,
            tool_kind = %self.registration.kind,
            owner_id = %self.context.owner_id,
            server_id = tracing::field::Empty,
        );
        if let Some(server_id) = &self.registration.server_id {
            span.record("server_id", server_id.as_str());
        }
        self.run(call_id, input).instrument(span).await
    }
}

impl WrappedTool {
    async fn run(
        &self,
        call_id: String,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let name = self.inner.definition().name.clone();
        let visible = !is_internal_tool(&name);
        let started = Instant::now();

        if visible {
            self.stream_input(&call_id, &name, &input);
            let mut payload = json!({
                "callId": call_id,
                "toolName": name,
                "input": input,
                "toolKind": self.registration.kind.as_str(),
                "relationshipId": self.registration.relationship_id,
            });
            if self.registration.policy.needs_approval {
                payload["needsApproval"] = json!(true);
                payload["conversationId"] = json!(self.context.conversation_id);
            }
            self.context.record(SessionEventKind::ToolCall, payload).await;
        }

        let mut approval = None;
        let result = if self.registration.policy.needs_approval {
            match self.await_approval(&call_id, &name, &input).await {
                Ok(ApprovalDecision::Approved) => {
                    approval = Some(ApprovalMetadata::from(&ApprovalDecision::Approved));
                    self.call_inner(&call_id, input.clone()).await
                }
                Ok(ApprovalDecision::Denied { reason }) => {
                    approval = Some(ApprovalMetadata {
                        approved: false,
                        reason: reason.clone(),
                    });
                    Ok(ToolDenial::new(&name, reason).to_value())
                }
                Err(ApprovalError::Cancelled(_)) => Err(ToolError::Cancelled),
                Err(e) => Err(ToolError::ExecutionFailed(e.to_string())),
            }
        } else {
            self.call_inner(&call_id, input.clone()).await
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                debug!(
                    tool = %name,
                    call_id = %call_id,
                    duration_ms,
                    output = %truncate(&output.to_string(), OUTPUT_PREVIEW_BYTES),
                    "Tool call succeeded"
                );
                self.persist_result(&call_id, &name, &output).await;
                let denial = ToolDenial::from_value(&output);
                if visible {
                    self.context
                        .record(
                            SessionEventKind::ToolResult,
                            json!({"callId": call_id, "toolName": name, "output": output}),
                        )
                        .await;
                    self.context.emit(match denial {
                        Some(_) => ToolStreamEvent::OutputDenied {
                            call_id: call_id.clone(),
                        },
                        None => ToolStreamEvent::OutputAvailable {
                            call_id: call_id.clone(),
                            output: output.clone(),
                        },
                    });
                }
                let outcome = match denial {
                    Some(denial) => ToolCallOutcome::Denied { denial },
                    None => ToolCallOutcome::Output {
                        output: output.clone(),
                    },
                };
                self.push_record(call_id, name, input, outcome, duration_ms, approval);
                Ok(output)
            }
            Err(err) => {
                let root = err.into_root_cause();
                let error_text = root.to_string();
                warn!(tool = %name, call_id = %call_id, error = %error_text, "Tool call failed");
                if visible {
                    self.context
                        .record(
                            SessionEventKind::ToolResult,
                            json!({"callId": call_id, "toolName": name, "error": error_text}),
                        )
                        .await;
                    self.context.emit(ToolStreamEvent::OutputError {
                        call_id: call_id.clone(),
                        error_text: error_text.clone(),
                    });
                }
                let outcome = ToolCallOutcome::Error {
                    message: error_text,
                };
                self.push_record(call_id, name, input, outcome, duration_ms, approval);
                Err(root)
            }
        }
    }

    async fn call_inner(
        &self,
        call_id: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        debug!(call_id = %call_id, "Executing tool");
        self.inner
            .execute(input, &ToolCallContext::with_call_id(call_id))
            .await
    }

    fn stream_input(&self, call_id: &str, name: &str, input: &serde_json::Value) {
        self.context.emit(ToolStreamEvent::InputStart {
            call_id: call_id.to_string(),
            tool_name: name.to_string(),
        });
        let serialized = input.to_string();
        for delta in chunk_chars(&serialized, self.context.input_delta_chunk_chars) {
            self.context.emit(ToolStreamEvent::InputDelta {
                call_id: call_id.to_string(),
                delta: delta.to_string(),
            });
        }
        self.context.emit(ToolStreamEvent::InputAvailable {
            call_id: call_id.to_string(),
            tool_name: name.to_string(),
            input: input.clone(),
        });
    }

    async fn await_approval(
        &self,
        call_id: &str,
        name: &str,
        input: &serde_json::Value,
    ) -> Result<ApprovalDecision, ApprovalError> {
        let context = &self.context;
        let request = ApprovalRequest {
            call_id: call_id.to_string(),
            tool_name: name.to_string(),
            input: input.clone(),
            conversation_id: context.conversation_id.clone(),
            owner_id: context.owner_id.clone(),
        };
        let attributes = json!({
            "callId": call_id,
            "toolName": name,
            "conversationId": context.conversation_id,
            "ownerId": context.owner_id,
        });
        // Resolvable before anyone hears about it
        let waiter = context.approvals.register(request.clone())?;
        context
            .telemetry
            .record_event(events::APPROVAL_REQUESTED, attributes.clone());

        let mut notice = None;
        match (&context.sink, &context.stream_id) {
            (Some(_), _) => {
                context.emit(ToolStreamEvent::ApprovalRequest {
                    call_id: call_id.to_string(),
                    tool_name: name.to_string(),
                    input: input.clone(),
                });
            }
            (None, Some(stream_id)) => {
                notice = Some(ResolutionNotice {
                    bus: &context.approval_bus,
                    stream_id: stream_id.clone(),
                    call_id: call_id.to_string(),
                    approved: false,
                });
                context.approval_bus.publish(ApprovalBusEvent::Requested {
                    stream_id: stream_id.clone(),
                    request,
                });
            }
            (None, None) => {
                warn!(call_id = %call_id, "No stream to surface approval request on");
            }
        }

        let decision = waiter.wait().await?;
        let approved = decision.is_approved();
        context.telemetry.record_event(
            if approved {
                events::APPROVAL_APPROVED
            } else {
                events::APPROVAL_DENIED
            },
            attributes,
        );
        if let Some(notice) = notice.as_mut() {
            notice.approved = approved;
        }
        Ok(decision)
    }

    async fn persist_result(&self, call_id: &str, name: &str, output: &serde_json::Value) {
        let message = Message::tool_result(call_id, name, output.clone(), false);
        if let Err(e) = self
            .context
            .history
            .append(&self.context.conversation_id, message)
            .await
        {
            warn!(tool = %name, call_id = %call_id, error = %e, "Failed to persist tool result");
        }
    }

    fn push_record(
        &self,
        call_id: String,
        tool_name: String,
        input: serde_json::Value,
        outcome: ToolCallOutcome,
        duration_ms: u64,
        approval: Option<ApprovalMetadata>,
    ) {
        self.context.records.push(ToolCallRecord {
            call_id,
            tool_name,
            input,
            outcome,
            duration_ms,
            relationship_id: self.registration.relationship_id.clone(),
            approval,
        });
    }
}

/// Publishes the `Resolved` event for a bus-surfaced approval when dropped.
///
/// Orphaned approvals (turn timeout, cancellation, disposal) drop this
/// without a decision and are reported as not approved.
struct ResolutionNotice<'a> {
    bus: &'a ApprovalBus,
    stream_id: String,
    call_id: String,
    approved: bool,
}

impl Drop for ResolutionNotice<'_> {
    fn drop(&mut self) {
        self.bus.publish(ApprovalBusEvent::Resolved {
            stream_id: std::mem::take(&mut self.stream_id),
            call_id: std::mem::take(&mut self.call_id),
            approved: self.approved,
        });
    }
}
