//! Hand-written fakes for the application ports, shared by unit tests.

use crate::ports::collaborator::{CollaboratorError, HistoryStore};
use crate::ports::model_gateway::{GatewayError, ModelGateway, ModelRequest, ModelResponse};
use crate::ports::session_recorder::SessionRecorder;
use crate::ports::stream_sink::{SinkError, StreamSink};
use crate::ports::telemetry::TelemetrySink;
use crate::ports::tool_server::{ConnectionError, ToolServerConnection, ToolServerConnector};
use async_trait::async_trait;
use relay_domain::{
    InvocableTool, Message, RemoteToolConfig, ServerTransport, SessionEvent, SessionEventKind,
    ToolCallContext, ToolDefinition, ToolEntry, ToolError, ToolStreamEvent,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==================== Tools ====================

/// Returns `{"echo": input}` and counts calls.
pub struct EchoTool {
    definition: ToolDefinition,
    calls: Arc<AtomicUsize>,
}

impl EchoTool {
    pub fn new(name: &str) -> Self {
        Self {
            definition: ToolDefinition::new(name, format!("Echo tool {}", name)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn entry(name: &str) -> ToolEntry {
        ToolEntry::Invocable(Arc::new(Self::new(name)))
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl InvocableTool for EchoTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _ctx: &ToolCallContext,
    ) -> Result<serde_json::Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({ "echo": input }))
    }
}

/// Always fails with the configured error.
pub struct FailingTool {
    definition: ToolDefinition,
    error: ToolError,
}

impl FailingTool {
    pub fn entry(name: &str, error: ToolError) -> ToolEntry {
        ToolEntry::Invocable(Arc::new(Self {
            definition: ToolDefinition::new(name, "Always fails"),
            error,
        }))
    }
}

#[async_trait]
impl InvocableTool for FailingTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        _input: serde_json::Value,
        _ctx: &ToolCallContext,
    ) -> Result<serde_json::Value, ToolError> {
        Err(self.error.clone())
    }
}

// ==================== Sinks ====================

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ToolStreamEvent>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<ToolStreamEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl StreamSink for RecordingSink {
    fn emit(&self, event: ToolStreamEvent) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingRecorder {
    events: Mutex<Vec<SessionEvent>>,
    failing: AtomicBool,
}

impl RecordingRecorder {
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<SessionEventKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl SessionRecorder for RecordingRecorder {
    async fn record_event(&self, event: SessionEvent) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::WriteFailed("disk full".to_string()));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingHistory {
    prior: Vec<Message>,
    appended: Mutex<Vec<Message>>,
    failing: AtomicBool,
}

impl RecordingHistory {
    pub fn with_prior(prior: Vec<Message>) -> Self {
        Self {
            prior,
            ..Default::default()
        }
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn appended(&self) -> Vec<Message> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistoryStore for RecordingHistory {
    async fn load_history(
        &self,
        _conversation_id: &str,
        _agent_id: &str,
    ) -> Result<Vec<Message>, CollaboratorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Failed("history unavailable".to_string()));
        }
        Ok(self.prior.clone())
    }

    async fn append(&self, _conversation_id: &str, message: Message) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::WriteFailed("history unavailable".to_string()));
        }
        self.appended.lock().unwrap().push(message);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingTelemetry {
    pub fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| *n == name).count()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record_event(&self, name: &str, attributes: serde_json::Value) {
        self.events
            .lock()
            .unwrap()
            .push((name.to_string(), attributes));
    }
}

// ==================== Model gateway ====================

/// Replays scripted responses and remembers every request.
#[derive(Default)]
pub struct ScriptedGateway {
    responses: Mutex<VecDeque<Result<ModelResponse, GatewayError>>>,
    requests: Mutex<Vec<ModelRequest>>,
    delay: Option<Duration>,
}

impl ScriptedGateway {
    pub fn new(responses: Vec<Result<ModelResponse, GatewayError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, GatewayError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ModelResponse::from_text("done")))
    }
}

// ==================== Tool servers ====================

pub struct FakeConnection {
    pub id: usize,
    pub alive: AtomicBool,
    pub fail_close: bool,
    pub closed: AtomicUsize,
    pub tools: Vec<ToolDefinition>,
    pub calls: Mutex<Vec<(String, serde_json::Value)>>,
}

impl FakeConnection {
    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolServerConnection for FakeConnection {
    fn server_id(&self) -> &str {
        "fake-server"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ConnectionError> {
        Ok(self.tools.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));
        if name == "refuse" {
            return Err(ToolError::ConnectionRefused("upstream refused".to_string()));
        }
        Ok(serde_json::json!({"tool": name, "args": arguments, "connection": self.id}))
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            Err(ConnectionError::Transport("close failed".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Counts connection attempts and hands out fresh fake connections.
pub struct FakeConnector {
    pub attempts: AtomicUsize,
    pub delay: Duration,
    pub fail_with: Mutex<Option<ConnectionError>>,
    pub tools: Vec<ToolDefinition>,
    pub fail_close_for: Vec<usize>,
    pub made: Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
            delay: Duration::from_millis(20),
            fail_with: Mutex::new(None),
            tools: Vec::new(),
            fail_close_for: Vec::new(),
            made: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn connection(&self, index: usize) -> Arc<FakeConnection> {
        Arc::clone(&self.made.lock().unwrap()[index])
    }
}

#[async_trait]
impl ToolServerConnector for FakeConnector {
    async fn connect(
        &self,
        _server: &ServerTransport,
        _headers: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn ToolServerConnection>, ConnectionError> {
        let id = self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if let Some(err) = self.fail_with.lock().unwrap().take() {
            return Err(err);
        }
        let conn = Arc::new(FakeConnection {
            id,
            alive: AtomicBool::new(true),
            fail_close: self.fail_close_for.contains(&id),
            closed: AtomicUsize::new(0),
            tools: self.tools.clone(),
            calls: Mutex::new(Vec::new()),
        });
        self.made.lock().unwrap().push(Arc::clone(&conn));
        Ok(conn)
    }
}

pub fn remote_tool(tool_id: &str) -> RemoteToolConfig {
    RemoteToolConfig {
        tool_id: tool_id.to_string(),
        name: tool_id.to_string(),
        server: ServerTransport::Stdio {
            command: format!("{}-server", tool_id),
            args: vec![],
            env: BTreeMap::new(),
        },
        credential_ref: None,
        selected_tools: vec![],
        overrides: BTreeMap::new(),
        relationship_id: None,
    }
}
