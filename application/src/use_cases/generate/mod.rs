//! Generate use case
//!
//! Runs one conversational turn of one agent:
//!
//! ```text
//! SetupContext -> LoadToolsAndPrompt -> BuildHistory -> ConfigureModel
//!     -> RunSteps -> FormatResponse -> Cleanup
//! ```
//!
//! Any failure jumps straight to Cleanup, which always releases the
//! compressor and is followed by error telemetry before the error is
//! returned. The connection pool outlives turns and is only torn down by
//! [`GenerateUseCase::dispose`].
//!
//! # Step loop
//!
//! Each step is one [`ModelGateway::complete`] call followed by concurrent
//! execution of the requested tools. Before a step the compressor may replace
//! the working message list; after a step the loop stops when a tool reported
//! a refused connection, the step invoked a transfer tool, the model stopped
//! calling tools, or `max_steps` is reached.

mod types;

pub use types::{GenerateInput, GenerateOutput, GenerationError};

use crate::config::GenerationParams;
use crate::ports::collaborator::{
    DescriptionPromptBuilder, HistoryStore, NoHistory, PlainTextFormatter, PromptBuilder,
    PromptContext, ResponseFormatter,
};
use crate::ports::function_sandbox::{FunctionSandbox, NoFunctionSandbox};
use crate::ports::model_gateway::{ModelGateway, ModelRequest, RequestMetadata, ToolChoice};
use crate::ports::peer_agent::{NoPeerAgents, PeerAgentPort};
use crate::ports::session_recorder::{NoSessionRecorder, SessionRecorder};
use crate::ports::telemetry::{NoTelemetry, TelemetrySink, events};
use crate::ports::tool_server::ToolServerConnector;
use crate::services::approval_bus::ApprovalBus;
use crate::services::approval_gate::ApprovalGate;
use crate::services::compressor::{CompressionControl, MidGenerationCompressor};
use crate::services::connection_pool::{ConnectionPool, TeardownSummary};
use crate::services::tool_loader::ToolSetLoader;
use crate::services::tool_wrapper::StreamContext;
use crate::use_cases::shared::check_cancelled;
use futures::future::join_all;
use relay_domain::{
    AgentDefinition, CompressionConfig, FinishReason, GenerationStep, Message, SessionEvent,
    SessionEventKind, StepToolResult, StopReason, ToolCall, ToolCallContext, ToolDefinition,
    ToolEntry, estimate_tokens, should_stop,
};
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tools available in one turn, by model-facing name.
type ToolRegistry = HashMap<String, ToolEntry>;

/// What the step loop produced.
struct StepLoop {
    steps: Vec<GenerationStep>,
    stop_reason: StopReason,
    structured_output: Option<serde_json::Value>,
}

/// Generation orchestrator for one agent.
///
/// One instance per agent execution; turns may run concurrently and share
/// the connection pool and the approval gate.
pub struct GenerateUseCase {
    agent: Arc<AgentDefinition>,
    gateway: Arc<dyn ModelGateway>,
    summarizer: Option<Arc<dyn ModelGateway>>,
    pool: Arc<ConnectionPool>,
    sandbox: Arc<dyn FunctionSandbox>,
    peers: Arc<dyn PeerAgentPort>,
    prompt_builder: Arc<dyn PromptBuilder>,
    history: Arc<dyn HistoryStore>,
    formatter: Arc<dyn ResponseFormatter>,
    recorder: Arc<dyn SessionRecorder>,
    telemetry: Arc<dyn TelemetrySink>,
    approvals: Arc<ApprovalGate>,
    approval_bus: Arc<ApprovalBus>,
    params: GenerationParams,
    compression: CompressionConfig,
    cancellation_token: Option<CancellationToken>,
}

impl GenerateUseCase {
    pub fn new(
        agent: AgentDefinition,
        gateway: Arc<dyn ModelGateway>,
        connector: Arc<dyn ToolServerConnector>,
    ) -> Self {
        let pool = Arc::new(ConnectionPool::new(connector, agent.scope.clone()));
        Self {
            agent: Arc::new(agent),
            gateway,
            summarizer: None,
            pool,
            sandbox: Arc::new(NoFunctionSandbox),
            peers: Arc::new(NoPeerAgents),
            prompt_builder: Arc::new(DescriptionPromptBuilder),
            history: Arc::new(NoHistory),
            formatter: Arc::new(PlainTextFormatter),
            recorder: Arc::new(NoSessionRecorder),
            telemetry: Arc::new(NoTelemetry),
            approvals: Arc::new(ApprovalGate::new()),
            approval_bus: Arc::new(ApprovalBus::default()),
            params: GenerationParams::default(),
            compression: CompressionConfig::default(),
            cancellation_token: None,
        }
    }

    // ==================== Builder Methods ====================

    /// Model used for compression summaries. Defaults to the main gateway.
    pub fn with_summarizer(mut self, gateway: Arc<dyn ModelGateway>) -> Self {
        self.summarizer = Some(gateway);
        self
    }

    pub fn with_sandbox(mut self, sandbox: Arc<dyn FunctionSandbox>) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_peers(mut self, peers: Arc<dyn PeerAgentPort>) -> Self {
        self.peers = peers;
        self
    }

    pub fn with_prompt_builder(mut self, builder: Arc<dyn PromptBuilder>) -> Self {
        self.prompt_builder = builder;
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = history;
        self
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn ResponseFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn SessionRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Share an approval gate and bus with the component that resolves
    /// approvals.
    pub fn with_approvals(mut self, gate: Arc<ApprovalGate>, bus: Arc<ApprovalBus>) -> Self {
        self.approvals = gate;
        self.approval_bus = bus;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_compression(mut self, config: CompressionConfig) -> Self {
        self.compression = config;
        self
    }

    /// Set a cancellation token for graceful interruption
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    // ==================== Accessors ====================

    pub fn agent(&self) -> &AgentDefinition {
        &self.agent
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn approvals(&self) -> &Arc<ApprovalGate> {
        &self.approvals
    }

    pub fn approval_bus(&self) -> &Arc<ApprovalBus> {
        &self.approval_bus
    }

    // ==================== Lifecycle ====================

    /// End of the agent's lifetime: cancel its pending approvals and close
    /// every pooled connection.
    pub async fn dispose(&self) -> TeardownSummary {
        let cancelled = self.approvals.cancel_owner(&self.agent.id);
        if cancelled > 0 {
            info!(agent_id = %self.agent.id, cancelled, "Cancelled pending approvals");
        }
        self.pool.teardown().await
    }

    /// Run one turn.
    pub async fn execute(&self, input: GenerateInput) -> Result<GenerateOutput, GenerationError> {
        check_cancelled(&self.cancellation_token)?;

        // ==================== SetupContext ====================
        let session_id = input
            .session_id
            .clone()
            .unwrap_or_else(|| input.conversation_id.clone());
        info!(
            agent_id = %self.agent.id,
            conversation_id = %input.conversation_id,
            streamed = input.sink.is_some(),
            "Starting generation"
        );

        let context = Arc::new(
            StreamContext::new(&input.conversation_id, &self.agent.id)
                .with_session_id(&session_id)
                .with_stream_id(input.stream_id.clone())
                .with_sink(input.sink.clone())
                .with_recorder(Arc::clone(&self.recorder))
                .with_history(Arc::clone(&self.history))
                .with_telemetry(Arc::clone(&self.telemetry))
                .with_approvals(Arc::clone(&self.approvals), Arc::clone(&self.approval_bus))
                .with_input_delta_chunk_chars(self.params.input_delta_chunk_chars),
        );
        let summarizer = self
            .summarizer
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.gateway));
        let mut compressor =
            MidGenerationCompressor::new(CompressionControl::new(self.compression.clone()), 0)
                .with_summarizer(summarizer)
                .with_metadata(&self.agent.id, &input.conversation_id);

        let result = self.run_turn(&input, &context, &mut compressor).await;

        // ==================== Cleanup ====================
        compressor.full_cleanup();

        match result {
            Ok(mut output) => {
                output.tool_calls = context.records().snapshot();
                output.compressions = compressor.compressions();
                self.record(
                    &session_id,
                    SessionEventKind::AgentGenerate,
                    json!({
                        "conversationId": input.conversation_id,
                        "text": output.text,
                        "steps": output.steps.len(),
                        "stopReason": output.stop_reason,
                        "finishReason": output.finish_reason.as_str(),
                        "transferTarget": output.transfer_target,
                    }),
                )
                .await;
                info!(
                    agent_id = %self.agent.id,
                    steps = output.steps.len(),
                    tool_calls = output.tool_calls.len(),
                    "Generation finished"
                );
                Ok(output)
            }
            Err(e) => {
                warn!(agent_id = %self.agent.id, error = %e, "Generation failed");
                self.telemetry.record_event(
                    events::GENERATION_ERROR,
                    json!({
                        "agentId": self.agent.id,
                        "conversationId": input.conversation_id,
                        "kind": e.kind(),
                        "error": e.to_string(),
                    }),
                );
                self.record(
                    &session_id,
                    SessionEventKind::Error,
                    json!({"conversationId": input.conversation_id, "error": e.to_string()}),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn run_turn(
        &self,
        input: &GenerateInput,
        context: &Arc<StreamContext>,
        compressor: &mut MidGenerationCompressor,
    ) -> Result<GenerateOutput, GenerationError> {
        // ==================== LoadToolsAndPrompt ====================
        let loader = ToolSetLoader::new(Arc::clone(&self.pool), Arc::clone(context))
            .with_sandbox(Arc::clone(&self.sandbox))
            .with_peers(Arc::clone(&self.peers))
            .with_forwarded_headers(input.forwarded_headers.clone());
        let descriptors = &self.agent.tools;
        let control = compressor.control();
        let prompt_context = PromptContext {
            agent: &self.agent,
            conversation_id: &input.conversation_id,
            user_message: &input.user_message,
        };

        let (remote, functions, relations, defaults, system_prompt) = tokio::try_join!(
            async { Ok::<_, GenerationError>(loader.load_remote_tools(descriptors).await?) },
            async { Ok::<_, GenerationError>(loader.load_function_tools(descriptors).await?) },
            async { Ok::<_, GenerationError>(loader.load_relation_tools(descriptors).await?) },
            async { Ok::<_, GenerationError>(loader.load_default_tools(control).await?) },
            async {
                self.prompt_builder
                    .build_system_prompt(prompt_context)
                    .await
                    .map_err(GenerationError::Prompt)
            },
        )?;
        let tools = build_registry(
            remote
                .into_iter()
                .chain(functions)
                .chain(relations)
                .chain(defaults),
        );
        check_cancelled(&self.cancellation_token)?;

        // ==================== BuildHistory ====================
        let prior = self
            .history
            .load_history(&input.conversation_id, &self.agent.id)
            .await
            .map_err(GenerationError::History)?;
        let mut messages = Vec::with_capacity(prior.len() + 2);
        messages.push(Message::system(system_prompt));
        messages.extend(prior);
        messages.push(Message::user(input.user_message.as_str()));
        compressor.set_generation_start(messages.len());

        // ==================== ConfigureModel ====================
        let mut definitions: Vec<ToolDefinition> =
            tools.values().map(|t| t.definition().clone()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        let tool_choice = if definitions.is_empty() {
            ToolChoice::None
        } else {
            self.params.tool_choice.clone()
        };
        let timeout = self.params.effective_timeout();
        debug!(
            tools = definitions.len(),
            history = messages.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Model configured"
        );

        // ==================== RunSteps ====================
        let outcome = self
            .with_deadline(
                self.run_steps(
                    messages,
                    &tools,
                    &definitions,
                    tool_choice,
                    input,
                    compressor,
                ),
                timeout,
            )
            .await?;

        // ==================== FormatResponse ====================
        self.shape_response(outcome)
    }

    /// Bound `future` by the turn timeout and the cancellation token.
    async fn with_deadline<T>(
        &self,
        future: impl Future<Output = Result<T, GenerationError>>,
        timeout: std::time::Duration,
    ) -> Result<T, GenerationError> {
        let timed = async {
            match tokio::time::timeout(timeout, future).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_ms = timeout.as_millis() as u64, "Generation timed out");
                    Err(GenerationError::Timeout(timeout))
                }
            }
        };
        match &self.cancellation_token {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(GenerationError::Cancelled),
                    result = timed => result,
                }
            }
            None => timed.await,
        }
    }

    async fn run_steps(
        &self,
        mut messages: Vec<Message>,
        tools: &ToolRegistry,
        definitions: &[ToolDefinition],
        tool_choice: ToolChoice,
        input: &GenerateInput,
        compressor: &mut MidGenerationCompressor,
    ) -> Result<StepLoop, GenerationError> {
        let max_steps = self.params.max_steps.max(1);
        let mut steps: Vec<GenerationStep> = Vec::new();
        let mut structured_output = None;

        loop {
            check_cancelled(&self.cancellation_token)?;
            let index = steps.len();

            // Pre-step hook
            if compressor.is_compression_needed(&messages) {
                let tokens = estimate_tokens(&messages);
                let result = compressor.safe_compress(&messages, tokens).await;
                if result.compressed() {
                    self.telemetry.record_event(
                        events::COMPRESSION,
                        json!({
                            "agentId": self.agent.id,
                            "conversationId": input.conversation_id,
                            "step": index,
                            "strategy": result.strategy.as_str(),
                            "tokensBefore": result.tokens_before,
                            "tokensAfter": result.tokens_after,
                        }),
                    );
                    messages = result.messages;
                }
            }

            let request = ModelRequest::new(messages.clone())
                .with_tools(definitions.to_vec(), tool_choice.clone())
                .with_response_schema(input.response_schema.clone())
                .with_stream(self.params.streaming)
                .with_metadata(RequestMetadata {
                    agent_id: self.agent.id.clone(),
                    conversation_id: input.conversation_id.clone(),
                    purpose: "generation".to_string(),
                    step_index: Some(index),
                });
            let response = self.gateway.complete(request).await?;
            debug!(
                step = index,
                tool_calls = response.tool_calls.len(),
                finish_reason = %response.finish_reason.as_str(),
                "Model step finished"
            );
            if response.structured_output.is_some() {
                structured_output = response.structured_output;
            }

            let tool_results = execute_tool_calls(tools, &response.tool_calls).await;
            let step = GenerationStep {
                index,
                text: response.text,
                tool_calls: response.tool_calls,
                tool_results,
                finish_reason: response.finish_reason,
            };
            if !step.tool_calls.is_empty() && !step.text.trim().is_empty() {
                self.record(
                    input.session_id.as_deref().unwrap_or(&input.conversation_id),
                    SessionEventKind::AgentReasoning,
                    json!({"conversationId": input.conversation_id, "step": index, "text": step.text}),
                )
                .await;
            }
            messages.extend(step.to_messages());
            let called_tools = !step.tool_calls.is_empty();
            steps.push(step);

            // Post-step termination predicate
            let stop = match should_stop(&steps, max_steps) {
                Some(StopReason::MaxStepsReached) | None if !called_tools => {
                    Some(StopReason::Completed)
                }
                other => other,
            };
            if let Some(stop_reason) = stop {
                self.annotate_stop(&stop_reason, steps.len(), input);
                return Ok(StepLoop {
                    steps,
                    stop_reason,
                    structured_output,
                });
            }
        }
    }

    fn annotate_stop(&self, reason: &StopReason, steps: usize, input: &GenerateInput) {
        match reason {
            StopReason::Completed => {
                debug!(steps, "Model finished without further tool calls");
                return;
            }
            StopReason::ConnectionRefused => {
                warn!(steps, "Stopping: a tool server refused the connection");
            }
            StopReason::Transferred { target } => {
                info!(steps, target_agent = %target, "Stopping: transfer requested");
            }
            StopReason::MaxStepsReached => {
                warn!(steps, max_steps = self.params.max_steps, "Stopping: max steps reached");
            }
        }
        self.telemetry.record_event(
            reason.event_name(),
            json!({
                "agentId": self.agent.id,
                "conversationId": input.conversation_id,
                "steps": steps,
            }),
        );
    }

    fn shape_response(&self, outcome: StepLoop) -> Result<GenerateOutput, GenerationError> {
        let StepLoop {
            steps,
            stop_reason,
            structured_output,
        } = outcome;

        let transfer_target = match &stop_reason {
            StopReason::Transferred { target } => Some(target.clone()),
            _ => None,
        };
        let text = if let Some(structured) = &structured_output {
            structured.to_string()
        } else if transfer_target.is_some() {
            let last = steps.last().map(|s| s.text.as_str()).unwrap_or_default();
            self.formatter
                .format_text(last)
                .map_err(GenerationError::Format)?
        } else {
            self.formatter
                .format_text(&aggregate_text(&steps))
                .map_err(GenerationError::Format)?
        };
        let finish_reason = steps
            .last()
            .map(|s| s.finish_reason.clone())
            .unwrap_or(FinishReason::Stop);

        Ok(GenerateOutput {
            text,
            structured_output,
            transfer_target,
            steps,
            finish_reason,
            stop_reason,
            tool_calls: Vec::new(),
            compressions: 0,
        })
    }

    async fn record(&self, session_id: &str, kind: SessionEventKind, payload: serde_json::Value) {
        let event = SessionEvent::new(session_id, kind, &self.agent.id, payload);
        if let Err(e) = self.recorder.record_event(event).await {
            warn!(kind = %kind, error = %e, "Failed to record session event");
        }
    }
}

/// Index tools by name. The first registration of a name wins.
fn build_registry(entries: impl IntoIterator<Item = ToolEntry>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for entry in entries {
        let name = entry.name().to_string();
        if registry.contains_key(&name) {
            warn!(tool = %name, "Duplicate tool name, keeping the first registration");
            continue;
        }
        registry.insert(name, entry);
    }
    registry
}

/// Run every call of one step concurrently. Failures become error results
/// so the model can recover in-conversation.
async fn execute_tool_calls(tools: &ToolRegistry, calls: &[ToolCall]) -> Vec<StepToolResult> {
    let runs = calls.iter().map(|call| async move {
        let Some(entry) = tools.get(&call.tool_name) else {
            warn!(tool = %call.tool_name, "Model called an unknown tool");
            return StepToolResult::failure(call, format!("Unknown tool: {}", call.tool_name), false);
        };
        let Some(tool) = entry.as_invocable() else {
            return StepToolResult::failure(
                call,
                format!("Tool '{}' cannot be executed here", call.tool_name),
                false,
            );
        };
        let ctx = ToolCallContext::with_call_id(&call.call_id);
        match tool.execute(call.input.clone(), &ctx).await {
            Ok(output) => StepToolResult::success(call, output),
            Err(e) => StepToolResult::failure(call, e.to_string(), e.is_connection_refused()),
        }
    });
    join_all(runs).await
}

/// Non-empty step texts joined by a blank line.
fn aggregate_text(steps: &[GenerationStep]) -> String {
    steps
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::model_gateway::{GatewayError, ModelResponse};
    use crate::services::approval_bus::ApprovalBusEvent;
    use crate::test_support::{
        FakeConnector, RecordingHistory, RecordingRecorder, RecordingSink, RecordingTelemetry,
        ScriptedGateway, remote_tool,
    };
    use async_trait::async_trait;
    use relay_domain::{
        ApprovalDecision, ConnectionScope, FunctionToolConfig, ToolDescriptor, ToolError,
        ToolStreamEvent,
    };
    use std::time::Duration;

    /// `lookup` echoes, `fail` errors, `big` returns a large payload.
    struct TestSandbox;

    #[async_trait]
    impl FunctionSandbox for TestSandbox {
        async fn execute(
            &self,
            _executor_ref: &str,
            function_name: &str,
            input: serde_json::Value,
        ) -> Result<serde_json::Value, ToolError> {
            match function_name {
                "fail" => Err(ToolError::ExecutionFailed("disk full".to_string())),
                "big" => Ok(serde_json::Value::String("y".repeat(2000))),
                _ => Ok(json!({"found": input})),
            }
        }
    }

    fn function(name: &str) -> ToolDescriptor {
        ToolDescriptor::FunctionTool(FunctionToolConfig {
            id: format!("fn-{}", name),
            name: name.to_string(),
            description: format!("{} function", name),
            input_schema: json!({"type": "object"}),
            executor_ref: "local".to_string(),
            needs_approval: false,
        })
    }

    fn agent() -> AgentDefinition {
        AgentDefinition::new("agent-a", "Agent A")
            .with_description("You answer billing questions.")
            .with_scope(ConnectionScope::new("tenant", "project"))
    }

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall::new(id, name, json!({"q": id}))
    }

    struct Harness {
        gateway: Arc<ScriptedGateway>,
        telemetry: Arc<RecordingTelemetry>,
        recorder: Arc<RecordingRecorder>,
        connector: Arc<FakeConnector>,
    }

    impl Harness {
        fn new(responses: Vec<Result<ModelResponse, GatewayError>>) -> Self {
            Self::with_gateway(ScriptedGateway::new(responses))
        }

        fn with_gateway(gateway: ScriptedGateway) -> Self {
            Self {
                gateway: Arc::new(gateway),
                telemetry: Arc::new(RecordingTelemetry::default()),
                recorder: Arc::new(RecordingRecorder::default()),
                connector: Arc::new(FakeConnector::new()),
            }
        }

        fn use_case(&self, agent: AgentDefinition) -> GenerateUseCase {
            GenerateUseCase::new(
                agent,
                self.gateway.clone(),
                self.connector.clone() as Arc<dyn ToolServerConnector>,
            )
            .with_sandbox(Arc::new(TestSandbox))
            .with_telemetry(self.telemetry.clone())
            .with_recorder(self.recorder.clone())
        }
    }

    #[tokio::test]
    async fn test_text_only_turn_completes() {
        let harness = Harness::new(vec![Ok(ModelResponse::from_text("  Your invoice is paid. "))]);
        let history = Arc::new(RecordingHistory::with_prior(vec![
            Message::user("Hi"),
            Message::assistant("Hello!"),
        ]));
        let use_case = harness.use_case(agent()).with_history(history);

        let output = use_case
            .execute(GenerateInput::new("conv-1", "Is my invoice paid?"))
            .await
            .unwrap();

        assert_eq!(output.text, "Your invoice is paid.");
        assert_eq!(output.stop_reason, StopReason::Completed);
        assert_eq!(output.steps.len(), 1);
        assert_eq!(output.finish_reason, FinishReason::Stop);

        let request = &harness.gateway.requests()[0];
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].text(), "You answer billing questions.");
        assert_eq!(request.messages[3].text(), "Is my invoice paid?");
        assert_eq!(request.metadata.step_index, Some(0));
        // The default compress_context tool is always present.
        assert!(request.tools.iter().any(|t| t.name == "compress_context"));
        assert_eq!(
            harness.recorder.kinds(),
            vec![SessionEventKind::AgentGenerate]
        );
        assert!(harness.telemetry.names().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_stops_loop_immediately() {
        let harness = Harness::new(vec![Ok(ModelResponse::with_tool_calls(
            "Handing you over to billing.",
            vec![call("c1", "transfer_to_billing")],
        ))]);
        let use_case = harness
            .use_case(agent().with_tool(ToolDescriptor::TransferHandle {
                target_agent_id: "billing".to_string(),
                description: None,
            }))
            .with_params(GenerationParams::default().with_max_steps(10));

        let output = use_case
            .execute(GenerateInput::new("conv-1", "I need a refund"))
            .await
            .unwrap();

        assert_eq!(harness.gateway.requests().len(), 1);
        assert_eq!(output.steps.len(), 1);
        assert_eq!(
            output.stop_reason,
            StopReason::Transferred {
                target: "billing".to_string()
            }
        );
        assert_eq!(output.transfer_target.as_deref(), Some("billing"));
        assert_eq!(output.text, "Handing you over to billing.");
        assert_eq!(harness.telemetry.count("generation.stop.transfer"), 1);
    }

    #[tokio::test]
    async fn test_transfer_returns_last_step_text_only() {
        let harness = Harness::new(vec![
            Ok(ModelResponse::with_tool_calls(
                "Let me check.",
                vec![call("c1", "lookup")],
            )),
            Ok(ModelResponse::with_tool_calls(
                "Billing can help.",
                vec![call("c2", "transfer_to_billing")],
            )),
        ]);
        let use_case = harness.use_case(
            agent()
                .with_tool(function("lookup"))
                .with_tool(ToolDescriptor::TransferHandle {
                    target_agent_id: "billing".to_string(),
                    description: None,
                }),
        );

        let output = use_case
            .execute(GenerateInput::new("conv-1", "refund"))
            .await
            .unwrap();
        assert_eq!(output.steps.len(), 2);
        assert_eq!(output.text, "Billing can help.");
    }

    #[tokio::test]
    async fn test_max_steps_emits_telemetry_once() {
        let responses = (0..3)
            .map(|i| {
                Ok(ModelResponse::with_tool_calls(
                    format!("step {}", i),
                    vec![call(&format!("c{}", i), "lookup")],
                ))
            })
            .collect();
        let harness = Harness::new(responses);
        let use_case = harness
            .use_case(agent().with_tool(function("lookup")))
            .with_params(GenerationParams::default().with_max_steps(3));

        let output = use_case
            .execute(GenerateInput::new("conv-1", "search forever"))
            .await
            .unwrap();

        assert_eq!(output.steps.len(), 3);
        assert_eq!(output.stop_reason, StopReason::MaxStepsReached);
        assert_eq!(harness.gateway.requests().len(), 3);
        assert_eq!(harness.telemetry.count("generation.stop.max_steps"), 1);
        assert_eq!(output.text, "step 0\n\nstep 1\n\nstep 2");
        assert_eq!(output.tool_calls.len(), 3);
    }

    #[tokio::test]
    async fn test_refused_connection_stops_loop() {
        let mut harness = Harness::new(vec![Ok(ModelResponse::with_tool_calls(
            "",
            vec![call("c1", "refuse")],
        ))]);
        harness.connector = Arc::new(
            FakeConnector::new().with_tools(vec![ToolDefinition::new("refuse", "Always refuses")]),
        );
        let use_case = harness.use_case(agent().with_tool(ToolDescriptor::RemoteTool(remote_tool("crm"))));

        let output = use_case
            .execute(GenerateInput::new("conv-1", "look me up"))
            .await
            .unwrap();

        assert_eq!(output.stop_reason, StopReason::ConnectionRefused);
        assert!(output.steps[0].tool_results[0].connection_refused);
        assert_eq!(harness.telemetry.count("generation.stop.connection_refused"), 1);

        let summary = use_case.dispose().await;
        assert_eq!(summary.closed, 1);
        assert_eq!(use_case.pool().cached_count().await, 0);
    }

    #[tokio::test]
    async fn test_tool_failure_becomes_error_result() {
        let harness = Harness::new(vec![
            Ok(ModelResponse::with_tool_calls("", vec![call("c1", "fail")])),
            Ok(ModelResponse::from_text("The disk is full, try later.")),
        ]);
        let use_case = harness.use_case(agent().with_tool(function("fail")));

        let output = use_case
            .execute(GenerateInput::new("conv-1", "save it"))
            .await
            .unwrap();

        assert_eq!(output.steps.len(), 2);
        let result = &output.steps[0].tool_results[0];
        assert!(result.is_error);
        assert!(!result.connection_refused);
        assert_eq!(output.text, "The disk is full, try later.");

        let second = &harness.gateway.requests()[1];
        let last = second.messages.last().unwrap();
        assert_eq!(last.role, relay_domain::Role::Tool);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let harness = Harness::new(vec![
            Ok(ModelResponse::with_tool_calls("", vec![call("c1", "nope")])),
            Ok(ModelResponse::from_text("ok")),
        ]);
        let output = harness
            .use_case(agent())
            .execute(GenerateInput::new("conv-1", "x"))
            .await
            .unwrap();
        assert!(output.steps[0].tool_results[0].is_error);
    }

    #[tokio::test]
    async fn test_timeout_runs_cleanup_and_reports_error() {
        let harness = Harness::with_gateway(
            ScriptedGateway::new(vec![]).with_delay(Duration::from_millis(500)),
        );
        let use_case = harness.use_case(agent()).with_params(
            GenerationParams::default().with_timeout(Duration::from_millis(50)),
        );

        let err = use_case
            .execute(GenerateInput::new("conv-1", "slow"))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Timeout(_)));
        assert_eq!(harness.telemetry.count("generation.error"), 1);
        assert_eq!(harness.recorder.kinds(), vec![SessionEventKind::Error]);
    }

    #[tokio::test]
    async fn test_timeout_is_capped() {
        let harness = Harness::with_gateway(
            ScriptedGateway::new(vec![]).with_delay(Duration::from_millis(500)),
        );
        let params = GenerationParams::default()
            .with_timeout(Duration::from_secs(60))
            .with_max_timeout(Duration::from_millis(50));
        let err = harness
            .use_case(agent())
            .with_params(params)
            .execute(GenerateInput::new("conv-1", "slow"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(d) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let harness = Harness::new(vec![]);
        let token = CancellationToken::new();
        token.cancel();
        let err = harness
            .use_case(agent())
            .with_cancellation(token)
            .execute(GenerateInput::new("conv-1", "x"))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(harness.gateway.requests().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_model_call() {
        let harness = Harness::with_gateway(
            ScriptedGateway::new(vec![]).with_delay(Duration::from_secs(5)),
        );
        let token = CancellationToken::new();
        let use_case = harness.use_case(agent()).with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            token.cancel();
        });
        let err = use_case
            .execute(GenerateInput::new("conv-1", "x"))
            .await
            .unwrap_err();
        canceller.await.unwrap();
        assert!(err.is_cancelled());
        assert_eq!(harness.telemetry.count("generation.error"), 1);
    }

    #[tokio::test]
    async fn test_structured_output_takes_precedence() {
        let response = ModelResponse {
            structured_output: Some(json!({"paid": true})),
            ..ModelResponse::from_text("It is paid.")
        };
        let harness = Harness::new(vec![Ok(response)]);
        let output = harness
            .use_case(agent())
            .execute(
                GenerateInput::new("conv-1", "paid?")
                    .with_response_schema(json!({"type": "object"})),
            )
            .await
            .unwrap();

        assert_eq!(output.structured_output, Some(json!({"paid": true})));
        assert_eq!(output.text, r#"{"paid":true}"#);
        assert!(harness.gateway.requests()[0].response_schema.is_some());
    }

    #[tokio::test]
    async fn test_pre_step_compression_replaces_messages() {
        let summary = ModelResponse::from_text(
            "```summary\n{\"high_level_summary\": \"Fetched the big report\"}\n```",
        );
        let harness = Harness::new(vec![
            Ok(ModelResponse::with_tool_calls("", vec![call("c1", "big")])),
            Ok(summary),
            Ok(ModelResponse::from_text("Report summarised.")),
        ]);
        let use_case = harness
            .use_case(agent().with_tool(function("big")))
            .with_compression(CompressionConfig::new(400, 50));

        let output = use_case
            .execute(GenerateInput::new("conv-1", "get the report"))
            .await
            .unwrap();

        assert_eq!(output.compressions, 1);
        assert_eq!(harness.telemetry.count("generation.compression"), 1);

        let requests = harness.gateway.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].metadata.purpose, "compression");
        let final_step = &requests[2];
        // system prompt, user message, research summary
        assert_eq!(final_step.messages.len(), 3);
        assert!(
            final_step
                .messages
                .last()
                .unwrap()
                .text()
                .contains("Fetched the big report")
        );
    }

    #[tokio::test]
    async fn test_streamed_turn_emits_tool_events() {
        let harness = Harness::new(vec![
            Ok(ModelResponse::with_tool_calls("", vec![call("c1", "lookup")])),
            Ok(ModelResponse::from_text("done")),
        ]);
        let sink = Arc::new(RecordingSink::default());
        harness
            .use_case(agent().with_tool(function("lookup")))
            .execute(GenerateInput::new("conv-1", "find").with_stream("s-1", sink.clone()))
            .await
            .unwrap();

        let events = sink.events();
        assert!(matches!(events.first(), Some(ToolStreamEvent::InputStart { .. })));
        assert!(matches!(
            events.last(),
            Some(ToolStreamEvent::OutputAvailable { call_id, .. }) if call_id == "c1"
        ));
    }

    #[tokio::test]
    async fn test_nested_turn_publishes_approval_on_bus() {
        let harness = Harness::new(vec![
            Ok(ModelResponse::with_tool_calls("", vec![call("c1", "refund")])),
            Ok(ModelResponse::from_text("refunded")),
        ]);
        let mut refund = function("refund");
        if let ToolDescriptor::FunctionTool(config) = &mut refund {
            config.needs_approval = true;
        }
        let use_case = harness.use_case(agent().with_tool(refund));
        let mut events = use_case.approval_bus().subscribe("outer-stream");

        let approver = async {
            let event = events.recv().await.unwrap();
            let ApprovalBusEvent::Requested { request, .. } = event else {
                panic!("expected an approval request, got {:?}", event);
            };
            use_case
                .approvals()
                .resolve(&request.call_id, ApprovalDecision::Approved)
                .unwrap();
        };
        let (output, ()) = tokio::join!(
            use_case.execute(GenerateInput::new("conv-1", "refund me").nested_under("outer-stream")),
            approver
        );

        let output = output.unwrap();
        assert_eq!(output.text, "refunded");
        assert!(!output.tool_calls[0].outcome.is_error());
        assert!(!use_case.approvals().is_pending("c1"));
    }

    #[tokio::test]
    async fn test_tool_load_failure_propagates() {
        let harness = Harness::new(vec![]);
        *harness.connector.fail_with.lock().unwrap() = Some(
            crate::ports::tool_server::ConnectionError::Transport("boom".to_string()),
        );
        let err = harness
            .use_case(agent().with_tool(ToolDescriptor::RemoteTool(remote_tool("crm"))))
            .execute(GenerateInput::new("conv-1", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::ToolLoad(_)));
        assert!(harness.gateway.requests().is_empty());
        assert_eq!(harness.telemetry.count("generation.error"), 1);
    }

    #[test]
    fn test_aggregate_text_skips_empty_steps() {
        let step = |text: &str| GenerationStep {
            index: 0,
            text: text.to_string(),
            tool_calls: vec![],
            tool_results: vec![],
            finish_reason: FinishReason::Stop,
        };
        assert_eq!(
            aggregate_text(&[step("a"), step("  "), step("b")]),
            "a\n\nb"
        );
    }
}
