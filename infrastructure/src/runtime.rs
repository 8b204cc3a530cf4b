//! Composition root: builds a ready-to-run [`GenerateUseCase`] from file
//! configuration and the host's model gateway.

use crate::config::{ConfigValidationError, FileConfig};
use crate::logging::JsonlSessionRecorder;
use crate::mcp::McpConnector;
use crate::sandbox::ProcessFunctionSandbox;
use crate::telemetry::TracingTelemetry;
use relay_application::{GenerateUseCase, ModelGateway};
use relay_domain::ConfigIssue;
use std::sync::Arc;
use tracing::{info, warn};

/// Wire every infrastructure adapter into a [`GenerateUseCase`].
///
/// Fails if the configuration has any error-level issue; warnings are
/// logged and returned alongside the use case.
pub fn build_generate_use_case(
    config: &FileConfig,
    gateway: Arc<dyn ModelGateway>,
) -> Result<(GenerateUseCase, Vec<ConfigIssue>), ConfigValidationError> {
    let resolved = config.resolve()?;
    for issue in &resolved.warnings {
        warn!("Config: {}", issue);
    }

    let mut use_case = GenerateUseCase::new(
        resolved.agent,
        gateway,
        Arc::new(McpConnector::new()),
    )
    .with_sandbox(Arc::new(ProcessFunctionSandbox::from_config(&config.sandbox)))
    .with_telemetry(Arc::new(TracingTelemetry::new()))
    .with_params(resolved.generation)
    .with_compression(resolved.compression);

    if let Some(path) = config.logging.session_log_path(&config.agent.id)
        && let Some(recorder) = JsonlSessionRecorder::new(&path)
    {
        info!("Session log: {}", path.display());
        use_case = use_case.with_recorder(Arc::new(recorder));
    }

    Ok((use_case, resolved.warnings))
}
