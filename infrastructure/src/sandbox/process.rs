//! Function sandbox that runs each call in a child process.
//!
//! Each executor reference maps to a command. The function input is written
//! to the child's stdin as one JSON document; stdout is parsed as JSON and
//! falls back to a plain string when it is not.
//!
//! # Example Configuration
//!
//! ```toml
//! [sandbox.executors.python]
//! command = "python3"
//! args = ["-m", "relay_functions", "{function}"]
//! timeout_seconds = 30
//! ```

use crate::config::{FileExecutorConfig, FileSandboxConfig};
use async_trait::async_trait;
use relay_application::FunctionSandbox;
use relay_domain::ToolError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Placeholder in executor args replaced by the function name.
const FUNCTION_PLACEHOLDER: &str = "{function}";

/// Marker appended to truncated output.
const TRUNCATION_MARKER: &str = "\n[output truncated]";

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("no executor '{0}' is configured")]
    UnknownExecutor(String),

    #[error("failed to start executor: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("executor I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("function '{function}' timed out after {seconds}s")]
    Timeout { function: String, seconds: u64 },

    #[error("function '{function}' failed (exit code {code:?}): {message}")]
    Failed {
        function: String,
        code: Option<i32>,
        message: String,
    },
}

impl From<SandboxError> for ToolError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::UnknownExecutor(_) => ToolError::NotFound(err.to_string()),
            SandboxError::Timeout { .. } => ToolError::Timeout(err.to_string()),
            _ => ToolError::ExecutionFailed(err.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
struct Executor {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl From<&FileExecutorConfig> for Executor {
    fn from(config: &FileExecutorConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            max_output_bytes: config.max_output_bytes,
        }
    }
}

/// [`FunctionSandbox`] running configured executor commands.
#[derive(Debug, Clone, Default)]
pub struct ProcessFunctionSandbox {
    executors: HashMap<String, Executor>,
    working_dir: Option<PathBuf>,
}

impl ProcessFunctionSandbox {
    pub fn from_config(config: &FileSandboxConfig) -> Self {
        Self {
            executors: config
                .executors
                .iter()
                .map(|(name, exec)| (name.clone(), Executor::from(exec)))
                .collect(),
            working_dir: None,
        }
    }

    /// Set the working directory for executor processes.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn executor_names(&self) -> impl Iterator<Item = &str> {
        self.executors.keys().map(String::as_str)
    }

    async fn run(
        &self,
        executor_ref: &str,
        function_name: &str,
        input: &serde_json::Value,
    ) -> Result<serde_json::Value, SandboxError> {
        let executor = self
            .executors
            .get(executor_ref)
            .ok_or_else(|| SandboxError::UnknownExecutor(executor_ref.to_string()))?;

        let args: Vec<String> = executor
            .args
            .iter()
            .map(|a| a.replace(FUNCTION_PLACEHOLDER, function_name))
            .collect();

        let mut cmd = Command::new(&executor.command);
        cmd.args(&args)
            .env("RELAY_FUNCTION", function_name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir
            && dir.is_dir()
        {
            cmd.current_dir(dir);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(SandboxError::Spawn)?;

        let payload = serde_json::to_vec(input).map_err(std::io::Error::other)?;
        let stdin = child.stdin.take();
        let feed_input = async move {
            if let Some(mut stdin) = stdin {
                // A function that ignores its input may exit before reading it
                if let Err(e) = stdin.write_all(&payload).await
                    && e.kind() != std::io::ErrorKind::BrokenPipe
                {
                    return Err(e);
                }
            }
            Ok(())
        };
        // Stdin is fed while output is drained so neither side can stall on a
        // full pipe, and both count against the timeout
        let exchange = async {
            let (fed, output) = tokio::join!(feed_input, child.wait_with_output());
            fed?;
            output
        };

        let output = match tokio::time::timeout(executor.timeout, exchange).await {
            Ok(output) => output?,
            Err(_) => {
                // Dropping the child future kills the process
                warn!(function = function_name, "Function timed out");
                return Err(SandboxError::Timeout {
                    function: function_name.to_string(),
                    seconds: executor.timeout.as_secs(),
                });
            }
        };

        debug!(
            function = function_name,
            executor = executor_ref,
            duration_ms = start.elapsed().as_millis() as u64,
            bytes = output.stdout.len(),
            exit_code = output.status.code(),
            "Function finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                "no error output".to_string()
            } else {
                truncate_utf8(stderr.trim(), executor.max_output_bytes).0
            };
            return Err(SandboxError::Failed {
                function: function_name.to_string(),
                code: output.status.code(),
                message,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (text, truncated) = truncate_utf8(stdout.trim(), executor.max_output_bytes);
        if truncated {
            return Ok(serde_json::Value::String(text + TRUNCATION_MARKER));
        }
        Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
    }
}

/// Cut `s` to at most `max` bytes on a char boundary.
fn truncate_utf8(s: &str, max: usize) -> (String, bool) {
    if s.len() <= max {
        return (s.to_string(), false);
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    (s[..end].to_string(), true)
}

#[async_trait]
impl FunctionSandbox for ProcessFunctionSandbox {
    async fn execute(
        &self,
        executor_ref: &str,
        function_name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        self.run(executor_ref, function_name, &input)
            .await
            .map_err(ToolError::from)
    }
}
