//! Structured configuration issues.
//!
//! Validation never stops at the first problem: callers receive every issue
//! with a severity and decide whether to proceed.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A generation needs at least one step.
    ZeroMaxSteps,
    /// Configured timeout is above the hard cap and will be clamped.
    TimeoutAboveCap,
    /// Compression limits leave no room below the threshold.
    InvalidCompressionLimits,
    /// A tool descriptor is malformed.
    InvalidToolDescriptor,
    /// Two tools expose the same name to the model.
    DuplicateToolName,
    /// A function tool references an executor that is not configured.
    UnknownExecutor,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    /// Whether any issue in the list is fatal.
    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == Severity::Error)
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_errors_returns_true_for_errors() {
        let issues = vec![
            ConfigIssue::warning(ConfigIssueCode::TimeoutAboveCap, "clamped"),
            ConfigIssue::error(ConfigIssueCode::ZeroMaxSteps, "zero"),
        ];
        assert!(ConfigIssue::has_errors(&issues));
    }

    #[test]
    fn has_errors_returns_false_for_warnings_only() {
        let issues = vec![ConfigIssue::warning(ConfigIssueCode::TimeoutAboveCap, "clamped")];
        assert!(!ConfigIssue::has_errors(&issues));
        assert!(!ConfigIssue::has_errors(&[]));
    }

    #[test]
    fn display_prefixes_severity() {
        let issue = ConfigIssue::error(ConfigIssueCode::UnknownExecutor, "no executor 'py'");
        assert_eq!(issue.to_string(), "error: no executor 'py'");
    }
}
