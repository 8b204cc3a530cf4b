//! Compression settings and per-generation compression state.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Settings controlling mid-generation compression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    enabled: bool,
    hard_limit: usize,
    safety_buffer: usize,
    manual_when_disabled: bool,
    summary_max_tokens: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hard_limit: 120_000,
            safety_buffer: 20_000,
            manual_when_disabled: false,
            summary_max_tokens: 4_000,
        }
    }
}

impl CompressionConfig {
    pub fn new(hard_limit: usize, safety_buffer: usize) -> Self {
        Self {
            hard_limit,
            safety_buffer,
            ..Default::default()
        }
    }

    /// Compression fully switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    // ==================== Accessors ====================

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn hard_limit(&self) -> usize {
        self.hard_limit
    }

    pub fn safety_buffer(&self) -> usize {
        self.safety_buffer
    }

    pub fn manual_when_disabled(&self) -> bool {
        self.manual_when_disabled
    }

    pub fn summary_max_tokens(&self) -> usize {
        self.summary_max_tokens
    }

    /// Token count above which compression kicks in.
    pub fn threshold(&self) -> usize {
        self.hard_limit.saturating_sub(self.safety_buffer)
    }

    // ==================== Builder Methods ====================

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_hard_limit(mut self, tokens: usize) -> Self {
        self.hard_limit = tokens;
        self
    }

    pub fn with_safety_buffer(mut self, tokens: usize) -> Self {
        self.safety_buffer = tokens;
        self
    }

    pub fn with_manual_when_disabled(mut self, allow: bool) -> Self {
        self.manual_when_disabled = allow;
        self
    }

    pub fn with_summary_max_tokens(mut self, tokens: usize) -> Self {
        self.summary_max_tokens = tokens;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.hard_limit == 0 {
            return Err(DomainError::InvalidCompression(
                "hard_limit must be greater than zero".to_string(),
            ));
        }
        if self.safety_buffer >= self.hard_limit {
            return Err(DomainError::InvalidCompression(format!(
                "safety_buffer ({}) must be smaller than hard_limit ({})",
                self.safety_buffer, self.hard_limit
            )));
        }
        Ok(())
    }
}

/// Mutable compression state owned by one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionState {
    config: CompressionConfig,
    manual_request: Option<String>,
}

impl CompressionState {
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            config,
            manual_request: None,
        }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    fn manual_allowed(&self) -> bool {
        self.config.enabled || self.config.manual_when_disabled
    }

    /// Record a manual compression request. Returns `false` when manual
    /// requests are not honoured in the current configuration.
    pub fn request_manual(&mut self, reason: impl Into<String>) -> bool {
        if !self.manual_allowed() {
            return false;
        }
        self.manual_request = Some(reason.into());
        true
    }

    pub fn manual_request(&self) -> Option<&str> {
        self.manual_request.as_deref()
    }

    pub fn take_manual_request(&mut self) -> Option<String> {
        self.manual_request.take()
    }

    /// Whether a conversation of `estimated_tokens` needs compression.
    pub fn is_needed(&self, estimated_tokens: usize) -> bool {
        if self.manual_request.is_some() && self.manual_allowed() {
            return true;
        }
        self.config.enabled && estimated_tokens > self.config.threshold()
    }

    pub fn clear(&mut self) {
        self.manual_request = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_check() {
        let state = CompressionState::new(CompressionConfig::new(4000, 300));
        assert!(state.is_needed(4200));
        assert!(!state.is_needed(3700));
        assert!(state.is_needed(3701));
    }

    #[test]
    fn test_disabled_never_needed() {
        let mut state = CompressionState::new(CompressionConfig::disabled());
        assert!(!state.is_needed(usize::MAX));
        assert!(!state.request_manual("user asked"));
        assert!(!state.is_needed(0));
    }

    #[test]
    fn test_manual_when_disabled_opt_in() {
        let mut state =
            CompressionState::new(CompressionConfig::disabled().with_manual_when_disabled(true));
        assert!(!state.is_needed(usize::MAX));
        assert!(state.request_manual("context is noisy"));
        assert!(state.is_needed(0));
        assert_eq!(state.take_manual_request().as_deref(), Some("context is noisy"));
        assert!(!state.is_needed(0));
    }

    #[test]
    fn test_validate() {
        assert!(CompressionConfig::default().validate().is_ok());
        assert!(CompressionConfig::new(100, 100).validate().is_err());
        assert!(CompressionConfig::new(0, 0).validate().is_err());
    }
}
