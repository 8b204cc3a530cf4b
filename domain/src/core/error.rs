//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid tool descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid compression settings: {0}")]
    InvalidCompression(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = DomainError::InvalidCompression("safety buffer exceeds hard limit".to_string());
        assert_eq!(
            error.to_string(),
            "Invalid compression settings: safety buffer exceeds hard limit"
        );
    }
}
