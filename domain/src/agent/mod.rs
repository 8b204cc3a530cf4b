//! Agent definitions and configuration validation.

pub mod definition;
pub mod validation;

pub use definition::AgentDefinition;
pub use validation::{ConfigIssue, ConfigIssueCode, Severity};
