//! Human approval of policy-flagged tool calls.
//!
//! # State Transitions
//!
//! ```text
//! Pending ──> Approved
//!        └──> Denied
//! ```
//!
//! Both outcomes are terminal; a request is resolved exactly once.

pub mod entities;

pub use entities::{ApprovalDecision, ApprovalMetadata, ApprovalRequest, ApprovalState};
