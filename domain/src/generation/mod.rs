//! Step-wise generation domain.
//!
//! A generation is an append-only sequence of [`GenerationStep`]s. After
//! each step the [`termination`] rules decide whether the loop continues.

pub mod step;
pub mod termination;

pub use step::{FinishReason, GenerationStep, StepToolResult};
pub use termination::{StopReason, should_stop};
