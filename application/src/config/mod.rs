//! Application-level configuration.
//!
//! - [`GenerationParams`]: step loop control (step budget, timeouts, input streaming)

pub mod generation_params;

pub use generation_params::GenerationParams;
