//! Function sandbox adapters.

mod process;

pub use process::{ProcessFunctionSandbox, SandboxError};
