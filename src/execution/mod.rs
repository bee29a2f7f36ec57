//! Sandboxed code execution.
//!
//! Code never runs locally. Each call submits one (code, language, stdin)
//! triple to an external Judge0-compatible service and waits for the result:
//!
//! - [`SandboxExecutor`] - the narrow contract the refinement loop depends on
//! - [`Judge0Client`] - HTTP implementation with a bounded timeout
//! - [`ThrottledExecutor`] - shares an execution quota across concurrent runs
//!
//! # Example
//!
//! ```ignore
//! use code_refinery::execution::{Judge0Client, SandboxExecutor};
//! use code_refinery::language::Language;
//! use std::time::Duration;
//!
//! let client = Judge0Client::new("http://localhost:2358", Duration::from_secs(30))?;
//! let result = client.execute("print(input())", Language::Python, "hi").await?;
//! assert_eq!(result.stdout.trim(), "hi");
//! ```

pub mod judge0;
pub mod throttle;

pub use judge0::{judge0_language_id, Judge0Client, MAX_SOURCE_BYTES, MAX_STDIN_BYTES};
pub use throttle::ThrottledExecutor;

use async_trait::async_trait;

use crate::error::ExecutorError;
use crate::language::Language;
use crate::pipeline::types::ExecutionResult;

/// Runs source code in an external sandbox.
///
/// Ordinary failures (timeouts, connection errors, non-2xx responses,
/// malformed bodies) are reported as an `Ok` result with
/// `had_http_failure` set. `Err` is reserved for conditions the caller
/// cannot reasonably continue from.
#[async_trait]
pub trait SandboxExecutor: Send + Sync {
    async fn execute(
        &self,
        code: &str,
        language: Language,
        stdin: &str,
    ) -> Result<ExecutionResult, ExecutorError>;
}
