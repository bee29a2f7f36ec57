//! Concurrency limit around a sandbox executor.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::SandboxExecutor;
use crate::error::ExecutorError;
use crate::language::Language;
use crate::pipeline::types::ExecutionResult;

/// Wraps an executor so at most N calls are in flight at once.
///
/// Clones share the same permits, so one `ThrottledExecutor` handed to many
/// concurrent runs enforces a single quota across all of them.
#[derive(Clone)]
pub struct ThrottledExecutor {
    inner: Arc<dyn SandboxExecutor>,
    permits: Arc<Semaphore>,
}

impl ThrottledExecutor {
    /// Limits `inner` to `max_concurrent` simultaneous calls (at least one).
    pub fn new(inner: Arc<dyn SandboxExecutor>, max_concurrent: usize) -> Self {
        Self::with_semaphore(inner, Arc::new(Semaphore::new(max_concurrent.max(1))))
    }

    /// Uses an existing semaphore, e.g. one shared with other executors.
    pub fn with_semaphore(inner: Arc<dyn SandboxExecutor>, permits: Arc<Semaphore>) -> Self {
        Self { inner, permits }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl SandboxExecutor for ThrottledExecutor {
    async fn execute(
        &self,
        code: &str,
        language: Language,
        stdin: &str,
    ) -> Result<ExecutionResult, ExecutorError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ExecutorError::PermitUnavailable(e.to_string()))?;

        self.inner.execute(code, language, stdin).await
    }
}
