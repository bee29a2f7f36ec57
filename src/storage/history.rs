//! The persistence seam used by the pipeline service.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::database::DatabaseError;
use crate::pipeline::request::PipelineRequest;
use crate::pipeline::types::PipelineResult;

/// Append-only store for finished runs.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Writes one run (question, iterations, test case results) and returns
    /// the id of the question row. Either everything is written or nothing.
    async fn save_run(
        &self,
        request: &PipelineRequest,
        result: &PipelineResult,
    ) -> Result<Uuid, DatabaseError>;
}

/// A run as kept by [`InMemoryHistoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRun {
    pub request: PipelineRequest,
    pub result: PipelineResult,
}

/// Process-local store, for tests and runs without a database.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    runs: Mutex<HashMap<Uuid, StoredRun>>,
    fail_writes: bool,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every write fails.
    pub fn failing() -> Self {
        Self {
            runs: Mutex::default(),
            fail_writes: true,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<StoredRun> {
        self.runs.lock().ok()?.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.runs.lock().map(|runs| runs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn save_run(
        &self,
        request: &PipelineRequest,
        result: &PipelineResult,
    ) -> Result<Uuid, DatabaseError> {
        if self.fail_writes {
            return Err(DatabaseError::ConnectionFailed(
                "in-memory store configured to fail".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let mut runs = self
            .runs
            .lock()
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
        runs.insert(
            id,
            StoredRun {
                request: request.clone(),
                result: result.clone(),
            },
        );
        Ok(id)
    }
}
