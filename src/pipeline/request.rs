//! Request validation and the top-level service.
//!
//! [`Refinery`] bundles the configuration with the long-lived clients (LLM
//! provider, sandbox executor, optional history store) and turns a
//! [`PipelineRequest`] into a [`PipelineResponse`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::config::PipelineConfig;
use super::refinement::{PipelineError, RefinementLoop};
use super::types::{PipelineResult, ProblemStatement, TestCase};
use crate::execution::SandboxExecutor;
use crate::generator::llm::LlmCandidateGenerator;
use crate::language::Language;
use crate::llm::LlmProvider;
use crate::storage::HistoryStore;

/// An inbound request to run the pipeline once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineRequest {
    /// Model identifier; empty selects the configured default.
    #[serde(default)]
    pub model: String,
    /// Language identifier or alias, e.g. `python` or `c++`.
    pub language: String,
    pub question: String,
    #[serde(default)]
    pub explanation: String,
    /// Stdin for the diagnostic run; empty means none.
    #[serde(default)]
    pub user_input: String,
    /// Refinement budget; the configured value when absent.
    #[serde(default)]
    pub max_iterations: Option<u32>,
    /// Test cases; synthesized by the generator when empty.
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl PipelineRequest {
    pub fn new(language: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            model: String::new(),
            language: language.into(),
            question: question.into(),
            explanation: String::new(),
            user_input: String::new(),
            max_iterations: None,
            test_cases: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn with_user_input(mut self, input: impl Into<String>) -> Self {
        self.user_input = input.into();
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn with_test_cases(mut self, cases: Vec<TestCase>) -> Self {
        self.test_cases = cases;
        self
    }
}

/// A request after validation against the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub problem: ProblemStatement,
    pub model: String,
    pub max_iterations: u32,
}

/// Checks language, model and budget without touching the network.
///
/// # Errors
///
/// Returns [`PipelineError::Configuration`] for an unsupported language, a
/// model outside the allow-list or a zero budget.
pub fn validate_request(
    request: &PipelineRequest,
    config: &PipelineConfig,
) -> Result<ValidatedRequest, PipelineError> {
    let language: Language = request.language.parse().map_err(|_| {
        PipelineError::Configuration(format!("Unsupported language: {}", request.language))
    })?;

    let model = if request.model.trim().is_empty() {
        config.default_model.clone()
    } else {
        request.model.trim().to_string()
    };
    if !config.is_model_allowed(&model) {
        return Err(PipelineError::Configuration(format!(
            "Invalid model selected: {}",
            model
        )));
    }

    let max_iterations = request.max_iterations.unwrap_or(config.max_iterations);
    if max_iterations == 0 {
        return Err(PipelineError::Configuration(
            "max_iterations must be greater than 0".to_string(),
        ));
    }

    let mut problem = ProblemStatement::new(request.question.clone(), language)
        .with_explanation(request.explanation.clone());
    if !request.user_input.is_empty() {
        problem = problem.with_example_input(request.user_input.clone());
    }

    Ok(ValidatedRequest {
        problem,
        model,
        max_iterations,
    })
}

/// Outcome of [`Refinery::run_pipeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResponse {
    pub success: bool,
    /// Id of the persisted question row, when a store is attached and the
    /// write succeeded.
    pub question_id: Option<Uuid>,
    pub result: PipelineResult,
}

/// Runs validated requests against shared clients.
pub struct Refinery {
    config: PipelineConfig,
    provider: Arc<dyn LlmProvider>,
    executor: Arc<dyn SandboxExecutor>,
    store: Option<Arc<dyn HistoryStore>>,
}

impl Refinery {
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn LlmProvider>,
        executor: Arc<dyn SandboxExecutor>,
    ) -> Self {
        Self {
            config,
            provider,
            executor,
            store: None,
        }
    }

    /// Persists every finished run to `store`.
    pub fn with_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validates `request`, runs the refinement loop and persists the result.
    ///
    /// A failed write is logged and leaves `question_id` empty; it never
    /// changes the outcome of the run.
    pub async fn run_pipeline(
        &self,
        request: &PipelineRequest,
    ) -> Result<PipelineResponse, PipelineError> {
        let validated = validate_request(request, &self.config)?;

        tracing::info!(
            model = %validated.model,
            language = %validated.problem.language,
            max_iterations = validated.max_iterations,
            "Running pipeline request"
        );

        let generator = LlmCandidateGenerator::new(self.provider.clone(), validated.model.clone())
            .with_temperature(self.config.temperature)
            .with_top_p(self.config.top_p);
        let refinement = RefinementLoop::new(Arc::new(generator), self.executor.clone());

        let result = refinement
            .run(
                &validated.problem,
                request.test_cases.clone(),
                validated.max_iterations,
            )
            .await?;

        // Persist what actually ran, not the defaults the caller left blank
        let mut resolved = request.clone();
        resolved.model = validated.model;
        resolved.max_iterations = Some(validated.max_iterations);

        let question_id = match &self.store {
            Some(store) => match store.save_run(&resolved, &result).await {
                Ok(id) => {
                    tracing::debug!(question_id = %id, "Run persisted");
                    Some(id)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to persist run");
                    None
                }
            },
            None => None,
        };

        Ok(PipelineResponse {
            success: result.success,
            question_id,
            result,
        })
    }
}
