//! Candidate generator backed by a chat completion model.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use super::{parse_test_cases, CandidateGenerator, Result};
use crate::error::LlmError;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::metrics::MetricsCollector;
use crate::pipeline::types::{ProblemStatement, TestCase, TestCaseResult};
use crate::prompts::{
    build_initial_prompt, build_refine_prompt, build_test_synthesis_prompt, CodePrompt,
    PromptContext, RefinementContext,
};

/// Default sampling temperature; low so refinements stay close to the prior code.
pub const DEFAULT_TEMPERATURE: f64 = 0.1;

/// Default nucleus sampling parameter.
pub const DEFAULT_TOP_P: f64 = 0.1;

const MAX_TOKENS: u32 = 4096;

/// [`CandidateGenerator`] that renders prompts and sends them to an [`LlmProvider`].
pub struct LlmCandidateGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    top_p: f64,
    metrics: MetricsCollector,
}

impl LlmCandidateGenerator {
    /// Creates a generator for `model` with the default sampling parameters.
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one prompt and returns the reply text.
    async fn complete(&self, operation: &'static str, prompt: CodePrompt) -> Result<String> {
        let request = GenerationRequest::new(
            self.model.clone(),
            vec![Message::system(prompt.system), Message::user(prompt.user)],
        )
        .with_temperature(self.temperature)
        .with_top_p(self.top_p)
        .with_max_tokens(MAX_TOKENS);

        let start = Instant::now();
        let outcome = self.provider.generate(request).await;
        let elapsed = start.elapsed().as_secs_f64();

        let content = outcome.and_then(|response| {
            response
                .first_content()
                .map(str::to_string)
                .filter(|content| !content.trim().is_empty())
                .ok_or_else(|| LlmError::EmptyResponse(self.model.clone()))
        });

        self.metrics
            .record_generator_request(operation, content.is_ok(), elapsed);

        match content {
            Ok(content) => {
                tracing::debug!(
                    operation = operation,
                    model = %self.model,
                    elapsed_secs = elapsed,
                    reply_chars = content.len(),
                    "Generator replied"
                );
                Ok(content)
            }
            Err(e) => {
                tracing::warn!(operation = operation, model = %self.model, error = %e, "Generator request failed");
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl CandidateGenerator for LlmCandidateGenerator {
    async fn generate_initial(
        &self,
        problem: &ProblemStatement,
        test_cases: &[TestCase],
    ) -> Result<String> {
        let prompt = build_initial_prompt(&PromptContext::new(problem, test_cases))?;
        self.complete("generate_initial", prompt).await
    }

    async fn refine(
        &self,
        problem: &ProblemStatement,
        code: &str,
        test_cases: &[TestCase],
        results: &[TestCaseResult],
    ) -> Result<String> {
        let prompt = build_refine_prompt(&RefinementContext {
            problem: PromptContext::new(problem, test_cases),
            code,
            results,
        })?;
        self.complete("refine", prompt).await
    }

    async fn synthesize_tests(&self, problem: &ProblemStatement) -> Result<Vec<TestCase>> {
        let prompt = build_test_synthesis_prompt(&PromptContext::new(problem, &[]))?;
        let reply = self.complete("synthesize_tests", prompt).await?;
        let cases = parse_test_cases(&reply)?;

        tracing::info!(count = cases.len(), "Synthesized test cases");
        Ok(cases)
    }
}
