//! Candidate generation.
//!
//! The refinement loop talks to the language model only through the
//! [`CandidateGenerator`] trait:
//!
//! 1. **generate_initial** - first candidate for a problem, as raw reply text
//! 2. **refine** - corrected candidate given the previous code and its results
//! 3. **synthesize_tests** - test cases for a problem that has none
//!
//! Replies are returned unparsed; the loop validates them with
//! [`parse_response`](crate::pipeline::response::parse_response).

pub mod llm;
pub mod test_cases;

pub use llm::LlmCandidateGenerator;
pub use test_cases::parse_test_cases;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::LlmError;
use crate::pipeline::types::{ProblemStatement, TestCase, TestCaseResult};
use crate::prompts::PromptError;

/// Errors raised by a candidate generator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Prompt rendering failed: {0}")]
    Prompt(#[from] PromptError),

    #[error("Invalid test cases from generator: {0}")]
    InvalidTestCases(String),
}

/// Result type alias for generator operations.
pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Produces candidate solutions and test cases for a problem.
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    /// Returns the raw reply proposing a first solution.
    async fn generate_initial(
        &self,
        problem: &ProblemStatement,
        test_cases: &[TestCase],
    ) -> Result<String>;

    /// Returns the raw reply proposing a fix for `code`.
    async fn refine(
        &self,
        problem: &ProblemStatement,
        code: &str,
        test_cases: &[TestCase],
        results: &[TestCaseResult],
    ) -> Result<String>;

    /// Proposes a validated, non-empty set of test cases.
    async fn synthesize_tests(&self, problem: &ProblemStatement) -> Result<Vec<TestCase>>;
}
