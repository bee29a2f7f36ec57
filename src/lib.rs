//! code-refinery: iterative LLM code generation judged on a sandbox.
//!
//! This library asks a language model for a solution to a coding problem,
//! runs the candidate on a Judge0 sandbox against input/output test cases and
//! feeds failures back to the model until every test passes or the iteration
//! budget is spent.

// Core modules
pub mod cli;
pub mod error;
pub mod execution;
pub mod generator;
pub mod language;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod prompts;
pub mod storage;
pub mod utils;

// Re-export commonly used error types
pub use error::{ExecutorError, FormatError, LlmError};
pub use generator::GeneratorError;
pub use pipeline::{ConfigError, PipelineError};
pub use storage::DatabaseError;

// Re-export the main entry points
pub use language::Language;
pub use pipeline::{
    PipelineConfig, PipelineRequest, PipelineResponse, PipelineResult, ProblemStatement,
    RefinementLoop, Refinery, TestCase,
};
