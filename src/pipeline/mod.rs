//! The generate, execute, compare, refine pipeline.
//!
//! # Architecture
//!
//! - **Refinement loop** ([`RefinementLoop`]): drives one run through at most
//!   `max_iterations` passes and returns a [`PipelineResult`]
//! - **Response parser** ([`parse_response`]): validates the
//!   `CHAIN_OF_THOUGHT:` / `CODE:` reply grammar
//! - **Comparator** ([`outputs_match`]): layered output equivalence
//! - **Service** ([`Refinery`]): request validation, model selection and
//!   persistence around the loop
//! - **Config** ([`PipelineConfig`]): environment-driven settings
//!
//! # Pipeline Flow
//!
//! 1. **Validation**: language, model and budget are checked before any call
//! 2. **Test synthesis**: only when the request carries no test cases
//! 3. **Generation**: the generator produces a first candidate
//! 4. **Execution**: one diagnostic run, then every test case in order
//! 5. **Judgement**: outputs are compared; all passing ends the run
//! 6. **Refinement**: failing results are fed back until the budget is spent
//! 7. **Storage**: the finished run is persisted when a store is attached
//!
//! # Example
//!
//! ```rust,ignore
//! use code_refinery::pipeline::{PipelineConfig, PipelineRequest, Refinery};
//! use code_refinery::execution::Judge0Client;
//! use code_refinery::llm::LiteLlmClient;
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::from_env()?;
//! let provider = Arc::new(LiteLlmClient::from_env()?);
//! let executor = Arc::new(Judge0Client::new(&config.judge0_url, config.execution_timeout)?);
//!
//! let refinery = Refinery::new(config, provider, executor);
//! let request = PipelineRequest::new("python", "Print the sum of two integers")
//!     .with_user_input("2 3");
//!
//! let response = refinery.run_pipeline(&request).await?;
//! println!("{}", response.result.final_code);
//! ```

pub mod config;
pub mod normalize;
pub mod refinement;
pub mod request;
pub mod response;
pub mod types;

pub use config::{ConfigError, PipelineConfig, DEFAULT_ALLOWED_MODELS, DEFAULT_MAX_ITERATIONS};
pub use normalize::{equivalent, normalize, outputs_match};
pub use refinement::{PipelineError, RefinementLoop};
pub use request::{validate_request, PipelineRequest, PipelineResponse, Refinery, ValidatedRequest};
pub use response::{parse_response, ParsedResponse, CODE_MARKER, REASONING_MARKER};
pub use types::{
    ExecutionResult, IterationRecord, PipelineResult, ProblemStatement, TestCase, TestCaseResult,
};
