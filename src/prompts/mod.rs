//! LLM prompts for the refinement loop.
//!
//! # Usage
//!
//! ```
//! use code_refinery::language::Language;
//! use code_refinery::pipeline::types::{ProblemStatement, TestCase};
//! use code_refinery::prompts::{build_initial_prompt, PromptContext};
//!
//! let problem = ProblemStatement::new("Add two numbers.", Language::Python);
//! let cases = vec![TestCase::new("2 3", "5")];
//! let prompt = build_initial_prompt(&PromptContext::new(&problem, &cases))
//!     .expect("template renders");
//! assert!(prompt.user.contains("Add two numbers."));
//! ```

pub mod refinement;

pub use refinement::{
    build_initial_prompt, build_refine_prompt, build_test_synthesis_prompt, CodePrompt,
    PromptContext, PromptError, RefinementContext, SYNTHESIZED_TEST_COUNT,
};
