//! Data model for a refinement run.
//!
//! Every value here is produced once and never mutated afterwards: test cases
//! are fixed for the lifetime of a run, execution results are produced fresh
//! per sandbox call and iteration records are only ever appended.

use serde::{Deserialize, Serialize};

use super::normalize::outputs_match;
use crate::language::Language;

/// The coding problem a run is trying to solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemStatement {
    /// Natural-language question text.
    pub question: String,
    /// Free-form explanation accompanying the question.
    pub explanation: String,
    /// Target language for generated code.
    pub language: Language,
    /// Free-form input used for the diagnostic run.
    pub example_input: Option<String>,
}

impl ProblemStatement {
    /// Creates a problem statement with an empty explanation and no example input.
    pub fn new(question: impl Into<String>, language: Language) -> Self {
        Self {
            question: question.into(),
            explanation: String::new(),
            language,
            example_input: None,
        }
    }

    /// Sets the explanation.
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Sets the example input.
    pub fn with_example_input(mut self, input: impl Into<String>) -> Self {
        self.example_input = Some(input.into());
        self
    }

    /// Stdin for the diagnostic run; empty when no example input was given.
    pub fn diagnostic_input(&self) -> &str {
        self.example_input.as_deref().unwrap_or("")
    }
}

/// One input/expected-output pair.
///
/// An absent `expected_output` only checks that the program runs; such a case
/// can never pass. An empty string is a real expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    pub input: String,
    #[serde(default)]
    pub expected_output: Option<String>,
}

impl TestCase {
    /// Creates a test case with an expected output.
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: Some(expected_output.into()),
        }
    }

    /// Creates a test case that has no expected output.
    pub fn without_expectation(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: None,
        }
    }
}

/// Outcome of a single sandbox call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub compiler_diagnostics: String,
    /// Wall time as reported by the sandbox (seconds, kept verbatim).
    pub wall_time: String,
    /// Peak memory in kilobytes.
    pub memory: i64,
    /// Set when the call failed at the transport level and the other fields
    /// are placeholders.
    pub had_http_failure: bool,
}

impl ExecutionResult {
    /// Builds the placeholder result for a failed sandbox call.
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
            compiler_diagnostics: String::new(),
            wall_time: "0".to_string(),
            memory: 0,
            had_http_failure: true,
        }
    }
}

/// Result of running the candidate against one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub input: String,
    pub expected_output: Option<String>,
    pub actual_output: String,
    pub stderr: String,
    pub compiler_diagnostics: String,
    pub wall_time: String,
    pub memory: i64,
    pub passed: bool,
}

impl TestCaseResult {
    /// Judges an execution against its test case.
    ///
    /// `passed` is always derived from the comparator here; there is no other
    /// way to build a result.
    pub fn evaluate(test_case: &TestCase, execution: ExecutionResult) -> Self {
        let passed = outputs_match(&execution.stdout, test_case.expected_output.as_deref());

        Self {
            input: test_case.input.clone(),
            expected_output: test_case.expected_output.clone(),
            actual_output: execution.stdout,
            stderr: execution.stderr,
            compiler_diagnostics: execution.compiler_diagnostics,
            wall_time: execution.wall_time,
            memory: execution.memory,
            passed,
        }
    }
}

/// One pass of generate-or-refine, execute, compare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based pass number.
    pub iteration_number: u32,
    pub reasoning_trace: Vec<String>,
    pub code: String,
    /// Diagnostic run against the example input; absent if the pass failed
    /// before reaching it.
    pub primary_execution: Option<ExecutionResult>,
    pub test_results: Vec<TestCaseResult>,
    /// Set when the pass terminated the run with an error.
    pub error: Option<String>,
}

impl IterationRecord {
    /// True when the pass completed, produced results and all of them passed.
    pub fn all_passed(&self) -> bool {
        self.error.is_none()
            && !self.test_results.is_empty()
            && self.test_results.iter().all(|r| r.passed)
    }

    /// Number of failing test results.
    pub fn failed_count(&self) -> usize {
        self.test_results.iter().filter(|r| !r.passed).count()
    }
}

/// Terminal value of a refinement run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub reasoning_trace: Vec<String>,
    pub final_code: String,
    pub final_execution: Option<ExecutionResult>,
    pub test_results: Vec<TestCaseResult>,
    pub iteration_count: u32,
    pub history: Vec<IterationRecord>,
    pub success: bool,
    /// The test cases replayed on every pass (supplied or synthesized).
    pub test_cases: Vec<TestCase>,
    /// Why the run stopped early, if it did.
    pub error: Option<String>,
}

impl PipelineResult {
    /// Builds the result from the history. Derives `iteration_count` and
    /// `success` so they cannot disagree with it.
    pub fn from_history(
        history: Vec<IterationRecord>,
        test_cases: Vec<TestCase>,
        error: Option<String>,
    ) -> Self {
        let last = history.last();
        let success = last.map(IterationRecord::all_passed).unwrap_or(false);

        Self {
            reasoning_trace: last.map(|r| r.reasoning_trace.clone()).unwrap_or_default(),
            final_code: last.map(|r| r.code.clone()).unwrap_or_default(),
            final_execution: last.and_then(|r| r.primary_execution.clone()),
            test_results: last.map(|r| r.test_results.clone()).unwrap_or_default(),
            iteration_count: history.len() as u32,
            history,
            success,
            test_cases,
            error,
        }
    }

    /// Number of passing results in the final iteration.
    pub fn passed_count(&self) -> usize {
        self.test_results.iter().filter(|r| r.passed).count()
    }
}
