//! The refinement loop.
//!
//! A run moves through three states:
//!
//! - **no code**: synthesize test cases if none were supplied, then ask the
//!   generator for a first candidate
//! - **has code**: parse the reply, run the diagnostic execution, run every
//!   test case in order, judge the outputs and append an [`IterationRecord`];
//!   stop on success or when the budget is spent, otherwise ask for a
//!   refinement and go again
//! - **terminated**: build the [`PipelineResult`] from the history
//!
//! Everything happens sequentially on the caller's task. The only suspension
//! points are generator and executor calls, and nothing is retried.

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use super::response::parse_response;
use super::types::{
    IterationRecord, PipelineResult, ProblemStatement, TestCase, TestCaseResult,
};
use crate::execution::SandboxExecutor;
use crate::generator::{CandidateGenerator, GeneratorError};
use crate::metrics::MetricsCollector;

/// Errors that end a run without a [`PipelineResult`].
///
/// Every other failure still produces a result with `success == false`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The run was rejected before any network call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No test cases were supplied and synthesizing them failed.
    #[error("Test case generation failed: {0}")]
    TestSynthesis(#[source] GeneratorError),

    /// The caller cancelled the run.
    #[error("Pipeline run cancelled")]
    Cancelled,
}

/// Coordinates a candidate generator and a sandbox executor.
pub struct RefinementLoop {
    generator: Arc<dyn CandidateGenerator>,
    executor: Arc<dyn SandboxExecutor>,
    metrics: MetricsCollector,
}

/// Keeps the in-flight gauge balanced even when the run future is dropped.
struct ActiveRun<'a>(&'a MetricsCollector);

impl<'a> ActiveRun<'a> {
    fn start(metrics: &'a MetricsCollector) -> Self {
        metrics.inc_active_runs();
        Self(metrics)
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.0.dec_active_runs();
    }
}

impl RefinementLoop {
    pub fn new(
        generator: Arc<dyn CandidateGenerator>,
        executor: Arc<dyn SandboxExecutor>,
    ) -> Self {
        Self {
            generator,
            executor,
            metrics: MetricsCollector::new(),
        }
    }

    /// Runs the loop to completion.
    ///
    /// `test_cases` may be empty, in which case the generator is asked to
    /// synthesize them once. At most `max_iterations` passes are made.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Configuration`] if `max_iterations` is zero
    /// - [`PipelineError::TestSynthesis`] if test synthesis was needed and failed
    pub async fn run(
        &self,
        problem: &ProblemStatement,
        test_cases: Vec<TestCase>,
        max_iterations: u32,
    ) -> Result<PipelineResult, PipelineError> {
        if max_iterations == 0 {
            return Err(PipelineError::Configuration(
                "max_iterations must be greater than 0".to_string(),
            ));
        }

        let _active = ActiveRun::start(&self.metrics);
        let language = problem.language;

        tracing::info!(
            language = %language,
            max_iterations = max_iterations,
            supplied_tests = test_cases.len(),
            "Starting refinement run"
        );

        let test_cases = if test_cases.is_empty() {
            match self.generator.synthesize_tests(problem).await {
                Ok(cases) => cases,
                Err(e) => {
                    tracing::error!(error = %e, "Test case synthesis failed");
                    self.metrics.record_run("failed", language.identifier(), 0);
                    return Err(PipelineError::TestSynthesis(e));
                }
            }
        } else {
            test_cases
        };

        let mut history: Vec<IterationRecord> = Vec::new();
        let mut error: Option<String> = None;

        let mut reply = match self.generator.generate_initial(problem, &test_cases).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                tracing::warn!(error = %e, "Initial generation failed");
                error = Some(e.to_string());
                None
            }
        };

        let mut iteration = 1;
        while let Some(raw) = reply.take() {
            let record = self.run_pass(iteration, problem, &test_cases, &raw).await;

            if let Some(ref message) = record.error {
                tracing::warn!(iteration = iteration, error = %message, "Pass failed");
                error = Some(message.clone());
                history.push(record);
                break;
            }

            let all_passed = record.all_passed();
            tracing::info!(
                iteration = iteration,
                passed = record.test_results.len() - record.failed_count(),
                failed = record.failed_count(),
                "Pass complete"
            );
            history.push(record);

            if all_passed || iteration == max_iterations {
                break;
            }

            let Some(last) = history.last() else {
                break;
            };
            match self
                .generator
                .refine(problem, &last.code, &test_cases, &last.test_results)
                .await
            {
                Ok(next) => reply = Some(next),
                Err(e) => {
                    tracing::warn!(iteration = iteration, error = %e, "Refinement failed");
                    error = Some(e.to_string());
                }
            }
            iteration += 1;
        }

        let result = PipelineResult::from_history(history, test_cases, error);
        let outcome = if result.success {
            "success"
        } else if result.error.is_some() {
            "failed"
        } else {
            "exhausted"
        };
        self.metrics
            .record_run(outcome, language.identifier(), result.iteration_count);

        tracing::info!(
            success = result.success,
            iterations = result.iteration_count,
            outcome = outcome,
            "Refinement run finished"
        );

        Ok(result)
    }

    /// Runs the loop until it finishes or `cancel` resolves.
    ///
    /// On cancellation the in-flight call is dropped, no further pass starts,
    /// the partial history is discarded and [`PipelineError::Cancelled`] is
    /// returned.
    pub async fn run_with_cancel<C>(
        &self,
        problem: &ProblemStatement,
        test_cases: Vec<TestCase>,
        max_iterations: u32,
        cancel: C,
    ) -> Result<PipelineResult, PipelineError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                tracing::info!(language = %problem.language, "Refinement run cancelled");
                self.metrics.record_run("cancelled", problem.language.identifier(), 0);
                Err(PipelineError::Cancelled)
            }
            result = self.run(problem, test_cases, max_iterations) => result,
        }
    }

    /// One pass: parse, diagnostic run, test runs, judgement.
    ///
    /// Always returns a record. A record with `error` set ends the run.
    async fn run_pass(
        &self,
        iteration: u32,
        problem: &ProblemStatement,
        test_cases: &[TestCase],
        raw: &str,
    ) -> IterationRecord {
        let mut record = IterationRecord {
            iteration_number: iteration,
            reasoning_trace: Vec::new(),
            code: String::new(),
            primary_execution: None,
            test_results: Vec::new(),
            error: None,
        };

        let parsed = match parse_response(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                record.error = Some(e.to_string());
                return record;
            }
        };
        record.reasoning_trace = parsed.reasoning_trace;
        record.code = parsed.code;

        let language = problem.language;

        match self
            .executor
            .execute(&record.code, language, problem.diagnostic_input())
            .await
        {
            Ok(execution) => record.primary_execution = Some(execution),
            Err(e) => {
                record.error = Some(e.to_string());
                return record;
            }
        }

        for (index, case) in test_cases.iter().enumerate() {
            match self.executor.execute(&record.code, language, &case.input).await {
                Ok(execution) => {
                    let result = TestCaseResult::evaluate(case, execution);
                    tracing::debug!(
                        iteration = iteration,
                        test_case = index + 1,
                        passed = result.passed,
                        "Test case judged"
                    );
                    record.test_results.push(result);
                }
                Err(e) => {
                    record.error = Some(e.to_string());
                    return record;
                }
            }
        }

        let failed = record.failed_count();
        self.metrics
            .record_test_results(record.test_results.len() - failed, failed);

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExecutorError, LlmError};
    use crate::language::Language;
    use crate::pipeline::types::ExecutionResult;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn reply(code: &str) -> String {
        format!(
            "CHAIN_OF_THOUGHT:\n- read the numbers\n- print the sum\nCODE:\n```python\n{}\n```",
            code
        )
    }

    /// Generator returning scripted replies; an exhausted script is a
    /// transport failure.
    struct MockGenerator {
        replies: Mutex<Vec<String>>,
        synthesized: Mutex<Option<Vec<TestCase>>>,
        generate_calls: AtomicUsize,
        refine_calls: AtomicUsize,
        synthesize_calls: AtomicUsize,
        refined_code: Mutex<Vec<String>>,
    }

    impl MockGenerator {
        fn new(replies: Vec<String>) -> Self {
            Self {
                replies: Mutex::new(replies),
                synthesized: Mutex::new(None),
                generate_calls: AtomicUsize::new(0),
                refine_calls: AtomicUsize::new(0),
                synthesize_calls: AtomicUsize::new(0),
                refined_code: Mutex::new(Vec::new()),
            }
        }

        fn with_synthesized(self, cases: Vec<TestCase>) -> Self {
            *self.synthesized.lock().expect("lock") = Some(cases);
            self
        }

        fn next_reply(&self) -> crate::generator::Result<String> {
            let mut replies = self.replies.lock().expect("lock");
            if replies.is_empty() {
                return Err(LlmError::RequestFailed("connection refused".to_string()).into());
            }
            Ok(replies.remove(0))
        }
    }

    #[async_trait]
    impl CandidateGenerator for MockGenerator {
        async fn generate_initial(
            &self,
            _problem: &ProblemStatement,
            _test_cases: &[TestCase],
        ) -> crate::generator::Result<String> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            self.next_reply()
        }

        async fn refine(
            &self,
            _problem: &ProblemStatement,
            code: &str,
            _test_cases: &[TestCase],
            _results: &[TestCaseResult],
        ) -> crate::generator::Result<String> {
            self.refine_calls.fetch_add(1, Ordering::SeqCst);
            self.refined_code.lock().expect("lock").push(code.to_string());
            self.next_reply()
        }

        async fn synthesize_tests(
            &self,
            _problem: &ProblemStatement,
        ) -> crate::generator::Result<Vec<TestCase>> {
            self.synthesize_calls.fetch_add(1, Ordering::SeqCst);
            self.synthesized
                .lock()
                .expect("lock")
                .clone()
                .ok_or_else(|| GeneratorError::InvalidTestCases("no cases".to_string()))
        }
    }

    /// Executor that "runs" code by looking up (code, stdin) in a table.
    #[derive(Default)]
    struct TableExecutor {
        outputs: HashMap<(String, String), String>,
        fail_on_call: Option<usize>,
        calls: AtomicUsize,
        stdins: Mutex<Vec<String>>,
    }

    impl TableExecutor {
        fn with(mut self, code: &str, stdin: &str, stdout: &str) -> Self {
            self.outputs
                .insert((code.to_string(), stdin.to_string()), stdout.to_string());
            self
        }

        fn failing_on_call(mut self, call: usize) -> Self {
            self.fail_on_call = Some(call);
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SandboxExecutor for TableExecutor {
        async fn execute(
            &self,
            code: &str,
            _language: Language,
            stdin: &str,
        ) -> Result<ExecutionResult, ExecutorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.stdins.lock().expect("lock").push(stdin.to_string());
            if self.fail_on_call == Some(call) {
                return Err(ExecutorError::Internal("sandbox crashed".to_string()));
            }
            let stdout = self
                .outputs
                .get(&(code.to_string(), stdin.to_string()))
                .cloned()
                .unwrap_or_default();
            Ok(ExecutionResult {
                stdout,
                wall_time: "0.01".to_string(),
                memory: 1024,
                ..Default::default()
            })
        }
    }

    const CORRECT: &str = "a, b = map(int, input().split())\nprint(a + b)";
    const WRONG: &str = "a, b = map(int, input().split())\nprint(a - b)";

    fn sum_problem() -> ProblemStatement {
        ProblemStatement::new("sum of two numbers", Language::Python).with_example_input("2 3")
    }

    fn sum_cases() -> Vec<TestCase> {
        vec![TestCase::new("2 3", "5"), TestCase::new("-1 1", "0")]
    }

    fn sum_executor() -> TableExecutor {
        TableExecutor::default()
            .with(CORRECT, "2 3", "5\n")
            .with(CORRECT, "-1 1", "0\n")
            .with(WRONG, "2 3", "-1\n")
            .with(WRONG, "-1 1", "-2\n")
    }

    fn build(
        generator: MockGenerator,
        executor: TableExecutor,
    ) -> (RefinementLoop, Arc<MockGenerator>, Arc<TableExecutor>) {
        let generator = Arc::new(generator);
        let executor = Arc::new(executor);
        (
            RefinementLoop::new(generator.clone(), executor.clone()),
            generator,
            executor,
        )
    }

    #[tokio::test]
    async fn test_correct_on_first_pass() {
        let (pipeline, generator, executor) =
            build(MockGenerator::new(vec![reply(CORRECT)]), sum_executor());

        let result = pipeline
            .run(&sum_problem(), sum_cases(), 3)
            .await
            .expect("run completes");

        assert!(result.success);
        assert_eq!(result.iteration_count, 1);
        assert_eq!(result.history.len(), 1);
        assert_eq!(result.final_code, CORRECT);
        assert_eq!(
            result.reasoning_trace,
            vec!["read the numbers", "print the sum"]
        );
        assert_eq!(result.passed_count(), 2);
        assert!(result.error.is_none());
        assert_eq!(generator.refine_calls.load(Ordering::SeqCst), 0);
        // One diagnostic run plus one run per test case.
        assert_eq!(executor.calls(), 3);
        assert_eq!(
            *executor.stdins.lock().expect("lock"),
            vec!["2 3", "2 3", "-1 1"]
        );
        assert_eq!(
            result.final_execution.as_ref().map(|e| e.stdout.as_str()),
            Some("5\n")
        );
    }

    #[tokio::test]
    async fn test_fixed_on_second_pass() {
        let (pipeline, generator, _executor) = build(
            MockGenerator::new(vec![reply(WRONG), reply(CORRECT)]),
            sum_executor().with(WRONG, "-1 1", "0\n"),
        );

        let result = pipeline
            .run(&sum_problem(), sum_cases(), 3)
            .await
            .expect("run completes");

        assert!(result.success);
        assert_eq!(result.iteration_count, 2);
        assert_eq!(result.history.len(), 2);
        assert_eq!(result.history[0].failed_count(), 1);
        assert_eq!(result.history[0].iteration_number, 1);
        assert_eq!(result.history[1].iteration_number, 2);
        assert_eq!(
            *generator.refined_code.lock().expect("lock"),
            vec![WRONG.to_string()]
        );
    }

    #[tokio::test]
    async fn test_generator_unreachable() {
        let (pipeline, _generator, executor) =
            build(MockGenerator::new(vec![]), sum_executor());

        let result = pipeline
            .run(&sum_problem(), sum_cases(), 3)
            .await
            .expect("returns a degraded result");

        assert!(!result.success);
        assert!(result.history.is_empty());
        assert_eq!(result.iteration_count, 0);
        assert_eq!(executor.calls(), 0);
        assert!(result
            .error
            .as_deref()
            .is_some_and(|e| e.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let (pipeline, generator, executor) = build(
            MockGenerator::new(vec![reply(WRONG), reply(WRONG), reply(WRONG), reply(CORRECT)]),
            sum_executor(),
        );

        let result = pipeline
            .run(&sum_problem(), sum_cases(), 3)
            .await
            .expect("run completes");

        assert!(!result.success);
        assert_eq!(result.iteration_count, 3);
        assert!(result.error.is_none());
        assert_eq!(generator.refine_calls.load(Ordering::SeqCst), 2);
        assert_eq!(executor.calls(), 9);
        assert!(result.history.iter().all(|r| !r.all_passed()));
    }

    #[tokio::test]
    async fn test_iteration_count_never_exceeds_budget() {
        for budget in 1..=4 {
            let replies = (0..10).map(|_| reply(WRONG)).collect();
            let (pipeline, _, _) = build(MockGenerator::new(replies), sum_executor());

            let result = pipeline
                .run(&sum_problem(), sum_cases(), budget)
                .await
                .expect("run completes");

            assert_eq!(result.iteration_count, budget);
            assert_eq!(result.iteration_count as usize, result.history.len());
        }
    }

    #[tokio::test]
    async fn test_malformed_reply_terminates_with_record() {
        let (pipeline, generator, executor) = build(
            MockGenerator::new(vec!["Here is the code:\n```python\nprint(1)\n```".to_string()]),
            sum_executor(),
        );

        let result = pipeline
            .run(&sum_problem(), sum_cases(), 3)
            .await
            .expect("format errors do not escape");

        assert!(!result.success);
        assert_eq!(result.iteration_count, 1);
        let record = &result.history[0];
        assert!(record.code.is_empty());
        assert!(record.primary_execution.is_none());
        assert!(record.test_results.is_empty());
        assert!(record
            .error
            .as_deref()
            .is_some_and(|e| e.contains("CHAIN_OF_THOUGHT:")));
        assert_eq!(result.error, record.error);
        assert_eq!(executor.calls(), 0);
        assert_eq!(generator.refine_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_refinement_keeps_earlier_history() {
        let (pipeline, _, _) = build(
            MockGenerator::new(vec![reply(WRONG), "CODE: nothing".to_string()]),
            sum_executor(),
        );

        let result = pipeline
            .run(&sum_problem(), sum_cases(), 3)
            .await
            .expect("run completes");

        assert!(!result.success);
        assert_eq!(result.iteration_count, 2);
        assert!(result.history[0].error.is_none());
        assert!(result.history[1].error.is_some());
    }

    #[tokio::test]
    async fn test_refine_transport_failure_appends_no_record() {
        let (pipeline, _, _) = build(MockGenerator::new(vec![reply(WRONG)]), sum_executor());

        let result = pipeline
            .run(&sum_problem(), sum_cases(), 3)
            .await
            .expect("run completes");

        assert!(!result.success);
        assert_eq!(result.iteration_count, 1);
        assert_eq!(result.final_code, WRONG);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_executor_error_keeps_partial_results() {
        let (pipeline, generator, _) = build(
            MockGenerator::new(vec![reply(CORRECT)]),
            sum_executor().failing_on_call(3),
        );

        let result = pipeline
            .run(&sum_problem(), sum_cases(), 3)
            .await
            .expect("run completes");

        assert!(!result.success);
        assert_eq!(result.iteration_count, 1);
        let record = &result.history[0];
        assert!(record.primary_execution.is_some());
        assert_eq!(record.test_results.len(), 1);
        assert!(record.test_results[0].passed);
        assert!(record
            .error
            .as_deref()
            .is_some_and(|e| e.contains("sandbox crashed")));
        assert_eq!(generator.refine_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_synthesizes_tests_when_none_supplied() {
        let generator =
            MockGenerator::new(vec![reply(CORRECT)]).with_synthesized(sum_cases());
        let (pipeline, generator, _) = build(generator, sum_executor());

        let result = pipeline
            .run(&sum_problem(), vec![], 3)
            .await
            .expect("run completes");

        assert!(result.success);
        assert_eq!(result.test_cases, sum_cases());
        assert_eq!(generator.synthesize_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_synthesis_failure_is_fatal() {
        let (pipeline, generator, executor) =
            build(MockGenerator::new(vec![reply(CORRECT)]), sum_executor());

        let err = pipeline
            .run(&sum_problem(), vec![], 3)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::TestSynthesis(_)));
        assert_eq!(generator.generate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn test_supplied_tests_skip_synthesis() {
        let (pipeline, generator, _) =
            build(MockGenerator::new(vec![reply(CORRECT)]), sum_executor());

        pipeline
            .run(&sum_problem(), sum_cases(), 3)
            .await
            .expect("run completes");

        assert_eq!(generator.synthesize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_budget_rejected_before_any_call() {
        let (pipeline, generator, executor) =
            build(MockGenerator::new(vec![reply(CORRECT)]), sum_executor());

        let err = pipeline
            .run(&sum_problem(), sum_cases(), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Configuration(_)));
        assert_eq!(generator.generate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(executor.calls(), 0);
    }

    #[tokio::test]
    async fn test_absent_expectation_never_converges() {
        let (pipeline, _, _) = build(
            MockGenerator::new(vec![reply(CORRECT), reply(CORRECT)]),
            sum_executor(),
        );

        let result = pipeline
            .run(
                &sum_problem(),
                vec![TestCase::without_expectation("2 3")],
                2,
            )
            .await
            .expect("run completes");

        assert!(!result.success);
        assert_eq!(result.iteration_count, 2);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let (pipeline, generator, _) =
            build(MockGenerator::new(vec![reply(CORRECT)]), sum_executor());

        let err = pipeline
            .run_with_cancel(&sum_problem(), sum_cases(), 3, async {})
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(generator.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_uncancelled_run_completes() {
        let (pipeline, _, _) = build(MockGenerator::new(vec![reply(CORRECT)]), sum_executor());

        let result = pipeline
            .run_with_cancel(
                &sum_problem(),
                sum_cases(),
                3,
                std::future::pending::<()>(),
            )
            .await
            .expect("run completes");

        assert!(result.success);
    }
}
