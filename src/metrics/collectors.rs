//! High-level metric recording.
//!
//! `MetricsCollector` wraps the raw Prometheus metrics with consistent
//! labels. Every method is a no-op until [`init_metrics`](super::init_metrics)
//! has run, so library users and tests never need to set anything up.

use super::prometheus::{
    ACTIVE_RUNS, EXECUTIONS_TOTAL, EXECUTION_LATENCY, GENERATOR_LATENCY,
    GENERATOR_REQUESTS_TOTAL, RUNS_TOTAL, RUN_ITERATIONS, TEST_CASES_TOTAL,
};

/// Execution status label for a sandbox call that returned a result.
pub const EXECUTION_STATUS_OK: &str = "ok";
/// Execution status label for a call absorbed as a transport failure.
pub const EXECUTION_STATUS_HTTP_FAILURE: &str = "http_failure";
/// Execution status label for a submission rejected before sending.
pub const EXECUTION_STATUS_REJECTED: &str = "rejected";

/// Metrics collector for recording refinement pipeline metrics.
///
/// # Example
///
/// ```ignore
/// use code_refinery::metrics::{init_metrics, MetricsCollector};
///
/// init_metrics().expect("Failed to init metrics");
/// let collector = MetricsCollector::new();
/// collector.record_run("success", "python", 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record a finished pipeline run.
    ///
    /// # Arguments
    ///
    /// * `outcome` - "success", "exhausted", "failed" or "cancelled"
    /// * `language` - Target language identifier
    /// * `iterations` - Number of passes recorded in the history
    pub fn record_run(&self, outcome: &str, language: &str, iterations: u32) {
        if let Some(runs_total) = RUNS_TOTAL.get() {
            runs_total.with_label_values(&[outcome, language]).inc();
        }

        if let Some(run_iterations) = RUN_ITERATIONS.get() {
            run_iterations.observe(f64::from(iterations));
        }

        tracing::trace!(
            outcome = outcome,
            language = language,
            iterations = iterations,
            "Recorded run metric"
        );
    }

    /// Record one sandbox call.
    pub fn record_execution(&self, language: &str, status: &str, latency_secs: f64) {
        if let Some(executions_total) = EXECUTIONS_TOTAL.get() {
            executions_total.with_label_values(&[language, status]).inc();
        }

        if let Some(execution_latency) = EXECUTION_LATENCY.get() {
            execution_latency
                .with_label_values(&[language])
                .observe(latency_secs);
        }
    }

    /// Record one generator request.
    ///
    /// # Arguments
    ///
    /// * `operation` - "generate_initial", "refine" or "synthesize_tests"
    /// * `success` - Whether the request produced a reply
    /// * `latency_secs` - Request latency in seconds
    pub fn record_generator_request(&self, operation: &str, success: bool, latency_secs: f64) {
        let status = if success { "success" } else { "failure" };

        if let Some(requests_total) = GENERATOR_REQUESTS_TOTAL.get() {
            requests_total.with_label_values(&[operation, status]).inc();
        }

        if let Some(latency) = GENERATOR_LATENCY.get() {
            latency.with_label_values(&[operation]).observe(latency_secs);
        }
    }

    /// Record the judged test cases of one pass.
    pub fn record_test_results(&self, passed: usize, failed: usize) {
        if let Some(test_cases_total) = TEST_CASES_TOTAL.get() {
            test_cases_total
                .with_label_values(&["passed"])
                .inc_by(passed as f64);
            test_cases_total
                .with_label_values(&["failed"])
                .inc_by(failed as f64);
        }
    }

    pub fn inc_active_runs(&self) {
        if let Some(active_runs) = ACTIVE_RUNS.get() {
            active_runs.inc();
        }
    }

    pub fn dec_active_runs(&self) {
        if let Some(active_runs) = ACTIVE_RUNS.get() {
            active_runs.dec();
        }
    }
}
