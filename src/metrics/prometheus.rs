//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by code-refinery and
//! provides functions for initializing, registering, and exporting them.

use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{Mutex, OnceLock};

/// Global Prometheus registry for all code-refinery metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total pipeline runs, labeled by outcome and language.
pub static RUNS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Number of passes a run took before terminating.
pub static RUN_ITERATIONS: OnceLock<Histogram> = OnceLock::new();

/// Number of pipeline runs currently in flight.
pub static ACTIVE_RUNS: OnceLock<Gauge> = OnceLock::new();

/// Total sandbox executions, labeled by language and status.
pub static EXECUTIONS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Sandbox round-trip latency in seconds, labeled by language.
pub static EXECUTION_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Total generator requests, labeled by operation and status.
pub static GENERATOR_REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Generator request latency in seconds, labeled by operation.
pub static GENERATOR_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Total judged test cases, labeled by result.
pub static TEST_CASES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Later calls leave the first registry in place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    // Serializes concurrent callers so every static comes from one registry.
    let _guard = INIT_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let runs_total = CounterVec::new(
        Opts::new("code_refinery_runs_total", "Total pipeline runs"),
        &["outcome", "language"],
    )?;

    let run_iterations = Histogram::with_opts(
        HistogramOpts::new(
            "code_refinery_run_iterations",
            "Number of refinement passes per run",
        )
        .buckets(vec![1.0, 2.0, 3.0, 4.0, 5.0, 7.0, 10.0]),
    )?;

    let active_runs = Gauge::new(
        "code_refinery_active_runs",
        "Number of pipeline runs currently in flight",
    )?;

    let executions_total = CounterVec::new(
        Opts::new(
            "code_refinery_sandbox_executions_total",
            "Total sandbox executions",
        ),
        &["language", "status"],
    )?;

    let execution_latency = HistogramVec::new(
        HistogramOpts::new(
            "code_refinery_sandbox_latency_seconds",
            "Sandbox round-trip latency in seconds",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["language"],
    )?;

    let generator_requests_total = CounterVec::new(
        Opts::new(
            "code_refinery_generator_requests_total",
            "Total candidate generator requests",
        ),
        &["operation", "status"],
    )?;

    let generator_latency = HistogramVec::new(
        HistogramOpts::new(
            "code_refinery_generator_latency_seconds",
            "Candidate generator request latency in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["operation"],
    )?;

    let test_cases_total = CounterVec::new(
        Opts::new("code_refinery_test_cases_total", "Total judged test cases"),
        &["result"],
    )?;

    registry.register(Box::new(runs_total.clone()))?;
    registry.register(Box::new(run_iterations.clone()))?;
    registry.register(Box::new(active_runs.clone()))?;
    registry.register(Box::new(executions_total.clone()))?;
    registry.register(Box::new(execution_latency.clone()))?;
    registry.register(Box::new(generator_requests_total.clone()))?;
    registry.register(Box::new(generator_latency.clone()))?;
    registry.register(Box::new(test_cases_total.clone()))?;

    let _ = RUNS_TOTAL.set(runs_total);
    let _ = RUN_ITERATIONS.set(run_iterations);
    let _ = ACTIVE_RUNS.set(active_runs);
    let _ = EXECUTIONS_TOTAL.set(executions_total);
    let _ = EXECUTION_LATENCY.set(execution_latency);
    let _ = GENERATOR_REQUESTS_TOTAL.set(generator_requests_total);
    let _ = GENERATOR_LATENCY.set(generator_latency);
    let _ = TEST_CASES_TOTAL.set(test_cases_total);
    let _ = REGISTRY.set(registry);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns an explanatory comment line instead when the registry has not been
/// initialized or encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
