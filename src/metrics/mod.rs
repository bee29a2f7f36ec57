//! Metrics module for Prometheus-based monitoring.
//!
//! Tracks pipeline runs, refinement passes, sandbox executions and generator
//! requests.
//!
//! # Example
//!
//! ```ignore
//! use code_refinery::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics().expect("Failed to initialize metrics");
//!
//! let collector = MetricsCollector::new();
//! collector.record_run("success", "python", 1);
//!
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::{
    MetricsCollector, EXECUTION_STATUS_HTTP_FAILURE, EXECUTION_STATUS_OK,
    EXECUTION_STATUS_REJECTED,
};
pub use prometheus::{
    export_metrics, init_metrics, ACTIVE_RUNS, EXECUTIONS_TOTAL, EXECUTION_LATENCY,
    GENERATOR_LATENCY, GENERATOR_REQUESTS_TOTAL, REGISTRY, RUNS_TOTAL, RUN_ITERATIONS,
    TEST_CASES_TOTAL,
};
