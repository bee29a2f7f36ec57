//! Command-line interface for code-refinery.
//!
//! Provides commands for running the pipeline, listing supported languages
//! and applying the database schema.

mod commands;

pub use commands::{load_test_cases, parse_cli, run, run_with_cli, Cli, Commands};
