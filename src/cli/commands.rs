//! CLI command definitions for code-refinery.
//!
//! This module provides a command-line interface for running the refinement
//! pipeline once, listing supported languages and applying the database
//! schema.

use crate::execution::{judge0_language_id, Judge0Client, SandboxExecutor, ThrottledExecutor};
use crate::language::Language;
use crate::llm::LiteLlmClient;
use crate::metrics::{export_metrics, init_metrics};
use crate::pipeline::{PipelineConfig, PipelineRequest, PipelineResponse, Refinery, TestCase};
use crate::storage::Database;
use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Iterative LLM code generation judged on a Judge0 sandbox.
#[derive(Parser)]
#[command(name = "code-refinery")]
#[command(about = "Generate, execute and refine solutions to coding problems")]
#[command(version)]
#[command(
    long_about = "code-refinery asks an LLM for a solution to a coding problem, runs it against test cases on a Judge0 sandbox and feeds failures back until every test passes or the iteration budget is spent.\n\nExample usage:\n  code-refinery run --language python --question \"Print the sum of two integers\" --input \"2 3\""
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the refinement pipeline on one problem.
    Run(RunArgs),

    /// List supported languages and their Judge0 ids.
    #[command(alias = "langs")]
    Languages(LanguagesArgs),

    /// Apply the database schema to DATABASE_URL.
    Migrate(MigrateArgs),
}

/// Arguments for `code-refinery run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Target language (e.g. python, cpp, rust).
    #[arg(short = 'L', long)]
    pub language: String,

    /// Problem statement.
    #[arg(short, long)]
    pub question: String,

    /// Additional explanation of the problem.
    #[arg(short, long, default_value = "")]
    pub explanation: String,

    /// Stdin for the diagnostic run.
    #[arg(short, long, default_value = "")]
    pub input: String,

    /// JSON or YAML file of test cases; synthesized by the model when omitted.
    #[arg(short, long)]
    pub tests: Option<PathBuf>,

    /// Model to use (must be in REFINERY_ALLOWED_MODELS).
    #[arg(short, long)]
    pub model: Option<String>,

    /// Refinement budget (defaults to REFINERY_MAX_ITERATIONS).
    #[arg(short = 'n', long)]
    pub max_iterations: Option<u32>,

    /// Persist the run to DATABASE_URL.
    #[arg(long)]
    pub persist: bool,

    /// Also write the result JSON to this file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print Prometheus metrics to stderr after the run.
    #[arg(long)]
    pub print_metrics: bool,
}

/// Arguments for `code-refinery languages`.
#[derive(Parser, Debug)]
pub struct LanguagesArgs {
    /// Output JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `code-refinery migrate`.
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
}

/// Parse CLI arguments and return the Cli struct.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// For more control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_pipeline_command(args).await,
        Commands::Languages(args) => run_languages_command(args),
        Commands::Migrate(args) => run_migrate_command(args).await,
    }
}

// ============================================================================
// Run Command Implementation
// ============================================================================

async fn run_pipeline_command(args: RunArgs) -> anyhow::Result<()> {
    let config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;

    if args.print_metrics {
        init_metrics().context("Failed to initialize metrics")?;
    }

    let test_cases = match args.tests.as_deref() {
        Some(path) => load_test_cases(path)?,
        None => Vec::new(),
    };

    let mut request = PipelineRequest::new(&args.language, &args.question)
        .with_explanation(&args.explanation)
        .with_user_input(&args.input)
        .with_test_cases(test_cases);
    if let Some(model) = args.model.as_deref() {
        request = request.with_model(model);
    }
    if let Some(max) = args.max_iterations {
        request = request.with_max_iterations(max);
    }

    let api_key = config.require_llm_api_key()?.to_string();
    let provider = Arc::new(
        LiteLlmClient::new(&config.llm_api_base, Some(api_key), &config.default_model)
            .context("Failed to build LLM client")?,
    );

    let mut judge0 = Judge0Client::new(&config.judge0_url, config.execution_timeout)
        .context("Failed to build Judge0 client")?;
    if let Some(token) = config.judge0_auth_token.as_deref() {
        judge0 = judge0.with_auth_token(token);
    }
    let executor: Arc<dyn SandboxExecutor> = Arc::new(ThrottledExecutor::new(
        Arc::new(judge0),
        config.max_concurrent_executions,
    ));

    let database_url = config.database_url.clone();
    let mut refinery = Refinery::new(config, provider, executor);

    if args.persist {
        let url = database_url
            .context("--persist requires DATABASE_URL to be set")?;
        let db = Database::connect(&url)
            .await
            .context("Failed to connect to database")?;
        db.run_migrations().await.context("Failed to apply schema")?;
        refinery = refinery.with_store(Arc::new(db));
    }

    info!(language = %args.language, "Starting pipeline");

    let response = tokio::select! {
        response = refinery.run_pipeline(&request) => response?,
        _ = tokio::signal::ctrl_c() => {
            anyhow::bail!("Interrupted before the pipeline finished");
        }
    };

    let json_output = render_response(&response)?;
    println!("{}", json_output);

    if let Some(path) = args.output.as_deref() {
        fs::write(path, &json_output)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Wrote result");
    }

    if args.print_metrics {
        eprintln!("{}", export_metrics());
    }

    if !response.success {
        if let Some(err) = response.result.error.as_deref() {
            warn!(error = %err, "Pipeline stopped early");
        }
        anyhow::bail!(
            "No passing solution after {} iteration(s)",
            response.result.iteration_count
        );
    }

    Ok(())
}

/// Pretty JSON for stdout and `--output`.
fn render_response(response: &PipelineResponse) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(response)?)
}

/// Accepted test-case file layouts: a bare list or `{test_cases: [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum TestCaseFile {
    List(Vec<TestCase>),
    Wrapped(WrappedTestCases),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WrappedTestCases {
    test_cases: Vec<TestCase>,
}

/// Loads test cases from a `.json`, `.yaml` or `.yml` file.
pub fn load_test_cases(path: &Path) -> anyhow::Result<Vec<TestCase>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let parsed: TestCaseFile = match extension.as_str() {
        "json" => serde_json::from_str(&content)
            .with_context(|| format!("Invalid test case JSON in {}", path.display()))?,
        "yaml" | "yml" => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid test case YAML in {}", path.display()))?,
        other => anyhow::bail!(
            "Unsupported test case file extension '{}' (expected json, yaml or yml)",
            other
        ),
    };

    let cases = match parsed {
        TestCaseFile::List(cases) => cases,
        TestCaseFile::Wrapped(wrapped) => wrapped.test_cases,
    };

    if cases.is_empty() {
        anyhow::bail!("{} contains no test cases", path.display());
    }

    Ok(cases)
}

// ============================================================================
// Languages Command Implementation
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct LanguageEntry {
    identifier: &'static str,
    name: &'static str,
    judge0_id: u32,
}

fn language_entries() -> Vec<LanguageEntry> {
    Language::all()
        .iter()
        .map(|language| LanguageEntry {
            identifier: language.identifier(),
            name: language.display_name(),
            judge0_id: judge0_language_id(*language),
        })
        .collect()
}

fn run_languages_command(args: LanguagesArgs) -> anyhow::Result<()> {
    let entries = language_entries();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in entries {
        println!("{:<12} {:<12} {}", entry.identifier, entry.name, entry.judge0_id);
    }
    Ok(())
}

// ============================================================================
// Migrate Command Implementation
// ============================================================================

async fn run_migrate_command(args: MigrateArgs) -> anyhow::Result<()> {
    let db = Database::connect(&args.database_url)
        .await
        .context("Failed to connect to database")?;
    db.run_migrations().await.context("Migration failed")?;

    println!("✓ Schema is up to date");
    Ok(())
}
