//! Pipeline configuration.
//!
//! Covers the refinement budget, model selection and sampling, the LLM
//! endpoint, the Judge0 sandbox and optional persistence.

use std::time::Duration;
use thiserror::Error;

use crate::execution::judge0::DEFAULT_TIMEOUT;
use crate::generator::llm::{DEFAULT_TEMPERATURE, DEFAULT_TOP_P};
use crate::llm::{DEFAULT_API_BASE, DEFAULT_MODEL};

/// Models accepted by default (the Groq chat models).
pub const DEFAULT_ALLOWED_MODELS: &[&str] = &[
    "llama-3.3-70b-versatile",
    "llama-3.1-8b-instant",
    "llama-3.2-3b-preview",
    "llama-3.1-70b-versatile",
    "llama3-70b-8192",
    "mixtral-8x7b-32768",
    "gemma2-9b-it",
];

/// Default refinement budget.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for a refinement pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    // Refinement settings
    /// Maximum number of generate/execute/compare passes per run.
    pub max_iterations: u32,

    // LLM settings
    /// Model used when a request does not name one.
    pub default_model: String,
    /// Models a request may select.
    pub allowed_models: Vec<String>,
    /// Sampling temperature for generation.
    pub temperature: f64,
    /// Nucleus sampling parameter for generation.
    pub top_p: f64,
    /// Base URL of the OpenAI-compatible API.
    pub llm_api_base: String,
    /// Bearer token for the LLM API.
    pub llm_api_key: Option<String>,

    // Sandbox settings
    /// Base URL of the Judge0 instance.
    pub judge0_url: String,
    /// Optional `X-Auth-Token` for the Judge0 instance.
    pub judge0_auth_token: Option<String>,
    /// Timeout for a single sandbox call.
    pub execution_timeout: Duration,
    /// Maximum sandbox calls in flight across all runs.
    pub max_concurrent_executions: usize,

    // Storage settings
    /// PostgreSQL connection URL; persistence is disabled when absent.
    pub database_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,

            default_model: DEFAULT_MODEL.to_string(),
            allowed_models: DEFAULT_ALLOWED_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            llm_api_base: DEFAULT_API_BASE.to_string(),
            llm_api_key: None,

            judge0_url: "http://localhost:2358".to_string(),
            judge0_auth_token: None,
            execution_timeout: DEFAULT_TIMEOUT,
            max_concurrent_executions: 4,

            database_url: None,
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `REFINERY_MAX_ITERATIONS`: Refinement budget (default: 3)
    /// - `REFINERY_DEFAULT_MODEL`: Default model (default: llama-3.3-70b-versatile)
    /// - `REFINERY_ALLOWED_MODELS`: Comma-separated model allow-list
    /// - `REFINERY_TEMPERATURE`: Sampling temperature (default: 0.1)
    /// - `REFINERY_TOP_P`: Nucleus sampling (default: 0.1)
    /// - `LLM_API_BASE`: OpenAI-compatible base URL (default: Groq)
    /// - `LLM_API_KEY`: LLM bearer token
    /// - `JUDGE0_API_URL`: Judge0 base URL (default: http://localhost:2358)
    /// - `JUDGE0_AUTH_TOKEN`: Judge0 auth token
    /// - `REFINERY_EXECUTION_TIMEOUT_SECS`: Sandbox call timeout (default: 30)
    /// - `REFINERY_MAX_CONCURRENT_EXECUTIONS`: Sandbox concurrency (default: 4)
    /// - `DATABASE_URL`: PostgreSQL connection URL
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the
    /// resulting configuration does not validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("REFINERY_MAX_ITERATIONS") {
            config.max_iterations = parse_env_value(&val, "REFINERY_MAX_ITERATIONS")?;
        }

        // LLM settings
        if let Some(val) = lookup("REFINERY_DEFAULT_MODEL") {
            config.default_model = val.trim().to_string();
        }

        if let Some(val) = lookup("REFINERY_ALLOWED_MODELS") {
            config.allowed_models = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(val) = lookup("REFINERY_TEMPERATURE") {
            config.temperature = parse_env_value(&val, "REFINERY_TEMPERATURE")?;
        }

        if let Some(val) = lookup("REFINERY_TOP_P") {
            config.top_p = parse_env_value(&val, "REFINERY_TOP_P")?;
        }

        if let Some(val) = lookup("LLM_API_BASE") {
            config.llm_api_base = val;
        }

        config.llm_api_key = lookup("LLM_API_KEY").filter(|v| !v.is_empty());

        // Sandbox settings
        if let Some(val) = lookup("JUDGE0_API_URL") {
            config.judge0_url = val;
        }

        config.judge0_auth_token = lookup("JUDGE0_AUTH_TOKEN").filter(|v| !v.is_empty());

        if let Some(val) = lookup("REFINERY_EXECUTION_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "REFINERY_EXECUTION_TIMEOUT_SECS")?;
            config.execution_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("REFINERY_MAX_CONCURRENT_EXECUTIONS") {
            config.max_concurrent_executions =
                parse_env_value(&val, "REFINERY_MAX_CONCURRENT_EXECUTIONS")?;
        }

        // Storage settings
        config.database_url = lookup("DATABASE_URL").filter(|v| !v.is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_iterations must be greater than 0".to_string(),
            ));
        }

        // LLM validation
        if self.allowed_models.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "allowed_models cannot be empty".to_string(),
            ));
        }

        if !self.is_model_allowed(&self.default_model) {
            return Err(ConfigError::ValidationFailed(format!(
                "default_model '{}' is not in allowed_models",
                self.default_model
            )));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConfigError::ValidationFailed(
                "top_p must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.llm_api_base.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "llm_api_base cannot be empty".to_string(),
            ));
        }

        // Sandbox validation
        if self.judge0_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "judge0_url cannot be empty".to_string(),
            ));
        }

        if self.execution_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "execution_timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_executions == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrent_executions must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether `model` is in the allow-list.
    pub fn is_model_allowed(&self, model: &str) -> bool {
        self.allowed_models.iter().any(|m| m == model)
    }

    /// Returns the LLM API key or an error naming the missing variable.
    pub fn require_llm_api_key(&self) -> Result<&str, ConfigError> {
        self.llm_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("LLM_API_KEY".to_string()))
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_allowed_models(mut self, models: Vec<String>) -> Self {
        self.allowed_models = models;
        self
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_llm_api_base(mut self, url: impl Into<String>) -> Self {
        self.llm_api_base = url.into();
        self
    }

    pub fn with_llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.llm_api_key = Some(key.into());
        self
    }

    pub fn with_judge0_url(mut self, url: impl Into<String>) -> Self {
        self.judge0_url = url.into();
        self
    }

    pub fn with_judge0_auth_token(mut self, token: impl Into<String>) -> Self {
        self.judge0_auth_token = Some(token.into());
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_executions(mut self, max: usize) -> Self {
        self.max_concurrent_executions = max;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }
}

fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
