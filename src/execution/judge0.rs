//! Judge0 submission client.
//!
//! Submissions are synchronous (`wait=true`) and unencoded
//! (`base64_encoded=false`), so one POST returns the finished run.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::SandboxExecutor;
use crate::error::ExecutorError;
use crate::language::Language;
use crate::metrics::{
    MetricsCollector, EXECUTION_STATUS_HTTP_FAILURE, EXECUTION_STATUS_OK,
    EXECUTION_STATUS_REJECTED,
};
use crate::pipeline::types::ExecutionResult;

/// Largest source file accepted for submission.
pub const MAX_SOURCE_BYTES: usize = 1024 * 1024;

/// Largest stdin accepted for submission.
pub const MAX_STDIN_BYTES: usize = 10 * 1024 * 1024;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Judge0 language id for each supported language.
pub fn judge0_language_id(language: Language) -> u32 {
    match language {
        Language::Python => 71,
        Language::Cpp => 54,
        Language::C => 50,
        Language::JavaScript => 63,
        Language::Java => 62,
        Language::Ruby => 72,
        Language::Rust => 73,
        Language::R => 80,
        Language::Go => 60,
        Language::Swift => 83,
        Language::TypeScript => 74,
        Language::Php => 68,
    }
}

#[derive(Debug, Serialize)]
struct SubmissionRequest<'a> {
    source_code: &'a str,
    language_id: u32,
    stdin: &'a str,
}

/// Finished submission as returned by Judge0. Any field may be null.
#[derive(Debug, Default, Deserialize)]
struct SubmissionResponse {
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    compile_output: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    time: Option<Scalar>,
    #[serde(default)]
    memory: Option<Scalar>,
    #[serde(default)]
    status: Option<SubmissionStatus>,
}

#[derive(Debug, Deserialize)]
struct SubmissionStatus {
    id: u32,
    #[serde(default)]
    description: String,
}

/// Judge0 versions disagree on whether numbers are quoted.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    fn as_text(&self) -> String {
        match self {
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Scalar::Text(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        }
    }
}

// Judge0 status ids: 1 In Queue, 2 Processing, 3 Accepted.
const STATUS_ACCEPTED: u32 = 3;

impl SubmissionResponse {
    fn into_execution_result(self) -> ExecutionResult {
        let mut stderr = self.stderr.unwrap_or_default();

        // Time limits and sandbox errors carry no stderr; surface the verdict.
        if stderr.trim().is_empty() {
            if let Some(status) = self.status.as_ref().filter(|s| s.id > STATUS_ACCEPTED) {
                stderr = match self.message.as_deref().filter(|m| !m.is_empty()) {
                    Some(message) => format!("{}: {}", status.description, message),
                    None => status.description.clone(),
                };
            }
        }

        ExecutionResult {
            stdout: self.stdout.unwrap_or_default(),
            stderr,
            compiler_diagnostics: self.compile_output.unwrap_or_default(),
            wall_time: self
                .time
                .as_ref()
                .map(Scalar::as_text)
                .unwrap_or_else(|| "0".to_string()),
            memory: self.memory.as_ref().and_then(Scalar::as_i64).unwrap_or(0),
            had_http_failure: false,
        }
    }
}

/// HTTP client for a Judge0 instance.
pub struct Judge0Client {
    base_url: String,
    auth_token: Option<String>,
    http_client: Client,
    metrics: MetricsCollector,
}

impl Judge0Client {
    /// Create a client for the Judge0 instance at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError::ClientBuild` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ExecutorError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutorError::ClientBuild(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
            http_client,
            metrics: MetricsCollector::new(),
        })
    }

    /// Sends `token` as `X-Auth-Token` on every submission.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn submissions_url(&self) -> String {
        format!("{}/submissions/?base64_encoded=false&wait=true", self.base_url)
    }

    async fn submit(&self, request: &SubmissionRequest<'_>) -> Result<ExecutionResult, String> {
        let mut http_request = self.http_client.post(self.submissions_url()).json(request);

        if let Some(ref token) = self.auth_token {
            http_request = http_request.header("X-Auth-Token", token);
        }

        let response = http_request.send().await.map_err(|e| {
            if e.is_timeout() {
                format!("Execution timed out: {}", e)
            } else {
                format!("Execution request failed: {}", e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!(
                "HTTP Error: {} {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            ));
        }

        let body: SubmissionResponse = response
            .json()
            .await
            .map_err(|e| format!("Malformed execution response: {}", e))?;

        Ok(body.into_execution_result())
    }
}

#[async_trait]
impl SandboxExecutor for Judge0Client {
    async fn execute(
        &self,
        code: &str,
        language: Language,
        stdin: &str,
    ) -> Result<ExecutionResult, ExecutorError> {
        if code.len() > MAX_SOURCE_BYTES || stdin.len() > MAX_STDIN_BYTES {
            tracing::warn!(
                language = %language,
                source_bytes = code.len(),
                stdin_bytes = stdin.len(),
                "Submission rejected: size limit exceeded"
            );
            self.metrics
                .record_execution(language.identifier(), EXECUTION_STATUS_REJECTED, 0.0);
            return Ok(ExecutionResult::transport_failure(format!(
                "Submission rejected: source must be at most {} bytes and stdin at most {} bytes",
                MAX_SOURCE_BYTES, MAX_STDIN_BYTES
            )));
        }

        let request = SubmissionRequest {
            source_code: code,
            language_id: judge0_language_id(language),
            stdin,
        };

        let start = Instant::now();
        let outcome = self.submit(&request).await;
        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            Ok(result) => {
                self.metrics
                    .record_execution(language.identifier(), EXECUTION_STATUS_OK, elapsed);
                tracing::debug!(
                    language = %language,
                    wall_time = %result.wall_time,
                    memory = result.memory,
                    "Execution finished"
                );
                Ok(result)
            }
            Err(message) => {
                self.metrics.record_execution(
                    language.identifier(),
                    EXECUTION_STATUS_HTTP_FAILURE,
                    elapsed,
                );
                tracing::warn!(language = %language, error = %message, "Execution failed");
                Ok(ExecutionResult::transport_failure(message))
            }
        }
    }
}
