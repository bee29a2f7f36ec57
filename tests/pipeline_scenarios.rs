//! End-to-end pipeline scenarios against scripted collaborators.
//!
//! The LLM and the sandbox are replaced by in-process mocks, so these tests
//! run offline: cargo test --test pipeline_scenarios

use async_trait::async_trait;
use code_refinery::error::{ExecutorError, LlmError};
use code_refinery::execution::{SandboxExecutor, ThrottledExecutor};
use code_refinery::language::Language;
use code_refinery::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use code_refinery::pipeline::{
    ExecutionResult, PipelineConfig, PipelineError, PipelineRequest, Refinery, TestCase,
};
use code_refinery::storage::InMemoryHistoryStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Replays scripted completions; an exhausted script is a transport failure.
struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(replies: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().expect("lock").push(prompt);

        let mut replies = self.replies.lock().expect("lock");
        if replies.is_empty() {
            return Err(LlmError::RequestFailed("connection refused".to_string()));
        }
        let content = replies.remove(0);

        Ok(GenerationResponse {
            id: "scripted".to_string(),
            model: request.model,
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        })
    }
}

/// "Runs" a program by looking its stdout up by (code, stdin).
#[derive(Default)]
struct LookupSandbox {
    programs: HashMap<(String, String), String>,
    calls: AtomicUsize,
}

impl LookupSandbox {
    fn program(mut self, code: &str, io: &[(&str, &str)]) -> Self {
        for (stdin, stdout) in io {
            self.programs
                .insert((code.to_string(), stdin.to_string()), stdout.to_string());
        }
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SandboxExecutor for LookupSandbox {
    async fn execute(
        &self,
        code: &str,
        _language: Language,
        stdin: &str,
    ) -> Result<ExecutionResult, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.programs.get(&(code.to_string(), stdin.to_string())) {
            Some(stdout) => Ok(ExecutionResult {
                stdout: stdout.clone(),
                wall_time: "0.02".to_string(),
                memory: 2048,
                ..Default::default()
            }),
            None => Ok(ExecutionResult {
                stderr: "Traceback (most recent call last)".to_string(),
                ..Default::default()
            }),
        }
    }
}

const SORTED: &str = "print(sorted(map(int, input().split())))";
const REVERSED: &str = "print(sorted(map(int, input().split()), reverse=True))";

fn reply(code: &str) -> String {
    format!(
        "CHAIN_OF_THOUGHT:\n1. parse the integers\n2. sort them\nCODE:\n```python\n{}\n```\n",
        code
    )
}

fn sandbox() -> LookupSandbox {
    LookupSandbox::default()
        .program(SORTED, &[("3 1 2", "[1, 2, 3]\n"), ("5 4", "[4, 5]\n")])
        .program(REVERSED, &[("3 1 2", "[3, 2, 1]\n"), ("5 4", "[5, 4]\n")])
}

fn sort_request() -> PipelineRequest {
    PipelineRequest::new("python", "Sort the integers on stdin and print them as a list")
        .with_user_input("3 1 2")
        .with_test_cases(vec![
            // Whitespace inside the list does not matter
            TestCase::new("3 1 2", "[1,2,3]"),
            TestCase::new("5 4", "[4,5]"),
        ])
}

fn refinery(provider: Arc<ScriptedProvider>, sandbox: Arc<LookupSandbox>) -> Refinery {
    let executor = Arc::new(ThrottledExecutor::new(sandbox, 2));
    Refinery::new(PipelineConfig::default(), provider, executor)
}

#[tokio::test]
async fn test_solved_on_first_pass() {
    let provider = ScriptedProvider::new(vec![reply(SORTED)]);
    let sandbox = Arc::new(sandbox());

    let response = refinery(provider.clone(), sandbox.clone())
        .run_pipeline(&sort_request())
        .await
        .expect("runs");

    assert!(response.success);
    assert_eq!(response.result.iteration_count, 1);
    assert_eq!(response.result.final_code, SORTED);
    assert_eq!(
        response.result.reasoning_trace,
        vec!["parse the integers", "sort them"]
    );
    assert_eq!(provider.calls(), 1);
    assert_eq!(sandbox.calls(), 3);
}

#[tokio::test]
async fn test_fixed_after_feedback() {
    let provider = ScriptedProvider::new(vec![reply(REVERSED), reply(SORTED)]);
    let sandbox = Arc::new(sandbox());

    let response = refinery(provider.clone(), sandbox)
        .run_pipeline(&sort_request())
        .await
        .expect("runs");

    assert!(response.success);
    assert_eq!(response.result.iteration_count, 2);
    assert_eq!(response.result.history[0].failed_count(), 2);

    // The refinement prompt carries the failing code back to the model
    let prompts = provider.prompts.lock().expect("lock");
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains(REVERSED));
}

#[tokio::test]
async fn test_generator_down() {
    let provider = ScriptedProvider::new(vec![]);
    let sandbox = Arc::new(sandbox());

    let response = refinery(provider, sandbox.clone())
        .run_pipeline(&sort_request())
        .await
        .expect("degraded result, not an error");

    assert!(!response.success);
    assert!(response.result.history.is_empty());
    assert!(response.result.error.is_some());
    assert_eq!(sandbox.calls(), 0);
}

#[tokio::test]
async fn test_budget_spent() {
    let provider = ScriptedProvider::new((0..5).map(|_| reply(REVERSED)).collect());
    let sandbox = Arc::new(sandbox());

    let response = refinery(provider.clone(), sandbox)
        .run_pipeline(&sort_request().with_max_iterations(3))
        .await
        .expect("runs");

    assert!(!response.success);
    assert_eq!(response.result.iteration_count, 3);
    assert!(response.result.error.is_none());
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn test_synthesized_tests_drive_the_run() {
    let provider = ScriptedProvider::new(vec![
        r#"```json
{"test_cases": [{"input": "5 4", "expected_output": "[4, 5]"}]}
```"#
            .to_string(),
        reply(SORTED),
    ]);
    let request = PipelineRequest::new("python", "Sort the integers").with_user_input("3 1 2");

    let response = refinery(provider.clone(), Arc::new(sandbox()))
        .run_pipeline(&request)
        .await
        .expect("runs");

    assert!(response.success);
    assert_eq!(response.result.test_cases, vec![TestCase::new("5 4", "[4, 5]")]);
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_unusable_synthesis_is_an_error() {
    let provider = ScriptedProvider::new(vec!["I cannot think of any tests.".to_string()]);
    let request = PipelineRequest::new("python", "Sort the integers");

    let err = refinery(provider, Arc::new(sandbox()))
        .run_pipeline(&request)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::TestSynthesis(_)));
}

#[tokio::test]
async fn test_unsupported_language_rejected_up_front() {
    let provider = ScriptedProvider::new(vec![reply(SORTED)]);
    let sandbox = Arc::new(sandbox());
    let mut request = sort_request();
    request.language = "brainfuck".to_string();

    let err = refinery(provider.clone(), sandbox.clone())
        .run_pipeline(&request)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Configuration(_)));
    assert_eq!(provider.calls(), 0);
    assert_eq!(sandbox.calls(), 0);
}

#[tokio::test]
async fn test_history_is_persisted() {
    let provider = ScriptedProvider::new(vec![reply(REVERSED), reply(SORTED)]);
    let store = Arc::new(InMemoryHistoryStore::new());

    let response = refinery(provider, Arc::new(sandbox()))
        .with_store(store.clone())
        .run_pipeline(&sort_request())
        .await
        .expect("runs");

    let id = response.question_id.expect("persisted");
    let stored = store.get(id).expect("stored");
    assert_eq!(stored.result.history.len(), 2);
    assert!(stored.result.success);
}
