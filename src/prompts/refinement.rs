//! Prompt builders for code generation, refinement and test synthesis.
//!
//! Every builder is a pure function: it takes a context struct of named fields
//! and returns the rendered system and user messages. Templates are rendered
//! with [`Tera::one_off`], so there is no shared template registry.

use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

use crate::language::Language;
use crate::pipeline::response::{CODE_MARKER, REASONING_MARKER};
use crate::pipeline::types::{ProblemStatement, TestCase, TestCaseResult};

/// Errors raised while rendering a prompt template.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Failed to render prompt template '{name}': {source}")]
    Render {
        name: &'static str,
        #[source]
        source: tera::Error,
    },
}

/// A rendered prompt, ready to be sent as a system + user message pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodePrompt {
    pub system: String,
    pub user: String,
}

/// Named inputs shared by every prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub language: Language,
    pub question: &'a str,
    pub explanation: &'a str,
    pub example_input: Option<&'a str>,
    pub test_cases: &'a [TestCase],
}

impl<'a> PromptContext<'a> {
    /// Builds a context from a problem statement and its test cases.
    pub fn new(problem: &'a ProblemStatement, test_cases: &'a [TestCase]) -> Self {
        Self {
            language: problem.language,
            question: &problem.question,
            explanation: &problem.explanation,
            example_input: problem.example_input.as_deref(),
            test_cases,
        }
    }
}

/// Inputs of a refinement prompt.
#[derive(Debug, Clone, Copy)]
pub struct RefinementContext<'a> {
    pub problem: PromptContext<'a>,
    pub code: &'a str,
    pub results: &'a [TestCaseResult],
}

const NOT_SPECIFIED: &str = "(not specified)";

/// System prompt shared by generation and refinement.
const CODER_SYSTEM_PROMPT: &str = r#"You are an expert software engineer who writes clean, efficient and correct {{ language_name }} programs.

Programs read all input from standard input and write the answer to standard output.
Do not print prompts, labels or debugging output.

Always answer in exactly this format:

{{ reasoning_marker }}
- one reasoning step per line
- as many steps as you need

{{ code_marker }}
```{{ language }}
the complete program
```

Put only the program inside the code block, and produce exactly one code block."#;

const INITIAL_USER_TEMPLATE: &str = r#"Write a {{ language_name }} program for the following problem.

### Problem
{{ question }}
{% if explanation %}
### Explanation
{{ explanation }}
{% endif %}{% if example_input %}
### Example Input
{{ example_input }}
{% endif %}
### Test Cases
{% for case in test_cases %}{{ loop.index }}. Input:
{{ case.input }}
   Expected output:
{{ case.expected }}
{% endfor %}
### Instructions
1. Handle every edge case implied by the problem.
2. Make sure the program passes all of the test cases above.
3. Follow the required answer format exactly."#;

const REFINE_USER_TEMPLATE: &str = r#"The following {{ language_name }} program does not pass all of its test cases. Fix it.

### Problem
{{ question }}
{% if explanation %}
### Explanation
{{ explanation }}
{% endif %}
### Current Code
```{{ language }}
{{ code }}
```

### Execution Results
{% for result in results %}{{ loop.index }}. {% if result.passed %}PASSED{% else %}FAILED{% endif %}
   Input:
{{ result.input }}
   Expected output:
{{ result.expected }}
   Actual output:
{{ result.actual }}
{% if result.stderr %}   Runtime errors:
{{ result.stderr }}
{% endif %}{% if result.compiler_diagnostics %}   Compiler errors:
{{ result.compiler_diagnostics }}
{% endif %}{% endfor %}
### Instructions
1. Analyze the failures and any error messages carefully.
2. Fix syntax errors, logic errors and unhandled edge cases.
3. Return the complete corrected program, not a diff.
4. Follow the required answer format exactly."#;

const TEST_SYNTHESIS_SYSTEM_PROMPT: &str = r#"You design test cases for programming problems.

Reply with a JSON array and nothing else. Each element has exactly two fields:
- "input": the exact text given to the program on standard input
- "expected_output": the exact text the program must print

Both values are strings."#;

const TEST_SYNTHESIS_USER_TEMPLATE: &str = r#"Write {{ count }} test cases for this {{ language_name }} problem.

### Problem
{{ question }}
{% if explanation %}
### Explanation
{{ explanation }}
{% endif %}{% if example_input %}
### Example Input
{{ example_input }}
{% endif %}
Cover typical inputs and edge cases. Compute every expected output carefully."#;

/// Number of test cases requested when none are supplied.
pub const SYNTHESIZED_TEST_COUNT: usize = 5;

#[derive(Serialize)]
struct CaseView<'a> {
    input: &'a str,
    expected: &'a str,
}

#[derive(Serialize)]
struct ResultView<'a> {
    input: &'a str,
    expected: &'a str,
    actual: &'a str,
    stderr: &'a str,
    compiler_diagnostics: &'a str,
    passed: bool,
}

fn base_context(ctx: &PromptContext<'_>) -> Context {
    let mut context = Context::new();
    context.insert("language", ctx.language.identifier());
    context.insert("language_name", ctx.language.display_name());
    context.insert("question", ctx.question);
    context.insert("explanation", ctx.explanation.trim());
    context.insert("example_input", ctx.example_input.unwrap_or("").trim());
    context.insert("reasoning_marker", REASONING_MARKER);
    context.insert("code_marker", CODE_MARKER);
    context
}

fn render(name: &'static str, template: &str, context: &Context) -> Result<String, PromptError> {
    Tera::one_off(template, context, false).map_err(|source| PromptError::Render { name, source })
}

fn coder_system_prompt(ctx: &PromptContext<'_>) -> Result<String, PromptError> {
    render("coder_system", CODER_SYSTEM_PROMPT, &base_context(ctx))
}

/// Builds the prompt for the first candidate of a run.
pub fn build_initial_prompt(ctx: &PromptContext<'_>) -> Result<CodePrompt, PromptError> {
    let mut context = base_context(ctx);
    let cases: Vec<CaseView<'_>> = ctx
        .test_cases
        .iter()
        .map(|case| CaseView {
            input: &case.input,
            expected: case.expected_output.as_deref().unwrap_or(NOT_SPECIFIED),
        })
        .collect();
    context.insert("test_cases", &cases);

    Ok(CodePrompt {
        system: coder_system_prompt(ctx)?,
        user: render("initial_user", INITIAL_USER_TEMPLATE, &context)?,
    })
}

/// Builds the prompt asking for a corrected version of `code`.
pub fn build_refine_prompt(ctx: &RefinementContext<'_>) -> Result<CodePrompt, PromptError> {
    let mut context = base_context(&ctx.problem);
    let results: Vec<ResultView<'_>> = ctx
        .results
        .iter()
        .map(|r| ResultView {
            input: &r.input,
            expected: r.expected_output.as_deref().unwrap_or(NOT_SPECIFIED),
            actual: &r.actual_output,
            stderr: r.stderr.trim(),
            compiler_diagnostics: r.compiler_diagnostics.trim(),
            passed: r.passed,
        })
        .collect();
    context.insert("code", ctx.code);
    context.insert("results", &results);

    Ok(CodePrompt {
        system: coder_system_prompt(&ctx.problem)?,
        user: render("refine_user", REFINE_USER_TEMPLATE, &context)?,
    })
}

/// Builds the prompt asking the model to propose test cases.
pub fn build_test_synthesis_prompt(ctx: &PromptContext<'_>) -> Result<CodePrompt, PromptError> {
    let mut context = base_context(ctx);
    context.insert("count", &SYNTHESIZED_TEST_COUNT);

    Ok(CodePrompt {
        system: TEST_SYNTHESIS_SYSTEM_PROMPT.to_string(),
        user: render("test_synthesis_user", TEST_SYNTHESIS_USER_TEMPLATE, &context)?,
    })
}
