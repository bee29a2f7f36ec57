//! Database schema constants.
//!
//! Three append-only tables: one row per run in `questions`, one row per pass
//! in `iterations`, one row per judged test case in `test_case_results`.

/// SQL schema for creating the questions table.
pub const CREATE_QUESTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS questions (
    id UUID PRIMARY KEY,
    model VARCHAR(255) NOT NULL,
    question TEXT NOT NULL,
    explanation TEXT NOT NULL DEFAULT '',
    user_input TEXT NOT NULL DEFAULT '',
    language VARCHAR(50) NOT NULL,
    max_iterations INTEGER NOT NULL,
    success BOOLEAN NOT NULL,
    error TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

/// SQL schema for creating the iterations table.
pub const CREATE_ITERATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS iterations (
    id UUID PRIMARY KEY,
    question_id UUID NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
    iteration_number INTEGER NOT NULL,
    chain_of_thought TEXT[] NOT NULL,
    generated_code TEXT NOT NULL,
    primary_execution JSONB,
    success BOOLEAN NOT NULL,
    error TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE(question_id, iteration_number)
)
"#;

/// SQL schema for creating the test_case_results table.
pub const CREATE_TEST_CASE_RESULTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS test_case_results (
    id UUID PRIMARY KEY,
    iteration_id UUID NOT NULL REFERENCES iterations(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    input TEXT NOT NULL,
    expected_output TEXT,
    actual_output TEXT NOT NULL,
    execution_time VARCHAR(32) NOT NULL,
    memory_usage BIGINT NOT NULL,
    stderr TEXT NOT NULL,
    compiler_errors TEXT NOT NULL,
    passed BOOLEAN NOT NULL
)
"#;

/// SQL for creating all required indexes.
pub const CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_questions_created_at ON questions(created_at);
CREATE INDEX IF NOT EXISTS idx_questions_language ON questions(language);
CREATE INDEX IF NOT EXISTS idx_iterations_question_id ON iterations(question_id);
CREATE INDEX IF NOT EXISTS idx_test_case_results_iteration_id ON test_case_results(iteration_id)
"#;

/// Returns all schema creation statements in dependency order.
pub fn all_schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_QUESTIONS_TABLE,
        CREATE_ITERATIONS_TABLE,
        CREATE_TEST_CASE_RESULTS_TABLE,
        CREATE_INDEXES,
    ]
}

/// Table names in the schema.
pub mod tables {
    pub const QUESTIONS: &str = "questions";
    pub const ITERATIONS: &str = "iterations";
    pub const TEST_CASE_RESULTS: &str = "test_case_results";

    /// All tables, children before parents.
    pub const DROP_ORDER: &[&str] = &[TEST_CASE_RESULTS, ITERATIONS, QUESTIONS];
}
