//! JSON extraction utilities for parsing LLM responses.
//!
//! Models asked for JSON often wrap it in markdown fences or surround it with
//! explanatory text. These helpers locate the JSON payload; they do not
//! interpret it. Callers deserialize the extracted text into a strict schema.
//!
//! # Extraction Strategies
//!
//! Tried in order, the first candidate that parses as JSON wins:
//! 1. A ```json fenced block
//! 2. Any other fenced block
//! 3. The whole content, when it starts with '[' or '{'
//! 4. The first balanced array or object anywhere in the content
//!
//! # Example
//!
//! ```
//! use code_refinery::utils::json_extraction::extract_json_from_response;
//!
//! let response = "Sure! Here you go:\n```json\n[{\"input\": \"1\"}]\n```";
//! let json = extract_json_from_response(response).expect("json present");
//! assert_eq!(json, "[{\"input\": \"1\"}]");
//! ```

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static JSON_CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```json\s*\n?([\s\S]*?)\n?```").expect("Invalid regex for json code block")
});

static GENERIC_CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:\w+)?\s*\n?([\s\S]*?)\n?```").expect("Invalid regex for code block")
});

/// Error type for JSON extraction failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("JSON appears truncated: {unclosed} unclosed brackets/braces. Partial: {partial_preview}...")]
    Truncated {
        partial_preview: String,
        unclosed: usize,
    },
    #[error("No JSON content found in response. Content starts with: '{content_preview}'")]
    NotFound { content_preview: String },
}

/// Extracts the first valid JSON document from an LLM response.
pub fn extract_json_from_response(content: &str) -> Result<String, JsonExtractionError> {
    let trimmed = content.trim();

    let candidates = [
        extract_from_json_code_block(trimmed),
        extract_from_generic_code_block(trimmed),
        (trimmed.starts_with('[') || trimmed.starts_with('{')).then(|| trimmed.to_string()),
        extract_first_balanced(trimmed),
    ];

    if let Some(json) = candidates.into_iter().flatten().find(|c| is_valid_json(c)) {
        return Ok(json);
    }

    if let Some(start) = trimmed.find(['[', '{']) {
        let unclosed = unclosed_depth(&trimmed[start..]);
        if unclosed > 0 {
            return Err(JsonExtractionError::Truncated {
                partial_preview: preview(&trimmed[start..], 100),
                unclosed,
            });
        }
    }

    Err(JsonExtractionError::NotFound {
        content_preview: preview(trimmed, 50),
    })
}

/// Extract JSON from a ```json ... ``` code block.
pub fn extract_from_json_code_block(content: &str) -> Option<String> {
    JSON_CODE_BLOCK
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Extract the body of the first fenced code block, whatever its tag.
pub fn extract_from_generic_code_block(content: &str) -> Option<String> {
    GENERIC_CODE_BLOCK
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Finds the first balanced `[...]` or `{...}` span in the content.
pub fn extract_first_balanced(content: &str) -> Option<String> {
    let start = content.find(['[', '{'])?;
    let end = find_matching_close(&content[start..])?;
    Some(content[start..=start + end].to_string())
}

/// Returns the index of the bracket or brace closing the one at position 0.
///
/// Handles nesting, string literals and escape sequences inside strings.
pub fn find_matching_close(s: &str) -> Option<usize> {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '[' | '{' if !in_string => depth += 1,
            ']' | '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

fn unclosed_depth(s: &str) -> usize {
    let mut depth: isize = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for c in s.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '[' | '{' if !in_string => depth += 1,
            ']' | '}' if !in_string => depth -= 1,
            _ => {}
        }
    }

    depth.max(0) as usize
}

fn is_valid_json(candidate: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(candidate).is_ok()
}

fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
