//! Parsing of generator replies.
//!
//! A well-formed reply has two ordered sections:
//!
//! ~~~text
//! CHAIN_OF_THOUGHT:
//! - first reasoning step
//! - second reasoning step
//! CODE:
//! ```python
//! print(sum(map(int, input().split())))
//! ```
//! ~~~
//!
//! Anything else is a [`FormatError`]; there is no fallback parse.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::FormatError;

/// Marker that opens the reasoning section.
pub const REASONING_MARKER: &str = "CHAIN_OF_THOUGHT:";

/// Marker that opens the code section.
pub const CODE_MARKER: &str = "CODE:";

/// First fenced block. The opening fence, with its optional info string, must
/// end its line; the info string is discarded.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[^\n`]*\n(.*?)```").expect("Invalid regex for fenced code block")
});

/// Bullet or numbering at the start of a reasoning line.
static BULLET_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[-*•+]\s+|\d+[.)]\s+)").expect("Invalid regex for bullet prefix")
});

/// The validated content of a generator reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResponse {
    /// Reasoning steps in the order they were given.
    pub reasoning_trace: Vec<String>,
    /// Source code from the first fenced block after the code marker.
    pub code: String,
}

/// Parses a raw generator reply into reasoning steps and code.
pub fn parse_response(raw: &str) -> Result<ParsedResponse, FormatError> {
    let reasoning_start = raw.find(REASONING_MARKER).ok_or(FormatError::MissingMarker {
        marker: REASONING_MARKER,
    })?;
    let reasoning_body_start = reasoning_start + REASONING_MARKER.len();

    let code_start = match raw[reasoning_body_start..].find(CODE_MARKER) {
        Some(offset) => reasoning_body_start + offset,
        None if raw.contains(CODE_MARKER) => {
            return Err(FormatError::MarkersOutOfOrder {
                reasoning: REASONING_MARKER,
                code: CODE_MARKER,
            })
        }
        None => {
            return Err(FormatError::MissingMarker {
                marker: CODE_MARKER,
            })
        }
    };

    let reasoning_trace = reasoning_lines(&raw[reasoning_body_start..code_start]);

    let code_section = &raw[code_start + CODE_MARKER.len()..];
    let captures = FENCED_BLOCK
        .captures(code_section)
        .ok_or(FormatError::MissingCodeBlock {
            marker: CODE_MARKER,
        })?;

    let code = captures
        .get(1)
        .map(|m| m.as_str().trim())
        .unwrap_or_default();

    if code.is_empty() {
        return Err(FormatError::EmptyCodeBlock);
    }

    Ok(ParsedResponse {
        reasoning_trace,
        code: code.to_string(),
    })
}

fn reasoning_lines(section: &str) -> Vec<String> {
    section
        .lines()
        .map(str::trim)
        .map(|line| BULLET_PREFIX.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
