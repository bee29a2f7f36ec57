//! Output normalization and comparison.
//!
//! Decides whether a program's stdout matches a test case's expected output.
//! Strategies are tried in order and the first that reports a match wins:
//!
//! 1. Both sides parse as JSON: structural equality (array order matters,
//!    object key order does not, numbers compare by value).
//! 2. Whitespace runs collapsed, ends trimmed: exact equality.
//! 3. Same as 2, case-insensitive.
//! 4. Array literals (`[...]`): whitespace outside quoted substrings removed,
//!    compared as-is and lower-cased.
//!
//! A mismatch is never an error; it is a normal `passed = false` outcome.

use serde_json::Value;

/// Returns true when `actual` matches `expected` under any comparison strategy.
pub fn equivalent(actual: &str, expected: &str) -> bool {
    let actual = actual.trim();
    let expected = expected.trim();

    if json_equal(actual, expected) {
        return true;
    }

    let actual = collapse_whitespace(actual);
    let expected = collapse_whitespace(expected);

    if actual == expected {
        return true;
    }

    let actual_lower = actual.to_lowercase();
    let expected_lower = expected.to_lowercase();

    if actual_lower == expected_lower {
        return true;
    }

    if is_array_literal(&actual) && is_array_literal(&expected) {
        return normalize_array_literal(&actual) == normalize_array_literal(&expected)
            || normalize_array_literal(&actual_lower) == normalize_array_literal(&expected_lower);
    }

    false
}

/// Compares actual output against an optional expectation.
///
/// A missing expectation never passes; an empty one is compared literally.
pub fn outputs_match(actual: &str, expected: Option<&str>) -> bool {
    match expected {
        Some(expected) => equivalent(actual, expected),
        None => false,
    }
}

/// Canonical form of an output: whitespace collapsed and, for array literals,
/// whitespace outside quotes removed. Idempotent.
pub fn normalize(output: &str) -> String {
    let collapsed = collapse_whitespace(output);
    if is_array_literal(&collapsed) {
        normalize_array_literal(&collapsed)
    } else {
        collapsed
    }
}

fn json_equal(actual: &str, expected: &str) -> bool {
    match (
        serde_json::from_str::<Value>(actual),
        serde_json::from_str::<Value>(expected),
    ) {
        (Ok(a), Ok(e)) => values_equal(&a, &e),
        _ => false,
    }
}

/// Structural equality where numbers compare by value, so `5` equals `5.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &serde_json::Number, y: &serde_json::Number) -> bool {
    if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
        return x == y;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_array_literal(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('[') && s.ends_with(']')
}

/// Removes whitespace outside quoted substrings.
///
/// Either quote character opens a string that only the same character closes;
/// a backslash inside a string escapes the next character.
fn normalize_array_literal(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut quote: Option<char> = None;
    let mut escape_next = false;

    for c in s.chars() {
        if escape_next {
            escape_next = false;
            result.push(c);
            continue;
        }

        match quote {
            Some(open) => {
                if c == '\\' {
                    escape_next = true;
                } else if c == open {
                    quote = None;
                }
                result.push(c);
            }
            None => {
                if c.is_whitespace() {
                    continue;
                }
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                result.push(c);
            }
        }
    }

    result
}
