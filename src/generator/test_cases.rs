//! Strict parsing of synthesized test cases.
//!
//! Accepted payloads, possibly wrapped in a code fence or prose:
//!
//! ```json
//! [{"input": "2 3", "expected_output": "5"}]
//! {"test_cases": [{"input": "2 3", "expected_output": null}]}
//! ```
//!
//! Anything else (extra fields, non-string values, an empty list) is rejected.

use serde::Deserialize;

use super::GeneratorError;
use crate::pipeline::types::TestCase;
use crate::utils::json_extraction::extract_json_from_response;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TestCasePayload {
    List(Vec<TestCase>),
    Wrapped(WrappedTestCases),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WrappedTestCases {
    test_cases: Vec<TestCase>,
}

/// Parses a generator reply into a non-empty list of test cases.
pub fn parse_test_cases(raw: &str) -> Result<Vec<TestCase>, GeneratorError> {
    let json = extract_json_from_response(raw)
        .map_err(|e| GeneratorError::InvalidTestCases(e.to_string()))?;

    let payload: TestCasePayload = serde_json::from_str(&json).map_err(|_| {
        GeneratorError::InvalidTestCases(
            "expected a list of {\"input\", \"expected_output\"} objects with string values"
                .to_string(),
        )
    })?;

    let cases = match payload {
        TestCasePayload::List(cases) => cases,
        TestCasePayload::Wrapped(wrapped) => wrapped.test_cases,
    };

    if cases.is_empty() {
        return Err(GeneratorError::InvalidTestCases(
            "generator returned no test cases".to_string(),
        ));
    }

    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_list() {
        let cases = parse_test_cases(
            r#"[{"input": "2 3", "expected_output": "5"}, {"input": "-1 1", "expected_output": "0"}]"#,
        )
        .expect("should parse");
        assert_eq!(
            cases,
            vec![TestCase::new("2 3", "5"), TestCase::new("-1 1", "0")]
        );
    }

    #[test]
    fn test_parse_fenced_wrapped_object() {
        let raw = "Here you go:\n```json\n{\"test_cases\": [{\"input\": \"4\", \"expected_output\": null}]}\n```";
        let cases = parse_test_cases(raw).expect("should parse");
        assert_eq!(cases, vec![TestCase::without_expectation("4")]);
    }

    #[test]
    fn test_absent_and_empty_expectation_are_distinct() {
        let cases = parse_test_cases(
            r#"[{"input": "a"}, {"input": "b", "expected_output": ""}]"#,
        )
        .expect("should parse");
        assert_eq!(cases[0].expected_output, None);
        assert_eq!(cases[1].expected_output, Some(String::new()));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = parse_test_cases(r#"[{"input": "1", "output": "1"}]"#).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidTestCases(_)));

        let err = parse_test_cases(r#"{"test_cases": [], "note": "x"}"#).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidTestCases(_)));
    }

    #[test]
    fn test_rejects_non_string_values() {
        let err = parse_test_cases(r#"[{"input": 2, "expected_output": 4}]"#).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidTestCases(_)));
    }

    #[test]
    fn test_rejects_empty_list() {
        let err = parse_test_cases("[]").unwrap_err();
        assert!(err.to_string().contains("no test cases"));
    }

    #[test]
    fn test_rejects_prose() {
        let err = parse_test_cases("I could not think of any tests.").unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidTestCases(_)));
    }
}
