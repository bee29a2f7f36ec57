//! Supported target languages.
//!
//! `Language` is the single source of truth for which languages a pipeline
//! run may target. Request validation parses into it and the sandbox client
//! maps it to the execution service's identifiers, so the two cannot drift.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A programming language the pipeline can generate and execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    #[serde(rename = "cpp")]
    Cpp,
    C,
    JavaScript,
    Java,
    Ruby,
    Rust,
    R,
    Go,
    Swift,
    TypeScript,
    Php,
}

impl Language {
    /// Returns all supported languages.
    pub fn all() -> &'static [Language] {
        &[
            Language::Python,
            Language::Cpp,
            Language::C,
            Language::JavaScript,
            Language::Java,
            Language::Ruby,
            Language::Rust,
            Language::R,
            Language::Go,
            Language::Swift,
            Language::TypeScript,
            Language::Php,
        ]
    }

    /// Returns the lowercase identifier used on the wire and in the CLI.
    pub fn identifier(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::JavaScript => "javascript",
            Language::Java => "java",
            Language::Ruby => "ruby",
            Language::Rust => "rust",
            Language::R => "r",
            Language::Go => "go",
            Language::Swift => "swift",
            Language::TypeScript => "typescript",
            Language::Php => "php",
        }
    }

    /// Returns the human-readable name used in prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Python => "Python",
            Language::Cpp => "C++",
            Language::C => "C",
            Language::JavaScript => "JavaScript",
            Language::Java => "Java",
            Language::Ruby => "Ruby",
            Language::Rust => "Rust",
            Language::R => "R",
            Language::Go => "Go",
            Language::Swift => "Swift",
            Language::TypeScript => "TypeScript",
            Language::Php => "PHP",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.identifier())
    }
}

/// Error returned when a language identifier is not supported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported language: '{0}'")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        // Accept display names such as "C++" as well as identifiers.
        let normalized = match normalized.as_str() {
            "c++" => "cpp".to_string(),
            "js" => "javascript".to_string(),
            "ts" => "typescript".to_string(),
            _ => normalized,
        };

        Language::all()
            .iter()
            .copied()
            .find(|lang| lang.identifier() == normalized)
            .ok_or_else(|| UnsupportedLanguage(s.to_string()))
    }
}
