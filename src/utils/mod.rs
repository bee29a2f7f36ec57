//! Shared utility functions.
//!
//! Currently holds JSON extraction from free-text LLM responses.

pub mod json_extraction;

pub use json_extraction::{
    extract_first_balanced, extract_from_generic_code_block, extract_from_json_code_block,
    extract_json_from_response, find_matching_close, JsonExtractionError,
};
