//! LLM integration for the candidate generator.
//!
//! ```ignore
//! use code_refinery::llm::{GenerationRequest, LiteLlmClient, LlmProvider, Message};
//!
//! let client = LiteLlmClient::from_env()?;
//! let request = GenerationRequest::new("llama-3.3-70b-versatile", vec![Message::user("Hi")]);
//! let response = client.generate(request).await?;
//! ```

pub mod litellm;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
    DEFAULT_API_BASE, DEFAULT_MODEL,
};
