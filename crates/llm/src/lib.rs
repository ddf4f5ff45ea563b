//! Generation for the FAQ voice agent
//!
//! Features:
//! - OpenAI-compatible streaming HTTP backend
//! - Strict FAQ-grounded prompt building
//! - Fixed fallback utterances for no-knowledge and failed turns

pub mod backend;
pub mod prompt;

pub use backend::{GeneratorConfig, HttpGenerator};
pub use prompt::{
    build_prompt, FALLBACK_GENERATION_FAILED, FALLBACK_NO_KNOWLEDGE, SYSTEM_PROMPT,
};

use thiserror::Error;

/// Generation errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for faq_agent_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Configuration(msg) => faq_agent_core::Error::Config(msg),
            other => faq_agent_core::Error::GenerationUnavailable(other.to_string()),
        }
    }
}
