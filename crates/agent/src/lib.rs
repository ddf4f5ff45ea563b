//! Session orchestration for the FAQ voice agent
//!
//! Features:
//! - Answer composition from retrieved knowledge
//! - Streamed generation interpretation with a response deadline
//! - Per-session turn state machine with barge-in cancellation
//! - Ordered transcript publishing over a broadcast channel

pub mod composer;
pub mod interpreter;
pub mod orchestrator;
pub mod publisher;

pub use composer::{Composer, ComposerSettings, ComposedAnswer, GroundedContext};
pub use interpreter::{interpret_stream, InterpretedAnswer};
pub use orchestrator::{Orchestrator, OrchestratorConfig, SessionHandle};
pub use publisher::TranscriptPublisher;

use thiserror::Error;

/// Orchestration errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Session error: {0}")]
    Session(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Timeout")]
    Timeout,
}

impl From<AgentError> for faq_agent_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Timeout => {
                faq_agent_core::Error::GenerationUnavailable("response deadline exceeded".into())
            }
            other => faq_agent_core::Error::Internal(other.to_string()),
        }
    }
}
