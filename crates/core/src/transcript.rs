//! Utterance and transcript event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One transcribed span of user speech, partial or final.
///
/// Produced by the external transcription capability and consumed exactly
/// once by the session orchestrator. Partial utterances may be superseded by
/// later ones; only final utterances start a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Session this utterance belongs to.
    pub session_id: String,
    /// Transcribed text.
    pub text: String,
    /// Whether the transcription capability considers this span complete.
    pub is_final: bool,
    /// Monotonic sequence within the session's transcription feed.
    pub sequence: u64,
    /// Time the segment was received.
    pub timestamp: DateTime<Utc>,
}

impl Utterance {
    /// Create a final utterance.
    pub fn final_segment(session_id: impl Into<String>, text: impl Into<String>, sequence: u64) -> Self {
        Self {
            session_id: session_id.into(),
            text: text.into(),
            is_final: true,
            sequence,
            timestamp: Utc::now(),
        }
    }

    /// Create a partial (non-final) utterance.
    pub fn partial(session_id: impl Into<String>, text: impl Into<String>, sequence: u64) -> Self {
        Self {
            session_id: session_id.into(),
            text: text.into(),
            is_final: false,
            sequence,
            timestamp: Utc::now(),
        }
    }
}

/// Who produced a transcript line.
///
/// An explicit role set at session-join time; never inferred from identity
/// strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

/// One line of the conversation transcript.
///
/// Append-only and immutable once emitted. `sequence` is strictly increasing
/// within a session; subscribers rely on it for ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub session_id: String,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
    /// Set when the agent's answer was cut short by the response deadline.
    #[serde(default)]
    pub truncated: bool,
}

impl TranscriptEvent {
    /// Create an event with sequence 0; the publisher assigns the real
    /// sequence number when the event is published.
    pub fn new(session_id: impl Into<String>, sender: Sender, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
            sequence: 0,
            truncated: false,
        }
    }

    pub fn with_truncated(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utterance_constructors() {
        let f = Utterance::final_segment("s1", "hello", 3);
        assert!(f.is_final);
        assert_eq!(f.sequence, 3);

        let p = Utterance::partial("s1", "hel", 2);
        assert!(!p.is_final);
    }

    #[test]
    fn test_sender_serde() {
        assert_eq!(serde_json::to_string(&Sender::Agent).unwrap(), "\"agent\"");
        let s: Sender = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(s, Sender::User);
    }

    #[test]
    fn test_event_defaults() {
        let event = TranscriptEvent::new("s1", Sender::User, "hi");
        assert_eq!(event.sequence, 0);
        assert!(!event.truncated);
    }
}
