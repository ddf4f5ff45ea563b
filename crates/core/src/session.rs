//! Session turn state machine.

use serde::{Deserialize, Serialize};

/// Per-session turn state.
///
/// The session orchestrator owns exactly one of these per live session and
/// every transition happens on the orchestrator task. Observers read the
/// state through a watch channel; nothing outside the orchestrator mutates
/// it.
///
/// ```text
/// Idle -> AwaitingUtterance -> Retrieving -> Composing
///      -> AwaitingGeneration -> AwaitingUtterance -> ...
/// ```
///
/// A final utterance arriving in `Retrieving`, `Composing`, or
/// `AwaitingGeneration` cancels the in-flight turn and restarts from
/// `Retrieving` with the new utterance. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Session created, participant not yet joined.
    Idle,
    /// Waiting for the next final utterance.
    AwaitingUtterance,
    /// Embedding the utterance and searching the index.
    Retrieving,
    /// Assembling the grounded prompt.
    Composing,
    /// Streaming the generated answer.
    AwaitingGeneration,
    /// Terminal: idle timeout, disconnect, or shutdown.
    Closed,
}

impl TurnState {
    /// Whether a final utterance received in this state cancels an
    /// in-flight turn rather than starting a fresh one.
    pub fn is_mid_turn(&self) -> bool {
        matches!(
            self,
            TurnState::Retrieving | TurnState::Composing | TurnState::AwaitingGeneration
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Closed)
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TurnState::Idle => "idle",
            TurnState::AwaitingUtterance => "awaiting_utterance",
            TurnState::Retrieving => "retrieving",
            TurnState::Composing => "composing",
            TurnState::AwaitingGeneration => "awaiting_generation",
            TurnState::Closed => "closed",
        };
        f.write_str(s)
    }
}
