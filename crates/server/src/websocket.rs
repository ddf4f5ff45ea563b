//! WebSocket Handler
//!
//! Transcription feed in, transcript events out. One socket serves one
//! session: inbound messages carry utterance segments from the caller's
//! speech-to-text, outbound messages carry ordered transcript events and
//! turn state changes.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use faq_agent_agent::SessionHandle;
use faq_agent_core::{Sender, TranscriptEvent, TurnState, Utterance};

use crate::state::AppState;

/// One span from the transcription feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    #[serde(default)]
    pub id: String,
    pub text: String,
    #[serde(rename = "final")]
    pub is_final: bool,
}

/// WebSocket message types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Transcription feed update; only final segments start turns
    Transcription { segments: Vec<TranscriptSegment> },
    /// Transcript event
    Transcript {
        sender: Sender,
        text: String,
        sequence: u64,
        truncated: bool,
        timestamp: DateTime<Utc>,
    },
    /// Turn state change
    State { state: TurnState },
    /// Session info
    SessionInfo { session_id: String },
    /// Error
    Error { message: String },
    /// Ping/Pong
    Ping,
    Pong,
    /// End session
    EndSession,
}

impl WsMessage {
    fn from_event(event: TranscriptEvent) -> Self {
        WsMessage::Transcript {
            sender: event.sender,
            text: event.text,
            sequence: event.sequence,
            truncated: event.truncated,
            timestamp: event.timestamp,
        }
    }
}

/// WebSocket handler
pub struct WebSocketHandler;

impl WebSocketHandler {
    /// Handle WebSocket upgrade
    pub async fn handle(
        ws: WebSocketUpgrade,
        State(state): State<AppState>,
        Path(session_id): Path<String>,
    ) -> Result<Response, axum::http::StatusCode> {
        let handle = state
            .sessions
            .get(&session_id)
            .ok_or(axum::http::StatusCode::NOT_FOUND)?;

        if handle.state() == TurnState::Closed {
            return Err(axum::http::StatusCode::GONE);
        }

        Ok(ws.on_upgrade(move |socket| Self::handle_socket(socket, handle)))
    }

    async fn handle_socket(socket: WebSocket, handle: SessionHandle) {
        let (mut sender, mut receiver) = socket.split();
        let mut events = handle.subscribe();
        let mut states = handle.watch_state();

        let info = WsMessage::SessionInfo {
            session_id: handle.session_id().to_string(),
        };
        if send_message(&mut sender, &info).await.is_err() {
            return;
        }

        // Per-connection utterance numbering for the session's channel.
        let mut sequence: u64 = 0;

        loop {
            tokio::select! {
                inbound = receiver.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<WsMessage>(&text) {
                                Ok(message) => {
                                    if handle_inbound(message, &handle, &mut sender, &mut sequence).await {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    let error = WsMessage::Error {
                                        message: format!("invalid message: {}", e),
                                    };
                                    if send_message(&mut sender, &error).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::debug!(
                                session_id = %handle.session_id(),
                                "WebSocket closed by client"
                            );
                            break;
                        }
                        Some(Ok(_)) => {} // binary and ping/pong frames ignored
                        Some(Err(e)) => {
                            tracing::debug!(
                                session_id = %handle.session_id(),
                                error = %e,
                                "WebSocket receive error"
                            );
                            break;
                        }
                    }
                }
                event = events.recv() => {
                    let (message, close) = interpret_event(event, handle.session_id());
                    if let Some(message) = message {
                        if send_message(&mut sender, &message).await.is_err() {
                            break;
                        }
                    }
                    if close {
                        break;
                    }
                }
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = *states.borrow_and_update();
                    let message = WsMessage::State { state: current };
                    if send_message(&mut sender, &message).await.is_err() {
                        break;
                    }
                    if current == TurnState::Closed {
                        break;
                    }
                }
            }
        }

        let _ = sender.send(Message::Close(None)).await;
    }
}

/// Interpret one broadcast receive outcome: the message to send (if any)
/// and whether the connection must close afterwards.
///
/// A lagged subscriber is disconnected rather than resumed: continuing
/// past dropped events would hand the client a transcript with sequence
/// gaps. The client reconnects for a consistent stream.
fn interpret_event(
    event: Result<TranscriptEvent, broadcast::error::RecvError>,
    session_id: &str,
) -> (Option<WsMessage>, bool) {
    match event {
        Ok(event) => (Some(WsMessage::from_event(event)), false),
        Err(broadcast::error::RecvError::Lagged(missed)) => {
            tracing::warn!(
                session_id = %session_id,
                missed,
                "Subscriber lagged behind transcript, disconnecting"
            );
            let error = WsMessage::Error {
                message: format!("{} transcript events dropped, reconnect to resync", missed),
            };
            (Some(error), true)
        }
        Err(broadcast::error::RecvError::Closed) => (None, true),
    }
}

/// Handle one inbound client message. Returns true when the connection
/// should close.
async fn handle_inbound(
    message: WsMessage,
    handle: &SessionHandle,
    sender: &mut (impl SinkExt<Message> + Unpin),
    sequence: &mut u64,
) -> bool {
    match message {
        WsMessage::Transcription { segments } => {
            for segment in segments {
                *sequence += 1;
                let utterance = if segment.is_final {
                    Utterance::final_segment(handle.session_id(), segment.text, *sequence)
                } else {
                    Utterance::partial(handle.session_id(), segment.text, *sequence)
                };
                if let Err(e) = handle.submit(utterance).await {
                    tracing::info!(
                        session_id = %handle.session_id(),
                        error = %e,
                        "Utterance rejected, closing socket"
                    );
                    let error = WsMessage::Error {
                        message: "session is closed".to_string(),
                    };
                    let _ = send_message(sender, &error).await;
                    return true;
                }
            }
            false
        }
        WsMessage::Ping => send_message(sender, &WsMessage::Pong).await.is_err(),
        WsMessage::EndSession => {
            tracing::info!(session_id = %handle.session_id(), "Client ended session");
            handle.close();
            true
        }
        // Server-to-client variants arriving inbound are ignored.
        _ => false,
    }
}

async fn send_message(
    sender: &mut (impl SinkExt<Message> + Unpin),
    message: &WsMessage,
) -> Result<(), ()> {
    let text = serde_json::to_string(message).map_err(|_| ())?;
    sender.send(Message::Text(text)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_transcription_parses() {
        let raw = r#"{"type":"transcription","segments":[{"id":"seg-1","text":"what are your hours","final":true}]}"#;
        let message: WsMessage = serde_json::from_str(raw).unwrap();
        match message {
            WsMessage::Transcription { segments } => {
                assert_eq!(segments.len(), 1);
                assert_eq!(segments[0].text, "what are your hours");
                assert!(segments[0].is_final);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_transcript_event_serializes() {
        let event = TranscriptEvent::new("s1", Sender::Agent, "We are open 9 to 6.");
        let message = WsMessage::from_event(event);
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains(r#""type":"transcript""#));
        assert!(json.contains(r#""sender":"agent""#));
    }

    #[test]
    fn test_lagged_subscriber_is_disconnected() {
        let (message, close) =
            interpret_event(Err(broadcast::error::RecvError::Lagged(3)), "s1");
        assert!(close, "lagged subscriber must not resume past dropped events");
        match message {
            Some(WsMessage::Error { message }) => assert!(message.contains("3")),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_delivered_event_keeps_connection() {
        let event = TranscriptEvent::new("s1", Sender::User, "hello");
        let (message, close) = interpret_event(Ok(event), "s1");
        assert!(!close);
        assert!(matches!(message, Some(WsMessage::Transcript { .. })));
    }

    #[test]
    fn test_state_message_uses_snake_case() {
        let message = WsMessage::State {
            state: TurnState::AwaitingUtterance,
        };
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains(r#""state":"awaiting_utterance""#));
    }
}
