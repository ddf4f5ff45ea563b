//! Generation stream interpreter
//!
//! Accumulates streamed deltas into the final answer text. The stream is
//! raced against the remaining response deadline: on timeout whatever has
//! accumulated is returned marked truncated, so the user hears a partial
//! answer instead of silence.

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tracing::warn;

use faq_agent_core::{Error, FinishReason, Result, StreamChunk};

/// Interpreted answer text.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpretedAnswer {
    pub text: String,
    /// Set when the deadline fired or the model hit its token limit.
    pub truncated: bool,
}

/// Drain a generation stream into answer text.
///
/// Returns `GenerationUnavailable` if the stream errors before producing
/// any text; once text has accumulated, a mid-stream error degrades to a
/// truncated answer rather than losing the turn.
pub async fn interpret_stream(
    mut stream: Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + '_>>,
    deadline: Duration,
) -> Result<InterpretedAnswer> {
    let mut text = String::new();

    let outcome = tokio::time::timeout(deadline, async {
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    text.push_str(&chunk.delta);
                    if chunk.is_final {
                        return Ok(chunk.finish_reason.unwrap_or(FinishReason::Stop));
                    }
                }
                Err(e) => return Err(e),
            }
        }
        // Stream ended without a final chunk.
        Err(Error::GenerationUnavailable(
            "generation stream ended early".into(),
        ))
    })
    .await;

    match outcome {
        Ok(Ok(FinishReason::Length)) => Ok(InterpretedAnswer {
            text,
            truncated: true,
        }),
        Ok(Ok(FinishReason::Error)) => Err(Error::GenerationUnavailable(
            "backend reported a generation error".into(),
        )),
        Ok(Ok(_)) => Ok(InterpretedAnswer {
            text,
            truncated: false,
        }),
        Ok(Err(e)) if text.is_empty() => Err(e),
        Ok(Err(e)) => {
            warn!(error = %e, "Stream failed mid-answer, keeping partial text");
            Ok(InterpretedAnswer {
                text,
                truncated: true,
            })
        }
        Err(_elapsed) if text.is_empty() => Err(Error::GenerationUnavailable(
            "response deadline exceeded before any text".into(),
        )),
        Err(_elapsed) => {
            warn!("Response deadline exceeded, keeping partial text");
            Ok(InterpretedAnswer {
                text,
                truncated: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(items: Vec<Result<StreamChunk>>) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'static>> {
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn test_accumulates_until_final() {
        let s = chunks(vec![
            Ok(StreamChunk::text("We are ")),
            Ok(StreamChunk::text("open 9 to 6.")),
            Ok(StreamChunk::final_chunk(FinishReason::Stop)),
        ]);
        let answer = interpret_stream(s, Duration::from_secs(1)).await.unwrap();
        assert_eq!(answer.text, "We are open 9 to 6.");
        assert!(!answer.truncated);
    }

    #[tokio::test]
    async fn test_length_finish_marks_truncated() {
        let s = chunks(vec![
            Ok(StreamChunk::text("partial")),
            Ok(StreamChunk::final_chunk(FinishReason::Length)),
        ]);
        let answer = interpret_stream(s, Duration::from_secs(1)).await.unwrap();
        assert!(answer.truncated);
    }

    #[tokio::test]
    async fn test_early_error_propagates() {
        let s = chunks(vec![Err(Error::GenerationUnavailable("down".into()))]);
        let err = interpret_stream(s, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, Error::GenerationUnavailable(_)));
    }

    #[tokio::test]
    async fn test_mid_stream_error_keeps_partial() {
        let s = chunks(vec![
            Ok(StreamChunk::text("We are open")),
            Err(Error::GenerationUnavailable("reset".into())),
        ]);
        let answer = interpret_stream(s, Duration::from_secs(1)).await.unwrap();
        assert_eq!(answer.text, "We are open");
        assert!(answer.truncated);
    }

    #[tokio::test]
    async fn test_deadline_returns_partial() {
        let slow = Box::pin(async_slow_stream());
        let answer = interpret_stream(slow, Duration::from_millis(50)).await.unwrap();
        assert_eq!(answer.text, "first");
        assert!(answer.truncated);
    }

    fn async_slow_stream() -> impl Stream<Item = Result<StreamChunk>> + Send {
        stream::unfold(0u32, |step| async move {
            match step {
                0 => Some((Ok(StreamChunk::text("first")), 1)),
                1 => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Some((Ok(StreamChunk::text("late")), 2))
                }
                _ => None,
            }
        })
    }

    #[tokio::test]
    async fn test_stream_ending_without_final_is_error() {
        let s = chunks(vec![]);
        let err = interpret_stream(s, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, Error::GenerationUnavailable(_)));
    }
}
