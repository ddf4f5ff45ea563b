//! Generative capability trait

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::{GenerateRequest, Result, StreamChunk};

/// Generative model interface
///
/// Implementations:
/// - `HttpGenerator` - OpenAI-style chat completion endpoint
/// - test doubles that script chunk sequences
#[async_trait]
pub trait GenerativeModel: Send + Sync + 'static {
    /// Stream tokens as generated.
    ///
    /// The stream ends with a chunk whose `is_final` is true, or with an
    /// `Err` item when the backend fails mid-stream. Callers treat a
    /// mid-stream error as `GenerationUnavailable` for the whole answer.
    fn generate_stream<'a>(
        &'a self,
        request: GenerateRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>>;

    /// Check if the backend is reachable.
    async fn is_available(&self) -> bool;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FinishReason;
    use futures::StreamExt;

    struct ScriptedModel;

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        fn generate_stream<'a>(
            &'a self,
            _request: GenerateRequest,
        ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
            Box::pin(futures::stream::iter(vec![
                Ok(StreamChunk::text("Hello")),
                Ok(StreamChunk::final_chunk(FinishReason::Stop)),
            ]))
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_scripted_stream_terminates() {
        let model = ScriptedModel;
        let chunks: Vec<_> = model
            .generate_stream(GenerateRequest::default())
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].as_ref().unwrap().is_final);
    }
}
