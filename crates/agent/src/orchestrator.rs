//! Session orchestrator
//!
//! Owns the per-session turn state machine. Each session runs one loop
//! task that consumes the utterance channel; every final utterance starts
//! a turn (retrieve, compose, generate, publish) as a spawned turn task.
//! A final utterance arriving mid-turn is a barge-in: the in-flight turn
//! is cancelled and aborted, and its answer is never published.
//!
//! State transitions happen only here and are observable through a watch
//! channel. Transcript ordering is delegated to [`TranscriptPublisher`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use faq_agent_core::{
    Error, GenerativeModel, Result, Sender, TranscriptEvent, TurnState, Utterance,
};
use faq_agent_llm::FALLBACK_GENERATION_FAILED;
use faq_agent_rag::Retriever;

use crate::composer::{ComposedAnswer, Composer};
use crate::interpreter::interpret_stream;
use crate::publisher::TranscriptPublisher;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Session closes after this long without any utterance; partials
    /// reset the timer too, since they prove the participant is speaking
    pub idle_timeout: Duration,
    /// Wall-clock budget per answer, from final utterance to publish
    pub response_deadline: Duration,
    /// Capacity of the per-session utterance channel
    pub utterance_buffer: usize,
    /// Transcript broadcast backlog per subscriber
    pub transcript_backlog: usize,
    /// Generation attempts before the failure fallback
    pub generation_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            response_deadline: Duration::from_secs(10),
            utterance_buffer: 64,
            transcript_backlog: 256,
            generation_attempts: 2,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_settings(session: &faq_agent_config::SessionConfig) -> Self {
        Self {
            idle_timeout: Duration::from_secs(session.idle_timeout_seconds),
            response_deadline: Duration::from_millis(session.response_deadline_ms),
            utterance_buffer: session.utterance_buffer,
            transcript_backlog: session.transcript_backlog,
            generation_attempts: session.generation_attempts,
        }
    }
}

/// Handle to one live session.
///
/// Dropping all handles closes the utterance channel, which ends the
/// session loop and moves the state to `Closed`.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    utterance_tx: mpsc::Sender<Utterance>,
    state_rx: watch::Receiver<TurnState>,
    publisher: Arc<TranscriptPublisher>,
    close_tx: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .finish()
    }
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Submit an utterance from the transcription feed.
    ///
    /// Fails with `SessionExpired` once the session loop has ended.
    pub async fn submit(&self, utterance: Utterance) -> Result<()> {
        self.utterance_tx
            .send(utterance)
            .await
            .map_err(|_| Error::SessionExpired(format!("session {} is closed", self.session_id)))
    }

    /// Current turn state.
    pub fn state(&self) -> TurnState {
        *self.state_rx.borrow()
    }

    /// Watch turn state transitions.
    pub fn watch_state(&self) -> watch::Receiver<TurnState> {
        self.state_rx.clone()
    }

    /// Subscribe to transcript events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.publisher.subscribe()
    }

    /// Number of live transcript subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.publisher.subscriber_count()
    }

    /// Close the session immediately.
    ///
    /// The loop ends and the state moves to `Closed` even while other
    /// handle clones are still alive; any in-flight turn is cancelled.
    pub fn close(&self) {
        let _ = self.close_tx.send(true);
    }
}

/// Shared dependencies for all sessions.
pub struct Orchestrator {
    retriever: Arc<Retriever>,
    composer: Arc<Composer>,
    model: Arc<dyn GenerativeModel>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        retriever: Arc<Retriever>,
        composer: Composer,
        model: Arc<dyn GenerativeModel>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            retriever,
            composer: Arc::new(composer),
            model,
            config,
        }
    }

    /// Start a session loop and return its handle.
    pub fn spawn_session(&self, session_id: impl Into<String>) -> SessionHandle {
        let session_id = session_id.into();
        let (utterance_tx, utterance_rx) = mpsc::channel(self.config.utterance_buffer);
        let (state_tx, state_rx) = watch::channel(TurnState::Idle);
        let (close_tx, close_rx) = watch::channel(false);
        let publisher = Arc::new(TranscriptPublisher::new(self.config.transcript_backlog));

        let ctx = TurnContext {
            session_id: session_id.clone(),
            retriever: self.retriever.clone(),
            composer: self.composer.clone(),
            model: self.model.clone(),
            state: Arc::new(state_tx),
            publisher: publisher.clone(),
            config: self.config.clone(),
        };

        tokio::spawn(session_loop(ctx, utterance_rx, close_rx));

        info!(session_id = %session_id, "Session started");

        SessionHandle {
            session_id,
            utterance_tx,
            state_rx,
            publisher,
            close_tx: Arc::new(close_tx),
        }
    }
}

struct TurnContext {
    session_id: String,
    retriever: Arc<Retriever>,
    composer: Arc<Composer>,
    model: Arc<dyn GenerativeModel>,
    state: Arc<watch::Sender<TurnState>>,
    publisher: Arc<TranscriptPublisher>,
    config: OrchestratorConfig,
}

async fn session_loop(
    ctx: TurnContext,
    mut utterances: mpsc::Receiver<Utterance>,
    mut close_rx: watch::Receiver<bool>,
) {
    let ctx = Arc::new(ctx);
    let _ = ctx.state.send(TurnState::AwaitingUtterance);

    let mut inflight: Option<(JoinHandle<()>, Arc<AtomicBool>)> = None;

    loop {
        let received = tokio::select! {
            received = tokio::time::timeout(ctx.config.idle_timeout, utterances.recv()) => received,
            changed = close_rx.changed() => {
                if changed.is_ok() {
                    info!(session_id = %ctx.session_id, "Session closed by participant");
                }
                break;
            }
        };

        let utterance = match received {
            Err(_) => {
                info!(session_id = %ctx.session_id, "Session idle timeout");
                break;
            }
            Ok(None) => {
                debug!(session_id = %ctx.session_id, "Utterance channel closed");
                break;
            }
            Ok(Some(u)) => u,
        };

        // Partials never start a turn; the next partial or final for the
        // same span supersedes them.
        if !utterance.is_final {
            debug!(
                session_id = %ctx.session_id,
                sequence = utterance.sequence,
                "Partial utterance"
            );
            continue;
        }

        if utterance.text.trim().is_empty() {
            continue;
        }

        // Barge-in: a final utterance cancels any turn still in flight.
        if let Some((handle, cancel)) = inflight.take() {
            if !handle.is_finished() {
                info!(session_id = %ctx.session_id, "Barge-in, cancelling in-flight turn");
                cancel.store(true, Ordering::SeqCst);
                handle.abort();
            }
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run_turn(ctx.clone(), utterance, cancel.clone()));
        inflight = Some((handle, cancel));
    }

    if let Some((handle, cancel)) = inflight.take() {
        cancel.store(true, Ordering::SeqCst);
        handle.abort();
    }
    let _ = ctx.state.send(TurnState::Closed);
}

/// One complete turn: retrieve, compose, generate, publish.
///
/// The cancel flag is checked before every state transition and before
/// every publish; a cancelled turn must leave no trace in the transcript
/// and must not touch the state machine again.
async fn run_turn(ctx: Arc<TurnContext>, utterance: Utterance, cancel: Arc<AtomicBool>) {
    let start = Instant::now();
    let cancelled = || cancel.load(Ordering::SeqCst);

    if cancelled() {
        return;
    }

    ctx.publisher.publish(TranscriptEvent::new(
        &ctx.session_id,
        Sender::User,
        &utterance.text,
    ));

    let _ = ctx.state.send(TurnState::Retrieving);

    let candidates = match ctx.retriever.retrieve(&utterance.text).await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(session_id = %ctx.session_id, error = %e, "Retrieval failed");
            finish_with_fallback(&ctx, &cancel);
            return;
        }
    };

    if cancelled() {
        return;
    }
    let _ = ctx.state.send(TurnState::Composing);

    let ComposedAnswer { request, context } = ctx.composer.compose(&utterance.text, candidates);

    if cancelled() {
        return;
    }
    let _ = ctx.state.send(TurnState::AwaitingGeneration);
    debug!(
        session_id = %ctx.session_id,
        grounded = context.grounded,
        entries = context.entries.len(),
        "Generating answer"
    );

    let mut attempt = 0;
    let answer = loop {
        let remaining = ctx.config.response_deadline.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break None;
        }

        let result = {
            let stream = ctx.model.generate_stream(request.clone());
            interpret_stream(stream, remaining).await
        };

        match result {
            Ok(answer) => break Some(answer),
            Err(e) if e.is_retryable() && attempt + 1 < ctx.config.generation_attempts => {
                warn!(
                    session_id = %ctx.session_id,
                    attempt,
                    error = %e,
                    "Generation failed, retrying"
                );
                attempt += 1;
            }
            Err(e) => {
                warn!(session_id = %ctx.session_id, error = %e, "Generation failed");
                break None;
            }
        }
    };

    if cancelled() {
        return;
    }

    match answer {
        Some(answer) if !answer.text.trim().is_empty() => {
            ctx.publisher.publish(
                TranscriptEvent::new(&ctx.session_id, Sender::Agent, answer.text)
                    .with_truncated(answer.truncated),
            );
            let _ = ctx.state.send(TurnState::AwaitingUtterance);
        }
        _ => finish_with_fallback(&ctx, &cancel),
    }
}

fn finish_with_fallback(ctx: &TurnContext, cancel: &AtomicBool) {
    if cancel.load(Ordering::SeqCst) {
        return;
    }
    ctx.publisher.publish(TranscriptEvent::new(
        &ctx.session_id,
        Sender::Agent,
        FALLBACK_GENERATION_FAILED,
    ));
    let _ = ctx.state.send(TurnState::AwaitingUtterance);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::ComposerSettings;
    use async_trait::async_trait;
    use faq_agent_core::{Embedder, FinishReason, GenerateRequest, StreamChunk};
    use faq_agent_rag::{EmbeddingIndex, RetrieverConfig, SharedIndex};
    use futures::Stream;
    use std::pin::Pin;

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                t if t.to_lowercase().contains("hours") => vec![1.0, 0.0, 0.0],
                t if t.to_lowercase().contains("refund") => vec![0.0, 1.0, 0.0],
                _ => vec![0.0, 0.0, 1.0],
            })
        }

        fn dim(&self) -> usize {
            3
        }

        fn model_version(&self) -> &str {
            "axis-v1"
        }
    }

    /// Echoes the grounded context back with a configurable delay.
    struct EchoModel {
        delay: Duration,
    }

    #[async_trait]
    impl GenerativeModel for EchoModel {
        fn generate_stream<'a>(
            &'a self,
            request: GenerateRequest,
        ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
            let context = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            let delay = self.delay;
            Box::pin(async_stream::stream! {
                tokio::time::sleep(delay).await;
                yield Ok(StreamChunk::text(context));
                yield Ok(StreamChunk::final_chunk(FinishReason::Stop));
            })
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    /// Always fails.
    struct DownModel;

    #[async_trait]
    impl GenerativeModel for DownModel {
        fn generate_stream<'a>(
            &'a self,
            _request: GenerateRequest,
        ) -> Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send + 'a>> {
            Box::pin(futures::stream::iter(vec![Err(
                Error::GenerationUnavailable("connection refused".into()),
            )]))
        }

        async fn is_available(&self) -> bool {
            false
        }

        fn model_name(&self) -> &str {
            "down"
        }
    }

    async fn orchestrator_with(model: Arc<dyn GenerativeModel>, config: OrchestratorConfig) -> Orchestrator {
        let entries = vec![
            faq_agent_core::KnowledgeEntry::new(
                "faq-1",
                "Q: What are your business hours? A: We are open Monday to Friday from 9 AM to 6 PM.",
            ),
            faq_agent_core::KnowledgeEntry::new(
                "faq-2",
                "Q: What is your refund policy? A: 60-day money-back guarantee.",
            ),
        ];
        let index = SharedIndex::new(
            EmbeddingIndex::build(entries, &AxisEmbedder).await.unwrap(),
        );
        let retriever = Retriever::new(
            Arc::new(AxisEmbedder),
            index,
            RetrieverConfig {
                backoff_initial: Duration::from_millis(1),
                ..Default::default()
            },
        );
        Orchestrator::new(
            Arc::new(retriever),
            Composer::new(ComposerSettings::default()),
            model,
            config,
        )
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            idle_timeout: Duration::from_secs(5),
            response_deadline: Duration::from_secs(2),
            ..Default::default()
        }
    }

    async fn recv_agent_event(
        rx: &mut broadcast::Receiver<TranscriptEvent>,
    ) -> TranscriptEvent {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(3), rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("channel closed");
            if event.sender == Sender::Agent {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn test_grounded_turn_publishes_answer() {
        let orchestrator = orchestrator_with(
            Arc::new(EchoModel {
                delay: Duration::from_millis(5),
            }),
            fast_config(),
        )
        .await;
        let handle = orchestrator.spawn_session("s1");
        let mut rx = handle.subscribe();

        handle
            .submit(Utterance::final_segment("s1", "What are your business hours?", 1))
            .await
            .unwrap();

        let user = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.sender, Sender::User);
        assert_eq!(user.text, "What are your business hours?");

        let agent = recv_agent_event(&mut rx).await;
        assert!(agent.text.contains("9 AM to 6 PM"));
        assert!(!agent.truncated);
        assert_eq!(handle.state(), TurnState::AwaitingUtterance);
    }

    #[tokio::test]
    async fn test_ungrounded_turn_still_generates() {
        let orchestrator = orchestrator_with(
            Arc::new(EchoModel {
                delay: Duration::from_millis(5),
            }),
            fast_config(),
        )
        .await;
        let handle = orchestrator.spawn_session("s1");
        let mut rx = handle.subscribe();

        // Maps to an axis orthogonal to both entries, below min_score.
        handle
            .submit(Utterance::final_segment("s1", "tell me a joke", 1))
            .await
            .unwrap();

        // The model is still invoked; its prompt carries the no-match note
        // instead of FAQ entries.
        let agent = recv_agent_event(&mut rx).await;
        assert!(agent.text.contains("No FAQ entries matched"), "got: {}", agent.text);
        assert!(agent.text.contains("tell me a joke"));
    }

    #[tokio::test]
    async fn test_barge_in_suppresses_stale_answer() {
        let orchestrator = orchestrator_with(
            Arc::new(EchoModel {
                delay: Duration::from_millis(500),
            }),
            fast_config(),
        )
        .await;
        let handle = orchestrator.spawn_session("s1");
        let mut rx = handle.subscribe();

        handle
            .submit(Utterance::final_segment("s1", "What are your business hours?", 1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle
            .submit(Utterance::final_segment("s1", "What is your refund policy?", 2))
            .await
            .unwrap();

        // Only one agent answer arrives, and it answers the second question.
        let agent = recv_agent_event(&mut rx).await;
        assert!(agent.text.contains("money-back"), "got: {}", agent.text);

        // No further agent events.
        tokio::time::sleep(Duration::from_millis(700)).await;
        let mut extra_agent = 0;
        while let Ok(event) = rx.try_recv() {
            if event.sender == Sender::Agent {
                extra_agent += 1;
            }
        }
        assert_eq!(extra_agent, 0);
    }

    #[tokio::test]
    async fn test_generation_failure_falls_back() {
        let orchestrator = orchestrator_with(Arc::new(DownModel), fast_config()).await;
        let handle = orchestrator.spawn_session("s1");
        let mut rx = handle.subscribe();

        handle
            .submit(Utterance::final_segment("s1", "What are your business hours?", 1))
            .await
            .unwrap();

        let agent = recv_agent_event(&mut rx).await;
        assert_eq!(agent.text, FALLBACK_GENERATION_FAILED);
        assert_eq!(handle.state(), TurnState::AwaitingUtterance);
    }

    #[tokio::test]
    async fn test_partials_do_not_start_turns() {
        let orchestrator = orchestrator_with(
            Arc::new(EchoModel {
                delay: Duration::from_millis(5),
            }),
            fast_config(),
        )
        .await;
        let handle = orchestrator.spawn_session("s1");
        let mut rx = handle.subscribe();

        handle
            .submit(Utterance::partial("s1", "what are", 1))
            .await
            .unwrap();
        handle
            .submit(Utterance::partial("s1", "what are your business", 2))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(handle.state(), TurnState::AwaitingUtterance);
    }

    #[tokio::test]
    async fn test_idle_timeout_closes_session() {
        let orchestrator = orchestrator_with(
            Arc::new(EchoModel {
                delay: Duration::from_millis(5),
            }),
            OrchestratorConfig {
                idle_timeout: Duration::from_millis(50),
                ..fast_config()
            },
        )
        .await;
        let handle = orchestrator.spawn_session("s1");
        let mut state = handle.watch_state();

        tokio::time::timeout(Duration::from_secs(2), async {
            while *state.borrow() != TurnState::Closed {
                state.changed().await.unwrap();
            }
        })
        .await
        .expect("session did not close");

        let err = handle
            .submit(Utterance::final_segment("s1", "hello hours", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionExpired(_)));
    }

    #[tokio::test]
    async fn test_close_transitions_to_closed() {
        let orchestrator = orchestrator_with(
            Arc::new(EchoModel {
                delay: Duration::from_millis(5),
            }),
            fast_config(),
        )
        .await;
        let handle = orchestrator.spawn_session("s1");
        // A second clone stays alive; close must not wait for it.
        let _other = handle.clone();
        let mut state = handle.watch_state();

        handle.close();

        tokio::time::timeout(Duration::from_secs(2), async {
            while *state.borrow() != TurnState::Closed {
                state.changed().await.unwrap();
            }
        })
        .await
        .expect("session did not close");

        let err = handle
            .submit(Utterance::final_segment("s1", "hello hours", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionExpired(_)));
    }

    #[tokio::test]
    async fn test_partials_reset_idle_timer() {
        let orchestrator = orchestrator_with(
            Arc::new(EchoModel {
                delay: Duration::from_millis(5),
            }),
            OrchestratorConfig {
                idle_timeout: Duration::from_millis(150),
                ..fast_config()
            },
        )
        .await;
        let handle = orchestrator.spawn_session("s1");

        // Keep speaking in partials for longer than the idle timeout.
        for sequence in 1..=6 {
            handle
                .submit(Utterance::partial("s1", "what are your", sequence))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(handle.state(), TurnState::AwaitingUtterance);

        // Silence lets the timeout fire.
        let mut state = handle.watch_state();
        tokio::time::timeout(Duration::from_secs(2), async {
            while *state.borrow() != TurnState::Closed {
                state.changed().await.unwrap();
            }
        })
        .await
        .expect("session did not close after silence");
    }

    #[tokio::test]
    async fn test_sequences_increase_across_turns() {
        let orchestrator = orchestrator_with(
            Arc::new(EchoModel {
                delay: Duration::from_millis(5),
            }),
            fast_config(),
        )
        .await;
        let handle = orchestrator.spawn_session("s1");
        let mut rx = handle.subscribe();

        handle
            .submit(Utterance::final_segment("s1", "What are your business hours?", 1))
            .await
            .unwrap();
        recv_agent_event(&mut rx).await;

        handle
            .submit(Utterance::final_segment("s1", "What is your refund policy?", 2))
            .await
            .unwrap();
        let user2 = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user2.sender, Sender::User);
        assert_eq!(user2.sequence, 3);
        let agent2 = recv_agent_event(&mut rx).await;
        assert_eq!(agent2.sequence, 4);
    }
}
