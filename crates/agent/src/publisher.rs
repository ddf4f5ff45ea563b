//! Transcript publisher
//!
//! Per-session fan-out of transcript events. Sequence numbers are assigned
//! here, at publish time, so subscribers see one strictly increasing
//! sequence per session regardless of which task produced the event. Slow
//! subscribers lag and get dropped by the transport layer; publishing
//! itself never blocks on them.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tracing::debug;

use faq_agent_core::TranscriptEvent;

/// Ordered transcript event fan-out for one session.
pub struct TranscriptPublisher {
    tx: broadcast::Sender<TranscriptEvent>,
    sequence: AtomicU64,
}

impl TranscriptPublisher {
    pub fn new(backlog: usize) -> Self {
        let (tx, _) = broadcast::channel(backlog);
        Self {
            tx,
            sequence: AtomicU64::new(0),
        }
    }

    /// Publish an event, assigning the next sequence number.
    ///
    /// Returns the published event. No subscribers is not an error; the
    /// event is simply dropped after sequencing, keeping numbering
    /// consistent for later subscribers.
    pub fn publish(&self, mut event: TranscriptEvent) -> TranscriptEvent {
        event.sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            session_id = %event.session_id,
            sequence = event.sequence,
            sender = ?event.sender,
            "Publishing transcript event"
        );
        let _ = self.tx.send(event.clone());
        event
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
