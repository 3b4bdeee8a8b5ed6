//! Mock realtime connection for testing.
//!
//! Events are injected by the test and broadcast to subscribers exactly as a
//! live connection would report them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::sync::RealtimeEvent;
use crate::traits::RealtimeConnection;

/// Mock realtime connection for testing.
///
/// # Example
///
/// ```ignore
/// use neatrix_session::adapters::mock::MockRealtime;
/// use neatrix_session::sync::RealtimeEvent;
///
/// let realtime = MockRealtime::new();
/// synchronizer.attach_realtime(Arc::new(realtime.clone()));
///
/// realtime.emit(RealtimeEvent::Connected);
/// ```
#[derive(Debug, Clone)]
pub struct MockRealtime {
    events_tx: broadcast::Sender<RealtimeEvent>,
    shut_down: Arc<AtomicBool>,
}

impl MockRealtime {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(100);
        Self {
            events_tx,
            shut_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Broadcast an event to all subscribers.
    pub fn emit(&self, event: RealtimeEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.events_tx.send(event);
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = RealtimeEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.events_tx.receiver_count()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Default for MockRealtime {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeConnection for MockRealtime {
    fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events_tx.subscribe()
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
