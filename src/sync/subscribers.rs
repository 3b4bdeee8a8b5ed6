//! Snapshot fan-out to subscribers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use super::state::AuthSnapshot;

type SnapshotSender = mpsc::UnboundedSender<Arc<AuthSnapshot>>;

/// Registered subscriber channels.
#[derive(Debug, Default)]
pub(crate) struct SubscriberRegistry {
    next_id: u64,
    senders: HashMap<u64, SnapshotSender>,
    closed: bool,
}

impl SubscriberRegistry {
    /// Register a channel and seed it with `current`.
    ///
    /// A closed registry hands out a receiver that yields only `current`.
    pub fn add(
        &mut self,
        current: &Arc<AuthSnapshot>,
    ) -> (u64, mpsc::UnboundedReceiver<Arc<AuthSnapshot>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(current.clone());
        self.next_id += 1;
        if !self.closed {
            self.senders.insert(self.next_id, tx);
        }
        (self.next_id, rx)
    }

    pub fn remove(&mut self, id: u64) -> bool {
        self.senders.remove(&id).is_some()
    }

    /// Deliver to every subscriber, dropping the ones whose receiver is gone.
    pub fn publish(&mut self, snapshot: &Arc<AuthSnapshot>) {
        self.senders.retain(|id, tx| {
            let alive = tx.send(snapshot.clone()).is_ok();
            if !alive {
                debug!(subscriber = id, "Dropping closed subscriber");
            }
            alive
        });
    }

    /// Drop every sender so receivers end after draining.
    pub fn close(&mut self) {
        self.closed = true;
        self.senders.clear();
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }
}

/// Receiving end of [`SessionSynchronizer::subscribe`](super::SessionSynchronizer::subscribe).
///
/// The first snapshot received is the state at subscription time. Dropping
/// the subscription unsubscribes it.
#[derive(Debug)]
pub struct StateSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<Arc<AuthSnapshot>>,
    registry: Weak<Mutex<SubscriberRegistry>>,
    active: bool,
}

impl StateSubscription {
    pub(crate) fn new(
        id: u64,
        rx: mpsc::UnboundedReceiver<Arc<AuthSnapshot>>,
        registry: Weak<Mutex<SubscriberRegistry>>,
    ) -> Self {
        Self {
            id,
            rx,
            registry,
            active: true,
        }
    }

    /// Wait for the next snapshot. Returns None once unsubscribed or the
    /// synchronizer is disposed and buffered snapshots are drained.
    pub async fn recv(&mut self) -> Option<Arc<AuthSnapshot>> {
        self.rx.recv().await
    }

    /// Take a buffered snapshot without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<AuthSnapshot>> {
        self.rx.try_recv().ok()
    }

    /// Drain buffered snapshots and return the newest one.
    pub fn latest(&mut self) -> Option<Arc<AuthSnapshot>> {
        let mut latest = None;
        while let Some(snapshot) = self.try_recv() {
            latest = Some(snapshot);
        }
        latest
    }

    /// Stop receiving snapshots. Safe to call repeatedly, and after the
    /// synchronizer is gone.
    pub fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().unwrap().remove(self.id);
        }
        self.rx.close();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for StateSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
