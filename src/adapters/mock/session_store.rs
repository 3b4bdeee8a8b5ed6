//! In-memory session store for testing.
//!
//! Clones share the same storage, so one store can outlive a synchronizer
//! and be handed to the next one to simulate a process restart.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::auth::Session;
use crate::traits::{SessionStore, StoreError};

/// In-memory session store for testing.
///
/// # Example
///
/// ```ignore
/// use neatrix_session::adapters::mock::InMemorySessionStore;
/// use neatrix_session::traits::SessionStore;
///
/// let store = InMemorySessionStore::new();
/// assert!(store.load().await?.is_none());
///
/// store.save(&session).await?;
/// assert_eq!(store.load().await?, Some(session));
///
/// store.clear().await?;
/// assert!(store.get_session().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    session: Arc<Mutex<Option<Session>>>,
    save_should_fail: Arc<Mutex<bool>>,
    load_should_fail: Arc<Mutex<bool>>,
    clear_should_fail: Arc<Mutex<bool>>,
    /// The next save waits on this gate before writing
    save_gate: Arc<Mutex<Option<Arc<Notify>>>>,
    save_calls: Arc<AtomicUsize>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `session`.
    pub fn with_session(session: Session) -> Self {
        let store = Self::new();
        store.set_session(Some(session));
        store
    }

    /// Configure whether save should fail.
    pub fn set_save_should_fail(&self, should_fail: bool) {
        *self.save_should_fail.lock().unwrap() = should_fail;
    }

    /// Configure whether load should fail.
    pub fn set_load_should_fail(&self, should_fail: bool) {
        *self.load_should_fail.lock().unwrap() = should_fail;
    }

    /// Configure whether clear should fail.
    pub fn set_clear_should_fail(&self, should_fail: bool) {
        *self.clear_should_fail.lock().unwrap() = should_fail;
    }

    /// Hold the next save until `gate` is notified.
    pub fn gate_next_save(&self, gate: Arc<Notify>) {
        *self.save_gate.lock().unwrap() = Some(gate);
    }

    /// Number of save calls started so far, including gated ones.
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Get the stored session synchronously.
    pub fn get_session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }

    /// Set the stored session synchronously.
    pub fn set_session(&self, session: Option<Session>) {
        *self.session.lock().unwrap() = session;
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self) -> Result<Option<Session>, StoreError> {
        if *self.load_should_fail.lock().unwrap() {
            return Err(StoreError::LoadFailed("Mock load failure".to_string()));
        }
        Ok(self.get_session())
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.save_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if *self.save_should_fail.lock().unwrap() {
            return Err(StoreError::SaveFailed("Mock save failure".to_string()));
        }
        self.set_session(Some(session.clone()));
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        if *self.clear_should_fail.lock().unwrap() {
            return Err(StoreError::ClearFailed("Mock clear failure".to_string()));
        }
        self.set_session(None);
        Ok(())
    }
}
