//! Session store trait abstraction.
//!
//! The persisted session survives process restarts. Production code stores it
//! in a JSON file named after the configured storage key; tests use an
//! in-memory store.

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::Session;

/// Session storage errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("failed to read session: {0}")]
    LoadFailed(String),
    #[error("failed to write session: {0}")]
    SaveFailed(String),
    #[error("failed to clear session: {0}")]
    ClearFailed(String),
    #[error("stored session is corrupt: {0}")]
    Corrupt(String),
}

/// Trait for persisted session storage.
///
/// # Example
///
/// ```ignore
/// use neatrix_session::traits::SessionStore;
///
/// async fn restore<S: SessionStore>(store: &S) -> Option<Session> {
///     store.load().await.ok().flatten().filter(|s| !s.is_expired())
/// }
/// ```
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the persisted session.
    ///
    /// # Returns
    /// - `Ok(Some(session))` if one is stored
    /// - `Ok(None)` if nothing is stored
    /// - `Err(error)` if reading failed
    async fn load(&self) -> Result<Option<Session>, StoreError>;

    /// Persist a session, replacing any previous one.
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Remove the persisted session. Succeeds if nothing was stored.
    async fn clear(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        assert_eq!(
            StoreError::LoadFailed("permission denied".to_string()).to_string(),
            "failed to read session: permission denied"
        );
        assert_eq!(
            StoreError::Corrupt("expected value".to_string()).to_string(),
            "stored session is corrupt: expected value"
        );
    }
}
