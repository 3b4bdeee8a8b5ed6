//! Realtime connection trait abstraction.
//!
//! The synchronizer only needs the stream of connectivity events from the
//! backend push channel, so that is all this seam exposes.

use tokio::sync::broadcast;

use crate::sync::RealtimeEvent;

/// Trait for the backend's realtime push connection.
///
/// Events are broadcast in the order the transport observed them. Multiple
/// subscribers can exist simultaneously.
pub trait RealtimeConnection: Send + Sync {
    /// Subscribe to connectivity and message events.
    fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent>;

    /// Close the connection and stop reconnecting.
    fn shutdown(&self);
}
