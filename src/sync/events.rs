//! Inputs pushed into the synchronizer from outside.

use crate::auth::{Session, User};

/// Auth state change pushed by the backend (or by another part of the app
/// that observed one, such as an OAuth callback handler).
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    /// New user record for the signed-in user, e.g. after email confirmation.
    UserUpdated(User),
    SignedOut,
    /// The backend invalidated the session.
    SessionRevoked,
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "SIGNED_IN",
            AuthEvent::TokenRefreshed(_) => "TOKEN_REFRESHED",
            AuthEvent::UserUpdated(_) => "USER_UPDATED",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::SessionRevoked => "SESSION_REVOKED",
        }
    }
}

/// Connectivity or data event from the realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    Connected,
    Disconnected { reason: String },
    Error { message: String },
    /// Channel payload; carries no connectivity information.
    Message {
        topic: String,
        event: String,
        payload: serde_json::Value,
    },
}
