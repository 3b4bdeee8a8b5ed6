//! Published auth state.
//!
//! An [`AuthSnapshot`] is never modified after it is built. Each change
//! produces a new snapshot with the next revision number.

use std::fmt;

use crate::auth::{Session, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailStatus {
    Verified,
    Unverified,
}

/// Where the process is in the auth lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Uninitialized,
    Initializing,
    Authenticated(EmailStatus),
    Unauthenticated,
}

impl AuthPhase {
    /// Phase implied by holding `session`.
    pub fn for_session(session: &Session) -> Self {
        if session.is_email_verified() {
            AuthPhase::Authenticated(EmailStatus::Verified)
        } else {
            AuthPhase::Authenticated(EmailStatus::Unverified)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthPhase::Uninitialized => "uninitialized",
            AuthPhase::Initializing => "initializing",
            AuthPhase::Authenticated(EmailStatus::Verified) => "authenticated",
            AuthPhase::Authenticated(EmailStatus::Unverified) => "authenticated (email unverified)",
            AuthPhase::Unauthenticated => "unauthenticated",
        }
    }
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Realtime channel connectivity. Disconnected until the first event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub connected: bool,
    pub last_error: Option<String>,
}

/// What produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChange {
    Initial,
    Initializing,
    /// A persisted session was validated at startup.
    Restored,
    /// Startup found nothing usable to restore.
    NoSession,
    SignedIn,
    SignedUp,
    /// Account created; waiting for the email confirmation.
    VerificationPending,
    TokenRefreshed,
    UserUpdated,
    EmailVerified,
    SignedOut,
    SessionExpired,
    SessionRevoked,
    ConnectionChanged,
}

/// Immutable view of the auth state handed to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    /// Strictly increasing per synchronizer.
    pub revision: u64,
    pub phase: AuthPhase,
    pub session: Option<Session>,
    pub connection: ConnectionState,
    /// Email of an account created but not yet confirmed.
    pub pending_verification: Option<String>,
    pub change: AuthChange,
}

impl AuthSnapshot {
    pub(crate) fn initial() -> Self {
        Self {
            revision: 0,
            phase: AuthPhase::Uninitialized,
            session: None,
            connection: ConnectionState::default(),
            pending_verification: None,
            change: AuthChange::Initial,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.phase, AuthPhase::Authenticated(_))
    }

    pub fn is_email_verified(&self) -> bool {
        self.phase == AuthPhase::Authenticated(EmailStatus::Verified)
    }

    pub fn is_initializing(&self) -> bool {
        self.phase == AuthPhase::Initializing
    }

    pub fn is_realtime_connected(&self) -> bool {
        self.connection.connected
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }
}

/// Auth part of the next snapshot.
#[derive(Debug, Clone)]
pub(crate) struct Transition {
    pub phase: AuthPhase,
    pub session: Option<Session>,
    pub pending_verification: Option<String>,
    pub change: AuthChange,
}

impl Transition {
    pub fn authenticated(session: Session, change: AuthChange) -> Self {
        Self {
            phase: AuthPhase::for_session(&session),
            session: Some(session),
            pending_verification: None,
            change,
        }
    }

    pub fn unauthenticated(change: AuthChange) -> Self {
        Self {
            phase: AuthPhase::Unauthenticated,
            session: None,
            pending_verification: None,
            change,
        }
    }

    pub fn initializing() -> Self {
        Self {
            phase: AuthPhase::Initializing,
            session: None,
            pending_verification: None,
            change: AuthChange::Initializing,
        }
    }
}

impl AuthSnapshot {
    pub(crate) fn next(&self, transition: Transition) -> Self {
        Self {
            revision: self.revision + 1,
            phase: transition.phase,
            session: transition.session,
            connection: self.connection.clone(),
            pending_verification: transition.pending_verification,
            change: transition.change,
        }
    }

    pub(crate) fn with_connection(&self, connection: ConnectionState) -> Self {
        Self {
            revision: self.revision + 1,
            connection,
            change: AuthChange::ConnectionChanged,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::fixtures;

    #[test]
    fn test_initial_snapshot() {
        let snapshot = AuthSnapshot::initial();
        assert_eq!(snapshot.phase, AuthPhase::Uninitialized);
        assert!(!snapshot.is_authenticated());
        assert!(!snapshot.is_initializing());
        assert!(!snapshot.is_realtime_connected());
        assert!(snapshot.current_session().is_none());
    }

    #[test]
    fn test_phase_for_session() {
        let mut session = fixtures::session("u1", "a@example.com", 3600);
        assert_eq!(
            AuthPhase::for_session(&session),
            AuthPhase::Authenticated(EmailStatus::Verified)
        );
        session.user.email_confirmed_at = None;
        assert_eq!(
            AuthPhase::for_session(&session),
            AuthPhase::Authenticated(EmailStatus::Unverified)
        );
    }

    #[test]
    fn test_next_bumps_revision_and_keeps_connection() {
        let connected = AuthSnapshot::initial().with_connection(ConnectionState {
            connected: true,
            last_error: None,
        });
        assert_eq!(connected.revision, 1);
        assert_eq!(connected.change, AuthChange::ConnectionChanged);

        let session = fixtures::session("u1", "a@example.com", 3600);
        let signed_in = connected.next(Transition::authenticated(session, AuthChange::SignedIn));
        assert_eq!(signed_in.revision, 2);
        assert!(signed_in.is_authenticated());
        assert!(signed_in.is_email_verified());
        assert!(signed_in.is_realtime_connected());
        assert_eq!(signed_in.user().unwrap().id, "u1");
    }

    #[test]
    fn test_unverified_is_authenticated_but_not_verified() {
        let mut session = fixtures::session("u1", "a@example.com", 3600);
        session.user.email_confirmed_at = None;
        let snapshot =
            AuthSnapshot::initial().next(Transition::authenticated(session, AuthChange::SignedIn));
        assert!(snapshot.is_authenticated());
        assert!(!snapshot.is_email_verified());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(AuthPhase::Unauthenticated.to_string(), "unauthenticated");
        assert_eq!(
            AuthPhase::Authenticated(EmailStatus::Unverified).to_string(),
            "authenticated (email unverified)"
        );
    }
}
