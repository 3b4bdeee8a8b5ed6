//! The session synchronizer.
//!
//! Owns the single source of truth for "who is signed in" and publishes
//! every change as an [`AuthSnapshot`].
//!
//! Concurrent operations are ordered by ticket. Each operation takes the
//! next ticket when it is issued; its result is applied only if no
//! later-issued operation has been applied in the meantime, otherwise it
//! fails with [`AuthErrorReason::Superseded`](crate::error::AuthErrorReason)
//! and the published state is left alone. Store writes happen under the
//! same lock as the commit, so the persisted session always matches the
//! last applied operation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{AuthEvent, RealtimeEvent};
use super::refresh;
use super::state::{AuthChange, AuthPhase, AuthSnapshot, ConnectionState, Transition};
use super::subscribers::{StateSubscription, SubscriberRegistry};
use crate::adapters::{FileSessionStore, ReqwestHttpClient};
use crate::auth::{GoTrueApi, OAuthOptions, OAuthRedirect, Session, SignUpOutcome, User};
use crate::config::BackendConfig;
use crate::error::{AuthError, AuthErrorReason, ConfigurationError, SessionError, SessionResult};
use crate::traits::{HttpClient, RealtimeConnection, SessionStore, StoreError};
use crate::transport::ResilientClient;

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex pattern"));

/// Outcome of [`SessionSynchronizer::sign_out`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignOutReport {
    /// A session was held when sign-out was issued.
    pub was_signed_in: bool,
    /// The backend confirmed the refresh token is revoked.
    pub remote_revoked: bool,
}

/// What to do with the persisted session alongside a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persist {
    /// Store the session the transition carries, as built under the lock.
    Save,
    Clear,
    Keep,
}

struct State {
    snapshot: Arc<AuthSnapshot>,
    /// Ticket of the last applied operation.
    applied: u64,
    disposed: bool,
}

/// Single source of truth for the auth state of the process.
///
/// # Example
///
/// ```ignore
/// let sync = SessionSynchronizer::from_config(BackendConfig::from_env())?;
/// let mut states = sync.subscribe();
/// sync.initialize().await;
/// sync.spawn_auto_refresh();
///
/// while let Some(snapshot) = states.recv().await {
///     println!("{} (rev {})", snapshot.phase, snapshot.revision);
/// }
/// ```
pub struct SessionSynchronizer {
    config: BackendConfig,
    api: GoTrueApi,
    store: Arc<dyn SessionStore>,
    state: Mutex<State>,
    subscribers: Arc<Mutex<SubscriberRegistry>>,
    tickets: AtomicU64,
    persist: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    realtime: Mutex<Vec<Arc<dyn RealtimeConnection>>>,
}

impl SessionSynchronizer {
    /// Build a synchronizer over the given transport and store.
    ///
    /// Fails if the backend coordinates are missing or malformed. Nothing is
    /// loaded until [`initialize`](Self::initialize).
    pub fn new(
        config: BackendConfig,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Arc<Self>, ConfigurationError> {
        config.validate()?;

        let shutdown = CancellationToken::new();
        let client =
            ResilientClient::new(http, config.retry.clone()).with_shutdown(shutdown.child_token());
        let api = GoTrueApi::new(client, config.clone());

        Ok(Arc::new(Self {
            config,
            api,
            store,
            state: Mutex::new(State {
                snapshot: Arc::new(AuthSnapshot::initial()),
                applied: 0,
                disposed: false,
            }),
            subscribers: Arc::new(Mutex::new(SubscriberRegistry::default())),
            tickets: AtomicU64::new(0),
            persist: tokio::sync::Mutex::new(()),
            shutdown,
            tasks: Mutex::new(Vec::new()),
            realtime: Mutex::new(Vec::new()),
        }))
    }

    /// Production wiring: reqwest transport and a file store under the
    /// configured storage key.
    pub fn from_config(config: BackendConfig) -> Result<Arc<Self>, ConfigurationError> {
        let store = FileSessionStore::from_config(&config);
        Self::new(config, Arc::new(ReqwestHttpClient::new()), Arc::new(store))
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// The latest published snapshot.
    pub fn current(&self) -> Arc<AuthSnapshot> {
        self.state.lock().unwrap().snapshot.clone()
    }

    /// Receive every snapshot published from now on, starting with the
    /// current one.
    pub fn subscribe(&self) -> StateSubscription {
        // Hold the state lock so no publication slips between seeding and
        // registration.
        let state = self.state.lock().unwrap();
        let (id, rx) = self.subscribers.lock().unwrap().add(&state.snapshot);
        StateSubscription::new(id, rx, Arc::downgrade(&self.subscribers))
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().unwrap().disposed
    }

    // ---------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------

    /// Restore the persisted session, if any, and validate it with the
    /// backend.
    ///
    /// Never fails: unreadable storage, an expired session or an
    /// unreachable backend all end in `Unauthenticated` with a logged
    /// diagnostic.
    pub async fn initialize(&self) -> Arc<AuthSnapshot> {
        let ticket = self.issue();
        if let Err(e) = self
            .apply(ticket, Persist::Keep, |_| Some(Transition::initializing()))
            .await
        {
            debug!(reason = %e.reason, "Initialization superseded before it started");
            return self.current();
        }

        let stored = match self.store.load().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session");
                let persist = if matches!(e, StoreError::Corrupt(_)) {
                    Persist::Clear
                } else {
                    Persist::Keep
                };
                return self
                    .settle(ticket, persist, Transition::unauthenticated(AuthChange::NoSession))
                    .await;
            }
        };

        let Some(session) = stored else {
            debug!("No persisted session");
            return self
                .settle(ticket, Persist::Keep, Transition::unauthenticated(AuthChange::NoSession))
                .await;
        };

        if session.is_expired() {
            info!(user_id = %session.user_id(), "Persisted session expired, discarding");
            return self
                .settle(
                    ticket,
                    Persist::Clear,
                    Transition::unauthenticated(AuthChange::SessionExpired),
                )
                .await;
        }

        match self.api.get_user(&session.access_token).await {
            Ok(user) => {
                let session = session.with_user(user);
                info!(user_id = %session.user_id(), "Restored persisted session");
                self.settle(
                    ticket,
                    Persist::Save,
                    Transition::authenticated(session.clone(), AuthChange::Restored),
                )
                .await
            }
            Err(e) if e.requires_reauth() => {
                info!(error = %e, "Persisted session rejected by backend, discarding");
                self.settle(
                    ticket,
                    Persist::Clear,
                    Transition::unauthenticated(AuthChange::SessionExpired),
                )
                .await
            }
            Err(e) => {
                warn!(error = %e, "Could not validate persisted session");
                self.settle(ticket, Persist::Keep, Transition::unauthenticated(AuthChange::NoSession))
                    .await
            }
        }
    }

    /// Password sign-in.
    pub async fn sign_in(&self, email: &str, password: &str) -> SessionResult<Session> {
        let email = validate_credentials(email, password)?;
        let ticket = self.issue();
        info!(ticket, "Signing in");

        let session = self.api.sign_in_with_password(&email, password).await?;
        self.adopt_session(ticket, session, AuthChange::SignedIn).await
    }

    /// Create an account. `profile` is stored as the user's metadata.
    ///
    /// When the backend requires email confirmation the result is
    /// [`SignUpOutcome::VerificationRequired`] and no session is
    /// established; the pending email is recorded in the next snapshot.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &Value,
    ) -> SessionResult<SignUpOutcome> {
        let email = validate_credentials(email, password)?;
        let ticket = self.issue();
        info!(ticket, "Signing up");

        match self.api.sign_up(&email, password, profile).await? {
            SignUpOutcome::SignedIn(session) => {
                let session = self.adopt_session(ticket, session, AuthChange::SignedUp).await?;
                Ok(SignUpOutcome::SignedIn(session))
            }
            SignUpOutcome::VerificationRequired(user) => {
                let pending = user.email.clone().unwrap_or_else(|| email.clone());
                self.apply(ticket, Persist::Keep, |current| {
                    Some(Transition {
                        phase: current.phase,
                        session: current.session.clone(),
                        pending_verification: Some(pending),
                        change: AuthChange::VerificationPending,
                    })
                })
                .await?;
                info!(user_id = %user.id, "Account created, email confirmation pending");
                Ok(SignUpOutcome::VerificationRequired(user))
            }
        }
    }

    /// Authorize URL and PKCE verifier for a provider sign-in.
    ///
    /// Keep the verifier until the callback arrives, then pass both to
    /// [`complete_oauth`](Self::complete_oauth).
    pub fn begin_oauth(&self, options: &OAuthOptions) -> OAuthRedirect {
        self.api.begin_oauth(options)
    }

    /// Exchange an OAuth callback code for a session.
    pub async fn complete_oauth(&self, auth_code: &str, code_verifier: &str) -> SessionResult<Session> {
        if auth_code.trim().is_empty() {
            return Err(AuthError::new(AuthErrorReason::OAuthFailed, "missing authorization code").into());
        }
        let ticket = self.issue();
        info!(ticket, "Completing OAuth sign-in");

        let session = self
            .api
            .exchange_code_for_session(auth_code.trim(), code_verifier)
            .await?;
        self.adopt_session(ticket, session, AuthChange::SignedIn).await
    }

    /// Sign out locally, then revoke the session remotely.
    ///
    /// Local state and the persisted session are cleared before the
    /// backend is contacted, and a failed revocation is only logged.
    /// Calling this while signed out is a no-op.
    pub async fn sign_out(&self) -> SignOutReport {
        let ticket = self.issue();
        let previous = self.current().session.clone();

        let signed_out = {
            let current = self.current();
            current.session.is_none() && current.phase == AuthPhase::Unauthenticated
        };
        let applied = if signed_out {
            self.fence(ticket).await
        } else {
            self.apply(ticket, Persist::Clear, |_| {
                Some(Transition::unauthenticated(AuthChange::SignedOut))
            })
            .await
            .map(|_| ())
        };
        if let Err(e) = applied {
            debug!(reason = %e.reason, "Sign-out superseded by a later operation");
        }

        let Some(session) = previous else {
            debug!("Sign-out without a session");
            return SignOutReport {
                was_signed_in: false,
                remote_revoked: false,
            };
        };

        info!(user_id = %session.user_id(), "Signed out");
        let remote_revoked = match self.api.sign_out(&session.access_token).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to revoke session remotely");
                false
            }
        };

        SignOutReport {
            was_signed_in: true,
            remote_revoked,
        }
    }

    /// Refresh the access token now.
    ///
    /// A rejected refresh token ends the session. A network failure keeps
    /// it unless the access token has already expired.
    pub async fn refresh_now(&self) -> SessionResult<Session> {
        let current = self
            .current()
            .session
            .clone()
            .ok_or_else(AuthError::not_authenticated)?;
        let ticket = self.issue();
        debug!(ticket, user_id = %current.user_id(), "Refreshing session");

        match self.api.refresh_session(&current.refresh_token).await {
            Ok(session) => {
                self.apply_session(ticket, session, AuthChange::TokenRefreshed)
                    .await
            }
            Err(e) => {
                if e.requires_reauth() || current.is_expired() {
                    warn!(error = %e, "Session refresh failed, signing out");
                    self.expire(ticket, &current, AuthChange::SessionExpired).await;
                } else {
                    warn!(error = %e, "Session refresh failed, keeping current session");
                }
                Err(e)
            }
        }
    }

    /// Fetch the user record again, e.g. to pick up a confirmed email.
    pub async fn reload_user(&self) -> SessionResult<User> {
        let current = self
            .current()
            .session
            .clone()
            .ok_or_else(AuthError::not_authenticated)?;
        let ticket = self.issue();

        match self.api.get_user(&current.access_token).await {
            Ok(user) => {
                self.apply_user(ticket, user.clone()).await?;
                Ok(user)
            }
            Err(e) => {
                if e.requires_reauth() {
                    warn!(error = %e, "User reload rejected, signing out");
                    self.expire(ticket, &current, AuthChange::SessionExpired).await;
                }
                Err(e)
            }
        }
    }

    /// Ask the backend to send the sign-up confirmation email again.
    pub async fn resend_verification(&self, email: &str) -> SessionResult<()> {
        let email = validate_email(email)?;
        self.api.resend_verification(&email).await?;
        info!("Verification email re-sent");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Pushed events
    // ---------------------------------------------------------------

    /// Apply an auth change observed outside this synchronizer.
    ///
    /// Events count as issued when they arrive, so they supersede any
    /// operation still in flight.
    pub async fn handle_auth_event(&self, event: AuthEvent) {
        let ticket = self.issue();
        debug!(ticket, event = event.name(), "Auth event");

        let result = match event {
            AuthEvent::SignedIn(session) => self
                .apply_session(ticket, session, AuthChange::SignedIn)
                .await
                .map(|_| ()),
            AuthEvent::TokenRefreshed(session) => self
                .apply_session(ticket, session, AuthChange::TokenRefreshed)
                .await
                .map(|_| ()),
            AuthEvent::UserUpdated(user) => self.apply_user(ticket, user).await,
            AuthEvent::SignedOut => self
                .apply(ticket, Persist::Clear, |_| {
                    Some(Transition::unauthenticated(AuthChange::SignedOut))
                })
                .await
                .map(|_| ())
                .map_err(SessionError::from),
            AuthEvent::SessionRevoked => self
                .apply(ticket, Persist::Clear, |_| {
                    Some(Transition::unauthenticated(AuthChange::SessionRevoked))
                })
                .await
                .map(|_| ())
                .map_err(SessionError::from),
        };

        if let Err(e) = result {
            debug!(error = %e, "Auth event not applied");
        }
    }

    /// Apply a realtime connectivity event.
    ///
    /// Channel messages carry no connectivity information and publish
    /// nothing.
    pub fn handle_realtime_event(&self, event: RealtimeEvent) {
        let connection = match event {
            RealtimeEvent::Connected => ConnectionState {
                connected: true,
                last_error: None,
            },
            RealtimeEvent::Disconnected { reason } => {
                debug!(reason = %reason, "Realtime channel disconnected");
                ConnectionState {
                    connected: false,
                    last_error: None,
                }
            }
            RealtimeEvent::Error { message } => ConnectionState {
                connected: false,
                last_error: Some(message),
            },
            RealtimeEvent::Message { topic, event, .. } => {
                debug!(topic = %topic, event = %event, "Realtime message");
                return;
            }
        };

        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return;
        }
        let snapshot = Arc::new(state.snapshot.with_connection(connection));
        info!(
            revision = snapshot.revision,
            connected = snapshot.connection.connected,
            "Realtime connection changed"
        );
        state.snapshot = snapshot.clone();
        self.subscribers.lock().unwrap().publish(&snapshot);
    }

    /// Follow a realtime connection's events until it closes or the
    /// synchronizer is disposed.
    pub fn attach_realtime(self: &Arc<Self>, connection: Arc<dyn RealtimeConnection>) {
        if self.is_disposed() {
            connection.shutdown();
            return;
        }
        let events = connection.subscribe();
        self.realtime.lock().unwrap().push(connection);

        let handle = tokio::spawn(pump_realtime(
            Arc::downgrade(self),
            events,
            self.shutdown.clone(),
        ));
        self.tasks.lock().unwrap().push(handle);
    }

    /// Start the proactive refresh loop.
    pub fn spawn_auto_refresh(self: &Arc<Self>) {
        let handle = tokio::spawn(refresh::run_auto_refresh(
            Arc::downgrade(self),
            self.config.refresh_tick,
            self.config.refresh_threshold,
            self.shutdown.clone(),
        ));
        self.tasks.lock().unwrap().push(handle);
    }

    /// Stop background work, cancel in-flight requests and close every
    /// subscription. Later publications are no-ops. Idempotent.
    pub fn dispose(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.disposed {
                return;
            }
            state.disposed = true;
        }
        info!("Disposing session synchronizer");

        self.shutdown.cancel();
        for connection in self.realtime.lock().unwrap().drain(..) {
            connection.shutdown();
        }
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        self.subscribers.lock().unwrap().close();
    }

    // ---------------------------------------------------------------
    // Ticketed commits
    // ---------------------------------------------------------------

    fn issue(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Clear the store and discard every earlier operation still in flight,
    /// without publishing.
    async fn fence(&self, ticket: u64) -> Result<(), AuthError> {
        let _guard = self.persist.lock().await;
        {
            let mut state = self.state.lock().unwrap();
            if state.applied > ticket {
                return Err(AuthError::superseded());
            }
            state.applied = ticket;
        }
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear persisted session");
        }
        Ok(())
    }

    /// Persist then commit under the persistence lock.
    ///
    /// `transition` sees the current snapshot and may return None to leave
    /// the state and the store as they are.
    async fn apply<F>(
        &self,
        ticket: u64,
        persist: Persist,
        transition: F,
    ) -> Result<Arc<AuthSnapshot>, AuthError>
    where
        F: FnOnce(&AuthSnapshot) -> Option<Transition>,
    {
        let _guard = self.persist.lock().await;
        let transition = {
            let state = self.state.lock().unwrap();
            if state.applied > ticket {
                return Err(AuthError::superseded());
            }
            match transition(&state.snapshot) {
                Some(transition) if !state.disposed => transition,
                _ => return Ok(state.snapshot.clone()),
            }
        };

        match persist {
            Persist::Save => {
                let result = match transition.session.as_ref() {
                    Some(session) => self.store.save(session).await,
                    None => self.store.clear().await,
                };
                if let Err(e) = result {
                    warn!(error = %e, "Failed to persist session");
                }
            }
            Persist::Clear => {
                if let Err(e) = self.store.clear().await {
                    warn!(error = %e, "Failed to clear persisted session");
                }
            }
            Persist::Keep => {}
        }

        self.commit(ticket, transition)
    }

    /// Publish `transition` unless a later ticket won in the meantime.
    fn commit(&self, ticket: u64, transition: Transition) -> Result<Arc<AuthSnapshot>, AuthError> {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return Ok(state.snapshot.clone());
        }
        if state.applied > ticket {
            return Err(AuthError::superseded());
        }

        state.applied = ticket;
        let snapshot = Arc::new(state.snapshot.next(transition));
        info!(
            revision = snapshot.revision,
            phase = %snapshot.phase,
            change = ?snapshot.change,
            "Auth state changed"
        );
        state.snapshot = snapshot.clone();
        self.subscribers.lock().unwrap().publish(&snapshot);
        Ok(snapshot)
    }

    async fn apply_session(
        &self,
        ticket: u64,
        session: Session,
        change: AuthChange,
    ) -> SessionResult<Session> {
        self.apply(ticket, Persist::Save, |_| {
            Some(Transition::authenticated(session.clone(), change))
        })
        .await?;
        Ok(session)
    }

    /// Apply a session the backend just issued for this process. A session
    /// that lost to a later operation is revoked in the background.
    async fn adopt_session(
        &self,
        ticket: u64,
        session: Session,
        change: AuthChange,
    ) -> SessionResult<Session> {
        match self.apply_session(ticket, session.clone(), change).await {
            Err(e) if e.auth_reason() == Some(AuthErrorReason::Superseded) => {
                self.revoke_discarded(session);
                Err(e)
            }
            result => result,
        }
    }

    fn revoke_discarded(&self, session: Session) {
        let api = self.api.clone();
        let handle = tokio::spawn(async move {
            match api.sign_out(&session.access_token).await {
                Ok(()) => debug!(user_id = %session.user_id(), "Revoked discarded session"),
                Err(e) => {
                    warn!(user_id = %session.user_id(), error = %e, "Failed to revoke discarded session")
                }
            }
        });
        self.tasks.lock().unwrap().push(handle);
    }

    /// Replace the user record of the current session if it is the same user.
    ///
    /// The stored session is rebuilt from the snapshot seen under the lock,
    /// so tokens rotated by a concurrent refresh are kept.
    async fn apply_user(&self, ticket: u64, user: User) -> SessionResult<()> {
        let applied = self
            .apply(ticket, Persist::Save, |snapshot| {
                let current = snapshot.session.as_ref().filter(|s| s.user_id() == user.id)?;
                let change = if !current.is_email_verified() && user.is_email_verified() {
                    AuthChange::EmailVerified
                } else {
                    AuthChange::UserUpdated
                };
                Some(Transition::authenticated(current.with_user(user.clone()), change))
            })
            .await?;
        if applied.session.as_ref().map(|s| s.user_id()) != Some(user.id.as_str()) {
            debug!(user_id = %user.id, "User update for a different or no session, ignoring");
        }
        Ok(())
    }

    /// Drop `session` if it is still the current one.
    async fn expire(&self, ticket: u64, session: &Session, change: AuthChange) {
        let result = self
            .apply(ticket, Persist::Clear, |snapshot| {
                snapshot
                    .session
                    .as_ref()
                    .filter(|s| s.access_token == session.access_token)
                    .map(|_| Transition::unauthenticated(change))
            })
            .await;
        if let Err(e) = result {
            debug!(reason = %e.reason, "Expiry superseded by a later operation");
        }
    }

    /// Final commit of `initialize`, falling back to the current snapshot
    /// when a later operation already won.
    async fn settle(
        &self,
        ticket: u64,
        persist: Persist,
        transition: Transition,
    ) -> Arc<AuthSnapshot> {
        match self.apply(ticket, persist, |_| Some(transition)).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(reason = %e.reason, "Initialization result superseded");
                self.current()
            }
        }
    }
}

impl Drop for SessionSynchronizer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn pump_realtime(
    sync: Weak<SessionSynchronizer>,
    mut events: broadcast::Receiver<RealtimeEvent>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(event) => match sync.upgrade() {
                Some(sync) => sync.handle_realtime_event(event),
                None => break,
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Realtime events lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("Realtime pump stopped");
}

/// Normalize and check an email address.
fn validate_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim();
    if !EMAIL_REGEX.is_match(email) {
        return Err(AuthError::new(
            AuthErrorReason::InvalidInput,
            "malformed email address",
        ));
    }
    Ok(email.to_lowercase())
}

fn validate_credentials(email: &str, password: &str) -> Result<String, AuthError> {
    let email = validate_email(email)?;
    if password.is_empty() {
        return Err(AuthError::new(AuthErrorReason::InvalidInput, "empty password"));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{InMemorySessionStore, MockHttpClient, MockResponse};
    use crate::auth::session::fixtures;
    use serde_json::json;

    const BASE: &str = "https://abc.supabase.co";

    fn config() -> BackendConfig {
        BackendConfig::new(BASE, "anon")
    }

    fn setup() -> (Arc<SessionSynchronizer>, MockHttpClient, InMemorySessionStore) {
        let http = MockHttpClient::new();
        let store = InMemorySessionStore::new();
        let sync =
            SessionSynchronizer::new(config(), Arc::new(http.clone()), Arc::new(store.clone()))
                .unwrap();
        (sync, http, store)
    }

    fn token_body(id: &str, email: &str) -> Value {
        json!({
            "access_token": format!("access-{}", id),
            "refresh_token": format!("refresh-{}", id),
            "token_type": "bearer",
            "expires_in": 3600,
            "user": {
                "id": id,
                "email": email,
                "email_confirmed_at": "2024-01-01T00:00:00Z"
            }
        })
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(" Jane@Example.com ").unwrap(), "jane@example.com");
        assert!(validate_email("jane").is_err());
        assert!(validate_email("jane@example").is_err());
        assert!(validate_email("ja ne@example.com").is_err());
    }

    #[test]
    fn test_validate_credentials_rejects_empty_password() {
        let err = validate_credentials("jane@example.com", "").unwrap_err();
        assert_eq!(err.reason, AuthErrorReason::InvalidInput);
    }

    #[test]
    fn test_new_rejects_missing_configuration() {
        let result = SessionSynchronizer::new(
            BackendConfig::new("", "anon"),
            Arc::new(MockHttpClient::new()),
            Arc::new(InMemorySessionStore::new()),
        );
        assert!(matches!(result, Err(ConfigurationError::MissingUrl)));
    }

    #[tokio::test]
    async fn test_sign_in_with_invalid_email_sends_nothing() {
        let (sync, http, _) = setup();
        let err = sync.sign_in("not-an-email", "pw").await.unwrap_err();
        assert_eq!(err.auth_reason(), Some(AuthErrorReason::InvalidInput));
        assert!(http.get_requests().is_empty());
        assert_eq!(sync.current().revision, 0);
    }

    #[tokio::test]
    async fn test_sign_in_persists_and_publishes() {
        let (sync, http, store) = setup();
        http.set_response(
            &format!("{}/auth/v1/token?grant_type=password", BASE),
            MockResponse::json(200, token_body("u1", "jane@example.com")),
        );

        let session = sync.sign_in("jane@example.com", "secret").await.unwrap();
        assert_eq!(session.user_id(), "u1");

        let snapshot = sync.current();
        assert!(snapshot.is_authenticated());
        assert!(snapshot.is_email_verified());
        assert_eq!(snapshot.change, AuthChange::SignedIn);
        assert_eq!(store.get_session(), Some(session));
    }

    #[tokio::test]
    async fn test_store_failure_does_not_fail_sign_in() {
        let (sync, http, store) = setup();
        store.set_save_should_fail(true);
        http.set_response(
            &format!("{}/auth/v1/token?grant_type=password", BASE),
            MockResponse::json(200, token_body("u1", "jane@example.com")),
        );

        assert!(sync.sign_in("jane@example.com", "secret").await.is_ok());
        assert!(sync.current().is_authenticated());
        assert!(store.get_session().is_none());
    }

    #[tokio::test]
    async fn test_stale_ticket_is_superseded() {
        let (sync, _, _) = setup();
        let early = sync.issue();
        let late = sync.issue();

        sync.apply(late, Persist::Keep, |_| {
            Some(Transition::unauthenticated(AuthChange::SignedOut))
        })
        .await
        .unwrap();
        let err = sync
            .apply(early, Persist::Keep, |_| {
                Some(Transition::authenticated(
                    fixtures::session("u1", "a@example.com", 3600),
                    AuthChange::SignedIn,
                ))
            })
            .await
            .unwrap_err();

        assert_eq!(err.reason, AuthErrorReason::Superseded);
        assert!(!sync.current().is_authenticated());
    }

    #[tokio::test]
    async fn test_user_update_for_other_user_is_ignored() {
        let (sync, _, _) = setup();
        sync.handle_auth_event(AuthEvent::SignedIn(fixtures::session("u1", "a@example.com", 3600)))
            .await;
        let revision = sync.current().revision;

        sync.handle_auth_event(AuthEvent::UserUpdated(fixtures::user("u2", "b@example.com", true)))
            .await;
        assert_eq!(sync.current().revision, revision);
        assert_eq!(sync.current().user().unwrap().id, "u1");
    }

    #[tokio::test]
    async fn test_message_event_publishes_nothing() {
        let (sync, _, _) = setup();
        sync.handle_realtime_event(RealtimeEvent::Message {
            topic: "realtime:bookings".to_string(),
            event: "INSERT".to_string(),
            payload: json!({}),
        });
        assert_eq!(sync.current().revision, 0);
    }

    #[tokio::test]
    async fn test_realtime_error_records_message() {
        let (sync, _, _) = setup();
        sync.handle_realtime_event(RealtimeEvent::Connected);
        sync.handle_realtime_event(RealtimeEvent::Error {
            message: "gave up".to_string(),
        });
        let snapshot = sync.current();
        assert!(!snapshot.is_realtime_connected());
        assert_eq!(snapshot.connection.last_error.as_deref(), Some("gave up"));
        assert_eq!(snapshot.revision, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_after_degraded_start_clears_kept_session() {
        let (sync, http, store) = setup();
        store.set_session(Some(fixtures::session("u1", "a@example.com", 3600)));

        let snapshot = sync.initialize().await;
        assert_eq!(snapshot.phase, AuthPhase::Unauthenticated);
        assert!(store.get_session().is_some());
        let revision = sync.current().revision;

        let report = sync.sign_out().await;
        assert!(!report.was_signed_in);
        assert!(store.get_session().is_none());
        assert_eq!(sync.current().revision, revision);
        assert!(http.requests_to("/logout").is_empty());
    }

    #[tokio::test]
    async fn test_declined_transition_leaves_store_alone() {
        let (sync, _, store) = setup();
        let session = fixtures::session("u1", "a@example.com", 3600);
        store.set_session(Some(session.clone()));

        let ticket = sync.issue();
        sync.apply(ticket, Persist::Clear, |_| None).await.unwrap();
        assert_eq!(store.get_session(), Some(session));
        assert_eq!(sync.current().revision, 0);
    }

    #[tokio::test]
    async fn test_attach_after_dispose_shuts_connection_down() {
        let (sync, _, _) = setup();
        sync.dispose();

        let realtime = crate::adapters::mock::MockRealtime::new();
        sync.attach_realtime(Arc::new(realtime.clone()));
        assert!(realtime.is_shut_down());
        assert_eq!(realtime.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent_and_freezes_state() {
        let (sync, _, _) = setup();
        let mut sub = sync.subscribe();
        sync.dispose();
        sync.dispose();
        assert!(sync.is_disposed());

        sync.handle_realtime_event(RealtimeEvent::Connected);
        assert_eq!(sync.current().revision, 0);

        assert_eq!(sub.recv().await.unwrap().revision, 0);
        assert!(sub.recv().await.is_none());
        sub.unsubscribe();
    }
}
