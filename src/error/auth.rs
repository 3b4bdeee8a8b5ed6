//! Authentication error types.
//!
//! Every rejection the backend can produce is folded into an [`AuthErrorReason`]
//! before it leaves the auth layer, so callers only ever match on this closed set.

use std::fmt;

/// Why an authentication operation was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorReason {
    /// Email/password pair was not accepted.
    InvalidCredentials,
    /// Account exists but its email address has not been confirmed.
    EmailNotConfirmed,
    /// Sign-up attempted with an email that is already registered.
    UserAlreadyExists,
    /// Password rejected by the backend's password policy.
    WeakPassword,
    /// Input rejected before or by the backend (malformed email, empty password).
    InvalidInput,
    /// New sign-ups are disabled on the backend.
    SignupDisabled,
    /// Too many requests or emails sent.
    RateLimited,
    /// Access or refresh token is no longer accepted.
    SessionExpired,
    /// An operation requiring a session was called without one.
    NotAuthenticated,
    /// OAuth code exchange failed (expired flow state, wrong verifier).
    OAuthFailed,
    /// A later operation was applied before this one resolved.
    Superseded,
    /// Backend failed with a server-side error.
    ServerError,
    /// Any other rejection.
    Rejected,
}

impl AuthErrorReason {
    /// Short label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorReason::InvalidCredentials => "invalid_credentials",
            AuthErrorReason::EmailNotConfirmed => "email_not_confirmed",
            AuthErrorReason::UserAlreadyExists => "user_already_exists",
            AuthErrorReason::WeakPassword => "weak_password",
            AuthErrorReason::InvalidInput => "invalid_input",
            AuthErrorReason::SignupDisabled => "signup_disabled",
            AuthErrorReason::RateLimited => "rate_limited",
            AuthErrorReason::SessionExpired => "session_expired",
            AuthErrorReason::NotAuthenticated => "not_authenticated",
            AuthErrorReason::OAuthFailed => "oauth_failed",
            AuthErrorReason::Superseded => "superseded",
            AuthErrorReason::ServerError => "server_error",
            AuthErrorReason::Rejected => "rejected",
        }
    }
}

impl fmt::Display for AuthErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Authentication failure with its reason and a diagnostic detail.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthError {
    pub reason: AuthErrorReason,
    /// Backend or local detail, for logs only.
    pub detail: String,
}

impl AuthError {
    pub fn new(reason: AuthErrorReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    pub fn superseded() -> Self {
        Self::new(
            AuthErrorReason::Superseded,
            "a later authentication operation was applied first",
        )
    }

    pub fn not_authenticated() -> Self {
        Self::new(AuthErrorReason::NotAuthenticated, "no active session")
    }

    /// Check if this error means the stored session must be discarded.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self.reason,
            AuthErrorReason::SessionExpired | AuthErrorReason::NotAuthenticated
        )
    }

    /// Check if retrying the same operation later may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.reason,
            AuthErrorReason::RateLimited
                | AuthErrorReason::ServerError
                | AuthErrorReason::Superseded
                | AuthErrorReason::SessionExpired
        )
    }

    /// Get the inline message shown next to a login or sign-up form.
    pub fn user_message(&self) -> String {
        match self.reason {
            AuthErrorReason::InvalidCredentials => "Invalid email or password.".to_string(),
            AuthErrorReason::EmailNotConfirmed => {
                "Please confirm your email address before signing in.".to_string()
            }
            AuthErrorReason::UserAlreadyExists => {
                "An account with this email already exists. Try signing in instead.".to_string()
            }
            AuthErrorReason::WeakPassword => {
                "Password is too weak. Use at least 8 characters with letters and numbers."
                    .to_string()
            }
            AuthErrorReason::InvalidInput => {
                "Please enter a valid email address and password.".to_string()
            }
            AuthErrorReason::SignupDisabled => "New sign-ups are currently disabled.".to_string(),
            AuthErrorReason::RateLimited => {
                "Too many attempts. Please wait a few minutes and try again.".to_string()
            }
            AuthErrorReason::SessionExpired => {
                "Your session has expired. Please sign in again.".to_string()
            }
            AuthErrorReason::NotAuthenticated => {
                "You are not signed in. Please sign in to continue.".to_string()
            }
            AuthErrorReason::OAuthFailed => {
                "Authentication failed. Please try again.".to_string()
            }
            AuthErrorReason::Superseded => {
                "Another sign-in action completed first.".to_string()
            }
            AuthErrorReason::ServerError => {
                "The service is having trouble. Please try again later.".to_string()
            }
            AuthErrorReason::Rejected => "The request was not accepted.".to_string(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self.reason {
            AuthErrorReason::InvalidCredentials => "E_AUTH_INVALID",
            AuthErrorReason::EmailNotConfirmed => "E_AUTH_UNCONFIRMED",
            AuthErrorReason::UserAlreadyExists => "E_AUTH_EXISTS",
            AuthErrorReason::WeakPassword => "E_AUTH_WEAK_PW",
            AuthErrorReason::InvalidInput => "E_AUTH_INPUT",
            AuthErrorReason::SignupDisabled => "E_AUTH_SIGNUP_OFF",
            AuthErrorReason::RateLimited => "E_AUTH_RATE",
            AuthErrorReason::SessionExpired => "E_AUTH_TOKEN_EXP",
            AuthErrorReason::NotAuthenticated => "E_AUTH_NOT_AUTH",
            AuthErrorReason::OAuthFailed => "E_AUTH_OAUTH",
            AuthErrorReason::Superseded => "E_AUTH_SUPERSEDED",
            AuthErrorReason::ServerError => "E_AUTH_SERVER",
            AuthErrorReason::Rejected => "E_AUTH_REJECTED",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Authentication failed ({}): {}", self.reason, self.detail)
    }
}

impl std::error::Error for AuthError {}
