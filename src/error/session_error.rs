//! Unified error type surfaced by the session synchronizer.

use std::fmt;

use super::auth::{AuthError, AuthErrorReason};
use super::category::ErrorCategory;
use super::config::ConfigurationError;
use super::network::NetworkError;

/// Every error a caller of the synchronizer can observe.
///
/// The set is closed: backend response shapes are translated into one of
/// these variants before they leave the auth layer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Transport failure after the retry policy was exhausted.
    Network(NetworkError),

    /// Credential or session rejection.
    Auth(AuthError),

    /// Missing or invalid backend coordinates.
    Configuration(ConfigurationError),
}

impl SessionError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SessionError::Network(_) => ErrorCategory::Network,
            SessionError::Auth(err) => match err.reason {
                AuthErrorReason::SessionExpired | AuthErrorReason::NotAuthenticated => {
                    ErrorCategory::Auth
                }
                AuthErrorReason::ServerError | AuthErrorReason::RateLimited => {
                    ErrorCategory::Server
                }
                _ => ErrorCategory::User,
            },
            SessionError::Configuration(_) => ErrorCategory::Configuration,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Network(err) => err.is_retryable(),
            SessionError::Auth(err) => err.is_recoverable(),
            SessionError::Configuration(_) => false,
        }
    }

    /// Get the message rendered to the user.
    ///
    /// Network exhaustion collapses to a generic retry prompt; auth errors
    /// carry their reason-specific inline message.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Network(_) => "Something went wrong. Please try again.".to_string(),
            SessionError::Auth(err) => err.user_message(),
            SessionError::Configuration(err) => err.user_message(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::Network(err) => err.error_code(),
            SessionError::Auth(err) => err.error_code(),
            SessionError::Configuration(err) => err.error_code(),
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        self.category().recovery_hint()
    }

    /// The auth reason, if this is an auth error.
    pub fn auth_reason(&self) -> Option<AuthErrorReason> {
        match self {
            SessionError::Auth(err) => Some(err.reason),
            _ => None,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, SessionError::Auth(err) if err.requires_reauth())
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Network(err) => write!(f, "{}", err),
            SessionError::Auth(err) => write!(f, "{}", err),
            SessionError::Configuration(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Network(err) => Some(err),
            SessionError::Auth(err) => Some(err),
            SessionError::Configuration(err) => Some(err),
        }
    }
}

impl From<NetworkError> for SessionError {
    fn from(err: NetworkError) -> Self {
        SessionError::Network(err)
    }
}

impl From<AuthError> for SessionError {
    fn from(err: AuthError) -> Self {
        SessionError::Auth(err)
    }
}

impl From<ConfigurationError> for SessionError {
    fn from(err: ConfigurationError) -> Self {
        SessionError::Configuration(err)
    }
}

/// Type alias for Results using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_error_renders_generic_message() {
        let err: SessionError = NetworkError::Timeout {
            operation: "sign in".to_string(),
            duration_secs: 10,
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.user_message(), "Something went wrong. Please try again.");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_auth_error_renders_reason_message() {
        let err: SessionError =
            AuthError::new(AuthErrorReason::EmailNotConfirmed, "Email not confirmed").into();
        assert_eq!(err.category(), ErrorCategory::User);
        assert!(err.user_message().contains("confirm your email"));
        assert_eq!(err.auth_reason(), Some(AuthErrorReason::EmailNotConfirmed));
    }

    #[test]
    fn test_expired_session_is_auth_category() {
        let err: SessionError = AuthError::new(AuthErrorReason::SessionExpired, "bad_jwt").into();
        assert_eq!(err.category(), ErrorCategory::Auth);
        assert!(err.requires_reauth());
    }

    #[test]
    fn test_rate_limit_is_server_category() {
        let err: SessionError = AuthError::new(AuthErrorReason::RateLimited, "429").into();
        assert_eq!(err.category(), ErrorCategory::Server);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_configuration_error_is_fatal() {
        let err: SessionError = ConfigurationError::MissingAnonKey.into();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(!err.is_retryable());
        assert_eq!(err.error_code(), "E_CFG_KEY");
        assert!(err.auth_reason().is_none());
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;
        let err: SessionError = NetworkError::Cancelled.into();
        assert!(err.source().is_some());
    }
}
