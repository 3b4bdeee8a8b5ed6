//! Error taxonomy for the session layer.
//!
//! Three kinds of failure reach callers:
//!
//! | Type | Raised when | Caller shows |
//! |------|-------------|--------------|
//! | [`NetworkError`] | transport failed after all retries | generic "please try again" |
//! | [`AuthError`] | backend rejected credentials or session | inline reason message |
//! | [`ConfigurationError`] | endpoint or key missing at startup | fatal diagnostic |
//!
//! [`SessionError`] unifies them for the synchronizer's public operations.

mod auth;
mod category;
mod config;
mod network;
mod session_error;

pub use auth::{AuthError, AuthErrorReason};
pub use category::ErrorCategory;
pub use config::ConfigurationError;
pub use network::{classify_reqwest_error, NetworkError};
pub use session_error::{SessionError, SessionResult};

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_error_unification() {
        let errors: Vec<SessionError> = vec![
            NetworkError::ConnectionFailed {
                url: "https://x.supabase.co".to_string(),
                message: "refused".to_string(),
            }
            .into(),
            AuthError::new(AuthErrorReason::InvalidCredentials, "bad").into(),
            ConfigurationError::MissingUrl.into(),
        ];

        for err in &errors {
            assert!(!err.error_code().is_empty());
            assert!(!err.user_message().is_empty());
            assert!(!err.recovery_hint().is_empty());
        }

        assert_eq!(errors[0].category(), ErrorCategory::Network);
        assert_eq!(errors[1].category(), ErrorCategory::User);
        assert_eq!(errors[2].category(), ErrorCategory::Configuration);
    }
}
