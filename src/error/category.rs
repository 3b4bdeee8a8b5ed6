//! Error category classification.
//!
//! Categories drive what the caller shows: an inline form message, a generic
//! "please try again", or a fatal configuration diagnostic.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Transport failure after retries were exhausted.
    Network,

    /// Session no longer valid; the user has to sign in again.
    Auth,

    /// Backend failed or throttled the request.
    Server,

    /// The user can fix the input and resubmit.
    User,

    /// Required configuration missing; nothing works until it is fixed.
    Configuration,
}

impl ErrorCategory {
    /// Returns true if errors in this category are generally transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Server => "server",
            ErrorCategory::User => "user",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Please check your connection and try again",
            ErrorCategory::Auth => "Please sign in again",
            ErrorCategory::Server => "The service may be busy. Please try again later",
            ErrorCategory::User => "Please check your input and try again",
            ErrorCategory::Configuration => "Check the backend URL and key settings",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_categories() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(ErrorCategory::Server.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::User.is_retryable());
        assert!(!ErrorCategory::Configuration.is_retryable());
    }

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(ErrorCategory::Configuration.to_string(), "configuration");
        assert_eq!(format!("{}", ErrorCategory::Network), "network");
    }
}
