//! Startup configuration errors.

use thiserror::Error;

/// Required backend coordinates are missing or unusable.
///
/// Raised once by `BackendConfig::validate`; a synchronizer is never built
/// from a configuration that fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("backend URL is not set (NEATRIX_SUPABASE_URL)")]
    MissingUrl,

    #[error("backend anon key is not set (NEATRIX_SUPABASE_ANON_KEY)")]
    MissingAnonKey,

    #[error("backend URL '{url}' is invalid: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("storage key must not be empty")]
    EmptyStorageKey,

    #[error("retry policy is invalid: {0}")]
    InvalidRetryPolicy(String),
}

impl ConfigurationError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigurationError::MissingUrl => "E_CFG_URL",
            ConfigurationError::MissingAnonKey => "E_CFG_KEY",
            ConfigurationError::InvalidUrl { .. } => "E_CFG_URL_INVALID",
            ConfigurationError::EmptyStorageKey => "E_CFG_STORAGE",
            ConfigurationError::InvalidRetryPolicy(_) => "E_CFG_RETRY",
        }
    }

    pub fn user_message(&self) -> String {
        format!("The application is not configured correctly: {}.", self)
    }
}
