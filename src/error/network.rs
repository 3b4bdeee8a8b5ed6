//! Transport-level error types.
//!
//! These errors describe failures to deliver a request at all: connection
//! problems, DNS, timeouts and aborted attempts. An HTTP response with an
//! error status is a successful delivery and never becomes a `NetworkError`.

use std::fmt;

/// Network-specific error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// Connection to the server failed.
    ConnectionFailed {
        url: String,
        message: String,
    },

    /// DNS resolution failed.
    DnsResolutionFailed {
        host: String,
    },

    /// A single attempt exceeded its timeout and was cancelled.
    Timeout {
        operation: String,
        duration_secs: u64,
    },

    /// TLS/SSL error.
    TlsError {
        message: String,
    },

    /// The request target could not be parsed.
    InvalidUrl {
        url: String,
    },

    /// The backend answered with a body we could not decode.
    InvalidResponse {
        message: String,
    },

    /// The attempt was aborted before completion.
    Cancelled,

    /// Generic transport error.
    Other {
        message: String,
    },
}

impl NetworkError {
    /// Check if this error is transient and the request can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::ConnectionFailed { .. } => true,
            NetworkError::DnsResolutionFailed { .. } => true,
            NetworkError::Timeout { .. } => true,
            NetworkError::TlsError { .. } => false, // Usually config issue
            NetworkError::InvalidUrl { .. } => false,
            NetworkError::InvalidResponse { .. } => false,
            NetworkError::Cancelled => true,
            NetworkError::Other { .. } => true,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            NetworkError::ConnectionFailed { .. } | NetworkError::DnsResolutionFailed { .. } => {
                "Unable to reach the server. Please check your connection and try again.".to_string()
            }
            NetworkError::Timeout { .. } | NetworkError::Cancelled | NetworkError::Other { .. } => {
                "The request did not complete. Please try again.".to_string()
            }
            NetworkError::TlsError { .. } => {
                "A secure connection could not be established. Please try again later.".to_string()
            }
            NetworkError::InvalidUrl { .. } => {
                "The service address is misconfigured.".to_string()
            }
            NetworkError::InvalidResponse { .. } => {
                "Received an unexpected response from the server. Please try again.".to_string()
            }
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed { .. } => "E_NET_CONN",
            NetworkError::DnsResolutionFailed { .. } => "E_NET_DNS",
            NetworkError::Timeout { .. } => "E_NET_TIMEOUT",
            NetworkError::TlsError { .. } => "E_NET_TLS",
            NetworkError::InvalidUrl { .. } => "E_NET_URL",
            NetworkError::InvalidResponse { .. } => "E_NET_INVALID",
            NetworkError::Cancelled => "E_NET_CANCEL",
            NetworkError::Other { .. } => "E_NET_OTHER",
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::ConnectionFailed { url, message } => {
                write!(f, "Connection failed to '{}': {}", url, message)
            }
            NetworkError::DnsResolutionFailed { host } => {
                write!(f, "DNS resolution failed for '{}'", host)
            }
            NetworkError::Timeout { operation, duration_secs } => {
                write!(f, "{} timed out after {} seconds", operation, duration_secs)
            }
            NetworkError::TlsError { message } => write!(f, "TLS error: {}", message),
            NetworkError::InvalidUrl { url } => write!(f, "Invalid URL: {}", url),
            NetworkError::InvalidResponse { message } => {
                write!(f, "Invalid response: {}", message)
            }
            NetworkError::Cancelled => write!(f, "Request cancelled"),
            NetworkError::Other { message } => write!(f, "Network error: {}", message),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Classify a reqwest error into a NetworkError.
pub fn classify_reqwest_error(err: &reqwest::Error, url: &str) -> NetworkError {
    if err.is_builder() {
        NetworkError::InvalidUrl {
            url: url.to_string(),
        }
    } else if err.is_timeout() {
        NetworkError::Timeout {
            operation: "HTTP request".to_string(),
            duration_secs: 0,
        }
    } else if err.is_decode() {
        NetworkError::InvalidResponse {
            message: format!("Failed to decode response: {}", err),
        }
    } else {
        let err_str = format!("{:?}", err).to_lowercase();
        if err_str.contains("dns") || err_str.contains("resolve") {
            NetworkError::DnsResolutionFailed {
                host: extract_host_from_url(url),
            }
        } else if err_str.contains("tls") || err_str.contains("certificate") {
            NetworkError::TlsError {
                message: err.to_string(),
            }
        } else if err.is_connect() {
            NetworkError::ConnectionFailed {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            NetworkError::Other {
                message: err.to_string(),
            }
        }
    }
}

/// Extract the host portion from a URL string.
fn extract_host_from_url(url: &str) -> String {
    let url_lower = url.to_lowercase();
    let without_scheme = if url_lower.starts_with("https://") {
        &url[8..]
    } else if url_lower.starts_with("http://") {
        &url[7..]
    } else {
        url
    };

    without_scheme
        .split(&['/', ':', '?'][..])
        .next()
        .unwrap_or(url)
        .to_string()
}
