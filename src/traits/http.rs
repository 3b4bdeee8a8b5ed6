//! HTTP client trait abstraction.
//!
//! Provides a trait-based abstraction for HTTP operations, enabling
//! dependency injection and mocking in tests. Implementations deliver a
//! [`Response`] for every status code; only transport failures are errors.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;

use crate::error::NetworkError;

/// HTTP headers represented as a key-value map.
pub type Headers = HashMap<String, String>;

/// HTTP method of a request descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Methods that can be replayed without changing the outcome.
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self,
            HttpMethod::Get | HttpMethod::Head | HttpMethod::Put | HttpMethod::Delete
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request descriptor: target, method, headers and body.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<String>,
    /// Caller asserts that replaying this request is safe.
    pub idempotent: bool,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            idempotent: method.is_idempotent(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: &Headers) -> Self {
        for (key, value) in headers {
            self.headers.insert(key.clone(), value.clone());
        }
        self
    }

    /// Set a JSON body and the matching content type.
    pub fn json(mut self, body: &serde_json::Value) -> Self {
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        self.body = Some(body.to_string());
        self
    }

    /// Mark a non-idempotent request as safe to replay.
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// "METHOD path" without the query string, for logs.
    pub fn describe(&self) -> String {
        let path = self
            .url
            .split("://")
            .nth(1)
            .and_then(|rest| rest.find('/').map(|idx| &rest[idx..]))
            .unwrap_or("/");
        let path = path.split('?').next().unwrap_or(path);
        format!("{} {}", self.method, path)
    }
}

/// HTTP response wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Response body
    pub body: Bytes,
}

impl Response {
    /// Create a new response.
    pub fn new(status: u16, body: Bytes) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body,
        }
    }

    /// Create a JSON response.
    pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            status,
            headers,
            body: Bytes::from(value.to_string()),
        }
    }

    /// Create a new response with headers.
    pub fn with_headers(status: u16, headers: Headers, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Check if the response indicates success (2xx status).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get the response body as a string.
    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }

    /// Parse the response body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Trait for HTTP client operations.
///
/// # Example
///
/// ```ignore
/// use neatrix_session::traits::{HttpClient, HttpRequest};
///
/// async fn ping<C: HttpClient>(client: &C) -> bool {
///     client
///         .execute(&HttpRequest::get("https://abc.supabase.co/auth/v1/health"))
///         .await
///         .map(|r| r.is_success())
///         .unwrap_or(false)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send one request. A response with any status is `Ok`.
    async fn execute(&self, request: &HttpRequest) -> Result<Response, NetworkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_idempotency() {
        assert!(HttpMethod::Get.is_idempotent());
        assert!(HttpMethod::Delete.is_idempotent());
        assert!(!HttpMethod::Post.is_idempotent());
        assert!(!HttpMethod::Patch.is_idempotent());
    }

    #[test]
    fn test_request_defaults_idempotency_from_method() {
        assert!(HttpRequest::get("https://x/a").idempotent);
        assert!(!HttpRequest::post("https://x/a").idempotent);
        assert!(HttpRequest::post("https://x/a").idempotent(true).idempotent);
    }

    #[test]
    fn test_request_json_sets_content_type() {
        let req = HttpRequest::post("https://x/auth/v1/signup")
            .json(&serde_json::json!({"email": "a@b.co"}));
        assert_eq!(
            req.headers.get("Content-Type"),
            Some(&"application/json".to_string())
        );
        assert_eq!(req.body.as_deref(), Some(r#"{"email":"a@b.co"}"#));
    }

    #[test]
    fn test_request_describe_strips_host_and_query() {
        let req = HttpRequest::post("https://abc.supabase.co/auth/v1/token?grant_type=password");
        assert_eq!(req.describe(), "POST /auth/v1/token");
        assert_eq!(HttpRequest::get("https://abc.supabase.co").describe(), "GET /");
    }

    #[test]
    fn test_response_is_success() {
        assert!(Response::new(200, Bytes::new()).is_success());
        assert!(Response::new(204, Bytes::new()).is_success());
        assert!(!Response::new(400, Bytes::new()).is_success());
        assert!(!Response::new(500, Bytes::new()).is_success());
    }

    #[test]
    fn test_response_json() {
        let response = Response::json_body(200, &serde_json::json!({"id": "u1"}));
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], "u1");
        assert_eq!(response.text().unwrap(), r#"{"id":"u1"}"#);
    }
}
