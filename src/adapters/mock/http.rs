//! Mock HTTP client for testing.
//!
//! Provides a configurable mock HTTP client that can return predefined
//! responses, transport errors, delayed or never-completing attempts.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use crate::error::NetworkError;
use crate::traits::{HttpClient, HttpRequest, Response};

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Deliver a response (any status)
    Success(Response),
    /// Fail with a transport error
    Error(NetworkError),
    /// Wait, then resolve the inner response
    Delayed(Duration, Box<MockResponse>),
    /// Wait until the gate is notified, then resolve the inner response
    Gated(Arc<Notify>, Box<MockResponse>),
    /// Never complete
    Hang,
}

impl MockResponse {
    /// JSON response with the given status.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        MockResponse::Success(Response::json_body(status, &body))
    }
}

#[derive(Debug, Clone)]
struct BodyMatcher {
    url: String,
    body_contains: String,
    response: MockResponse,
}

/// Mock HTTP client for testing.
///
/// Response lookup order for a request URL:
/// 1. the next queued one-shot response ([`push_response`](Self::push_response))
/// 2. a body matcher ([`set_response_matching`](Self::set_response_matching))
/// 3. the exact URL, then the longest configured URL prefix
/// 4. the default response
///
/// # Example
///
/// ```ignore
/// use neatrix_session::adapters::mock::{MockHttpClient, MockResponse};
/// use neatrix_session::traits::{HttpClient, HttpRequest};
///
/// let client = MockHttpClient::new();
/// client.set_response(
///     "https://abc.supabase.co/auth/v1/user",
///     MockResponse::json(200, serde_json::json!({"id": "u1"})),
/// );
///
/// let response = client
///     .execute(&HttpRequest::get("https://abc.supabase.co/auth/v1/user"))
///     .await?;
/// assert_eq!(response.status, 200);
/// assert_eq!(client.get_requests().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    /// Configured responses by URL pattern
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    /// One-shot responses consumed in order
    queued: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    matchers: Arc<Mutex<Vec<BodyMatcher>>>,
    /// Default response when no specific match
    default_response: Arc<Mutex<Option<MockResponse>>>,
    /// Recorded requests for verification
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a persistent response for a URL (exact or prefix match).
    pub fn set_response(&self, url: &str, response: MockResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    /// Queue a one-shot response for an exact URL.
    pub fn push_response(&self, url: &str, response: MockResponse) {
        self.queued
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// Respond to requests for `url` whose body contains `body_contains`.
    pub fn set_response_matching(&self, url: &str, body_contains: &str, response: MockResponse) {
        self.matchers.lock().unwrap().push(BodyMatcher {
            url: url.to_string(),
            body_contains: body_contains.to_string(),
            response,
        });
    }

    /// Set a default response for URLs without specific matches.
    pub fn set_default_response(&self, response: MockResponse) {
        *self.default_response.lock().unwrap() = Some(response);
    }

    /// Get all recorded requests.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Recorded requests whose URL contains `fragment`.
    pub fn requests_to(&self, fragment: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .cloned()
            .collect()
    }

    /// Clear all recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    /// Clear all configured responses.
    pub fn clear_responses(&self) {
        self.responses.lock().unwrap().clear();
        self.queued.lock().unwrap().clear();
        self.matchers.lock().unwrap().clear();
    }

    fn get_response(&self, request: &HttpRequest) -> Option<MockResponse> {
        let url = request.url.as_str();

        if let Some(queue) = self.queued.lock().unwrap().get_mut(url) {
            if let Some(response) = queue.pop_front() {
                return Some(response);
            }
        }

        let body = request.body.as_deref().unwrap_or("");
        if let Some(matcher) = self
            .matchers
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.url == url && body.contains(&m.body_contains))
        {
            return Some(matcher.response.clone());
        }

        let responses = self.responses.lock().unwrap();
        if let Some(response) = responses.get(url) {
            return Some(response.clone());
        }
        if let Some((_, response)) = responses
            .iter()
            .filter(|(pattern, _)| url.starts_with(pattern.as_str()))
            .max_by_key(|(pattern, _)| pattern.len())
        {
            return Some(response.clone());
        }
        drop(responses);

        self.default_response.lock().unwrap().clone()
    }
}

fn resolve(response: MockResponse) -> BoxFuture<'static, Result<Response, NetworkError>> {
    Box::pin(async move {
        match response {
            MockResponse::Success(response) => Ok(response),
            MockResponse::Error(err) => Err(err),
            MockResponse::Delayed(delay, inner) => {
                tokio::time::sleep(delay).await;
                resolve(*inner).await
            }
            MockResponse::Gated(gate, inner) => {
                gate.notified().await;
                resolve(*inner).await
            }
            MockResponse::Hang => std::future::pending().await,
        }
    })
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: &HttpRequest) -> Result<Response, NetworkError> {
        self.requests.lock().unwrap().push(request.clone());

        match self.get_response(request) {
            Some(response) => resolve(response).await,
            None => Err(NetworkError::ConnectionFailed {
                url: request.url.clone(),
                message: "no mock response configured".to_string(),
            }),
        }
    }
}
