//! Reqwest-based HTTP client adapter.
//!
//! This module provides the production [`HttpClient`] implementation. It makes
//! exactly one attempt per call; timeouts and retries belong to
//! [`ResilientClient`](crate::transport::ResilientClient).

use async_trait::async_trait;

use crate::error::{classify_reqwest_error, NetworkError};
use crate::traits::{Headers, HttpClient, HttpMethod, HttpRequest, Response};

/// HTTP client implementation using reqwest.
///
/// # Example
///
/// ```ignore
/// use neatrix_session::adapters::ReqwestHttpClient;
/// use neatrix_session::traits::{HttpClient, HttpRequest};
///
/// let client = ReqwestHttpClient::new();
/// let response = client
///     .execute(&HttpRequest::get("https://abc.supabase.co/auth/v1/health"))
///     .await?;
/// println!("Status: {}", response.status);
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a new ReqwestHttpClient with default settings.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a new ReqwestHttpClient with a custom reqwest::Client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    /// Convert reqwest headers to our Headers type.
    fn convert_headers(headers: &reqwest::header::HeaderMap) -> Headers {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect()
    }

    /// Build the reqwest request for a descriptor.
    fn build(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: &HttpRequest) -> Result<Response, NetworkError> {
        let response = self
            .build(request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e, &request.url))?;

        let status = response.status().as_u16();
        let headers = Self::convert_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_reqwest_error(&e, &request.url))?;

        Ok(Response::with_headers(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_convert_headers() {
        let mut header_map = reqwest::header::HeaderMap::new();
        header_map.insert(
            reqwest::header::CONTENT_TYPE,
            "application/json".parse().unwrap(),
        );

        let headers = ReqwestHttpClient::convert_headers(&header_map);
        assert_eq!(
            headers.get("content-type"),
            Some(&"application/json".to_string())
        );
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Get), reqwest::Method::GET);
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Post), reqwest::Method::POST);
        assert_eq!(
            ReqwestHttpClient::method(HttpMethod::Delete),
            reqwest::Method::DELETE
        );
    }

    #[tokio::test]
    async fn test_execute_sends_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/resend"))
            .and(header("apikey", "anon"))
            .and(body_json(serde_json::json!({"type": "signup", "email": "a@b.co"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let request = HttpRequest::post(format!("{}/auth/v1/resend", server.uri()))
            .header("apikey", "anon")
            .json(&serde_json::json!({"type": "signup", "email": "a@b.co"}));
        let response = ReqwestHttpClient::new().execute(&request).await.unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_error_status_is_delivered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
            .mount(&server)
            .await;

        let response = ReqwestHttpClient::new()
            .execute(&HttpRequest::get(format!("{}/auth/v1/user", server.uri())))
            .await
            .unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(response.text().unwrap(), "nope");
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_a_response() {
        let err = ReqwestHttpClient::new()
            .execute(&HttpRequest::get("not a url"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        let err = ReqwestHttpClient::new()
            .execute(&HttpRequest::get("http://127.0.0.1:9/auth/v1/user"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
