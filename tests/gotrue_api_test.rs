//! Integration tests for the auth API over real HTTP.
//!
//! These run [`GoTrueApi`] on top of the reqwest adapter and the resilient
//! client against a wiremock server, covering:
//! - request shape (headers, bodies, grant types)
//! - error translation from both backend body shapes
//! - retries, attempt timeouts and non-retried grants

use std::sync::Arc;
use std::time::Duration;

use neatrix_session::adapters::ReqwestHttpClient;
use neatrix_session::auth::{GoTrueApi, SignUpOutcome};
use neatrix_session::config::BackendConfig;
use neatrix_session::error::{AuthErrorReason, NetworkError, SessionError};
use neatrix_session::transport::{ResilientClient, RetryPolicy};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        attempt_timeout: Duration::from_millis(300),
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    }
}

fn api(server: &MockServer) -> GoTrueApi {
    let config = BackendConfig::new(server.uri(), "anon-key");
    let client = ResilientClient::new(Arc::new(ReqwestHttpClient::new()), fast_policy());
    GoTrueApi::new(client, config)
}

fn token_body() -> serde_json::Value {
    json!({
        "access_token": "at-1",
        "refresh_token": "rt-1",
        "token_type": "bearer",
        "expires_in": 3600,
        "user": {
            "id": "u1",
            "email": "jane@example.com",
            "email_confirmed_at": "2024-03-01T10:00:00Z"
        }
    })
}

#[tokio::test]
async fn test_password_sign_in_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", "anon-key"))
        .and(header("Authorization", "Bearer anon-key"))
        .and(body_partial_json(json!({"email": "jane@example.com", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;

    let session = api(&server)
        .sign_in_with_password("jane@example.com", "pw")
        .await
        .unwrap();
    assert_eq!(session.access_token, "at-1");
    assert_eq!(session.user_id(), "u1");
    assert!(session.is_email_verified());
    assert!(session.seconds_until_expiry() > 3500);
}

#[tokio::test]
async fn test_invalid_credentials_are_translated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = api(&server)
        .sign_in_with_password("jane@example.com", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err.auth_reason(), Some(AuthErrorReason::InvalidCredentials));
}

#[tokio::test]
async fn test_email_not_confirmed_is_translated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": 400,
            "error_code": "email_not_confirmed",
            "msg": "Email not confirmed"
        })))
        .mount(&server)
        .await;

    let err = api(&server)
        .sign_in_with_password("jane@example.com", "pw")
        .await
        .unwrap_err();
    assert_eq!(err.auth_reason(), Some(AuthErrorReason::EmailNotConfirmed));
}

#[tokio::test]
async fn test_sign_up_sends_profile_as_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(body_partial_json(json!({
            "email": "new@example.com",
            "data": {"full_name": "New Customer", "phone": "0700"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": "u9", "email": "new@example.com", "email_confirmed_at": null},
            "session": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = api(&server)
        .sign_up(
            "new@example.com",
            "secret-pw",
            &json!({"full_name": "New Customer", "phone": "0700"}),
        )
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        SignUpOutcome::VerificationRequired(ref user) if user.id == "u9" && !user.is_email_verified()
    ));
}

#[tokio::test]
async fn test_get_user_uses_access_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("Authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "u1",
            "email": "jane@example.com",
            "user_metadata": {"full_name": "Jane Doe"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = api(&server).get_user("at-1").await.unwrap();
    assert_eq!(user.id, "u1");
    assert_eq!(user.profile["full_name"], "Jane Doe");
    assert!(!user.is_email_verified());
}

#[tokio::test]
async fn test_sign_out_treats_unknown_session_as_done() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    assert!(api(&server).sign_out("stale-token").await.is_ok());
}

#[tokio::test]
async fn test_server_error_response_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let err = api(&server).refresh_session("rt-1").await.unwrap_err();
    assert_eq!(err.auth_reason(), Some(AuthErrorReason::ServerError));
}

#[tokio::test]
async fn test_slow_attempts_time_out_and_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "u1"}))
                .set_delay(Duration::from_secs(2)),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "u1"})))
        .expect(1)
        .mount(&server)
        .await;

    let user = api(&server).get_user("at-1").await.unwrap();
    assert_eq!(user.id, "u1");
}

#[tokio::test]
async fn test_exhausted_timeouts_surface_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(3)
        .mount(&server)
        .await;

    let err = api(&server).get_user("at-1").await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Network(NetworkError::Timeout { .. })
    ));
    assert_eq!(err.user_message(), "Something went wrong. Please try again.");
}

#[tokio::test]
async fn test_code_exchange_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "pkce"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(1)
        .mount(&server)
        .await;

    let err = api(&server)
        .exchange_code_for_session("code", "verifier")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Network(NetworkError::Timeout { .. })));
}

#[tokio::test]
async fn test_unreachable_backend_is_retried_then_fails() {
    let config = BackendConfig::new("http://127.0.0.1:9", "anon-key");
    let client = ResilientClient::new(Arc::new(ReqwestHttpClient::new()), fast_policy());
    let api = GoTrueApi::new(client, config);

    let err = api.resend_verification("jane@example.com").await.unwrap_err();
    assert!(matches!(err, SessionError::Network(_)));
    assert!(err.is_retryable());
}
