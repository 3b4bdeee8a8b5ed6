//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use neatrix_session::adapters::mock::{InMemorySessionStore, MockHttpClient, MockRealtime, MockResponse};
use neatrix_session::auth::{Session, User};
use neatrix_session::config::BackendConfig;
use neatrix_session::sync::{AuthSnapshot, SessionSynchronizer, StateSubscription};
use serde_json::{json, Value};

pub const BASE: &str = "https://abc.supabase.co";

pub fn config() -> BackendConfig {
    BackendConfig::new(BASE, "anon-key")
}

pub fn password_url() -> String {
    format!("{}/auth/v1/token?grant_type=password", BASE)
}

pub fn refresh_url() -> String {
    format!("{}/auth/v1/token?grant_type=refresh_token", BASE)
}

pub fn pkce_url() -> String {
    format!("{}/auth/v1/token?grant_type=pkce", BASE)
}

pub fn user_url() -> String {
    format!("{}/auth/v1/user", BASE)
}

pub fn signup_url() -> String {
    format!("{}/auth/v1/signup", BASE)
}

pub fn logout_url() -> String {
    format!("{}/auth/v1/logout", BASE)
}

pub fn user_json(id: &str, email: &str, verified: bool) -> Value {
    json!({
        "id": id,
        "email": email,
        "email_confirmed_at": if verified { json!("2024-03-01T10:00:00Z") } else { Value::Null },
        "user_metadata": {"full_name": "Jane Doe"}
    })
}

pub fn token_json(id: &str, email: &str, verified: bool) -> Value {
    json!({
        "access_token": format!("access-{}", id),
        "refresh_token": format!("refresh-{}", id),
        "token_type": "bearer",
        "expires_in": 3600,
        "user": user_json(id, email, verified)
    })
}

pub fn user(id: &str, email: &str, verified: bool) -> User {
    serde_json::from_value(user_json(id, email, verified)).unwrap()
}

/// Session expiring `expires_in` seconds from now (negative for expired).
pub fn session(id: &str, email: &str, expires_in: i64) -> Session {
    Session {
        access_token: format!("access-{}", id),
        refresh_token: format!("refresh-{}", id),
        token_type: "bearer".to_string(),
        expires_at: Utc::now().timestamp() + expires_in,
        user: user(id, email, true),
    }
}

pub fn invalid_credentials() -> MockResponse {
    MockResponse::json(
        400,
        json!({"error": "invalid_grant", "error_description": "Invalid login credentials"}),
    )
}

/// A synchronizer over mocks that the test can drive.
pub struct Harness {
    pub sync: Arc<SessionSynchronizer>,
    pub http: MockHttpClient,
    pub store: InMemorySessionStore,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(InMemorySessionStore::new())
    }

    /// Share `store` with an earlier harness to simulate a restart.
    pub fn with_store(store: InMemorySessionStore) -> Self {
        let http = MockHttpClient::new();
        let sync = SessionSynchronizer::new(config(), Arc::new(http.clone()), Arc::new(store.clone()))
            .unwrap();
        Self { sync, http, store }
    }

    pub fn attach_realtime(&self) -> MockRealtime {
        let realtime = MockRealtime::new();
        self.sync.attach_realtime(Arc::new(realtime.clone()));
        realtime
    }

    /// Sign in `id`/`email` against a mocked backend.
    pub async fn signed_in(id: &str, email: &str) -> Self {
        let harness = Self::new();
        harness
            .http
            .push_response(&password_url(), MockResponse::json(200, token_json(id, email, true)));
        harness.sync.sign_in(email, "secret-pw").await.unwrap();
        harness
    }

    /// Yield until the mock has recorded `count` requests to `fragment`.
    pub async fn wait_for_requests(&self, fragment: &str, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.http.requests_to(fragment).len() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("request was never sent");
    }
}

/// Receive the next snapshot or fail after a while.
pub async fn next(sub: &mut StateSubscription) -> Arc<AuthSnapshot> {
    tokio::time::timeout(Duration::from_secs(60), sub.recv())
        .await
        .expect("no snapshot published")
        .expect("subscription closed")
}
