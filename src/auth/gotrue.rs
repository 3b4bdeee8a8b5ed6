//! Typed client for the backend's auth REST API.
//!
//! Every call goes through [`ResilientClient`]. This is the translation
//! boundary: backend error bodies are folded into [`AuthError`] here and
//! nowhere else.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::pkce::{self, OAuthOptions, OAuthRedirect};
use super::session::{jwt_expires_at, Session, User};
use crate::config::BackendConfig;
use crate::error::{AuthError, AuthErrorReason, NetworkError, SessionResult};
use crate::traits::{HttpMethod, HttpRequest, Response};
use crate::transport::ResilientClient;

/// Lifetime assumed when the backend reports no expiry at all.
const FALLBACK_EXPIRES_IN_SECS: i64 = 3600;

/// Token grant response (password, refresh_token and pkce grants).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl TokenResponse {
    /// Convert into a session, resolving the expiry relative to `now`.
    pub fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now + secs))
            .or_else(|| jwt_expires_at(&self.access_token))
            .unwrap_or(now + FALLBACK_EXPIRES_IN_SECS);

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user: self.user,
        }
    }
}

/// Result of a sign-up.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    /// The backend confirms emails automatically and returned a session.
    SignedIn(Session),
    /// Account created; a confirmation email was sent.
    VerificationRequired(User),
}

/// Client for `/auth/v1`.
#[derive(Clone)]
pub struct GoTrueApi {
    client: ResilientClient,
    config: BackendConfig,
}

impl GoTrueApi {
    pub fn new(client: ResilientClient, config: BackendConfig) -> Self {
        Self { client, config }
    }

    fn request(&self, method: HttpMethod, path: &str, bearer: Option<&str>) -> HttpRequest {
        HttpRequest::new(method, self.config.auth_url(path))
            .header("apikey", self.config.anon_key.as_str())
            .header(
                "Authorization",
                format!("Bearer {}", bearer.unwrap_or(self.config.anon_key.as_str())),
            )
            .header("x-client-info", self.config.client_info.as_str())
    }

    /// Deliver `request`; non-2xx responses become translated `AuthError`s.
    async fn send(&self, request: HttpRequest) -> SessionResult<Response> {
        let response = self.client.execute(&request).await?;
        if response.is_success() {
            return Ok(response);
        }

        let err = translate_error(response.status, &response.body);
        debug!(
            endpoint = %request.describe(),
            status = response.status,
            reason = %err.reason,
            "Auth request rejected"
        );
        Err(err.into())
    }

    /// POST /auth/v1/token?grant_type=password
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> SessionResult<Session> {
        let request = self
            .request(HttpMethod::Post, "token?grant_type=password", None)
            .json(&json!({ "email": email, "password": password }))
            .idempotent(true);
        self.token_grant(request).await
    }

    /// POST /auth/v1/token?grant_type=refresh_token
    pub async fn refresh_session(&self, refresh_token: &str) -> SessionResult<Session> {
        let request = self
            .request(HttpMethod::Post, "token?grant_type=refresh_token", None)
            .json(&json!({ "refresh_token": refresh_token }))
            .idempotent(true);
        self.token_grant(request).await
    }

    /// POST /auth/v1/token?grant_type=pkce
    pub async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> SessionResult<Session> {
        // A replayed code is rejected as used, so this grant is not retried.
        let request = self
            .request(HttpMethod::Post, "token?grant_type=pkce", None)
            .json(&json!({ "auth_code": auth_code, "code_verifier": code_verifier }));
        self.token_grant(request).await
    }

    async fn token_grant(&self, request: HttpRequest) -> SessionResult<Session> {
        let target = request.describe();
        let response = self.send(request).await?;
        let token: TokenResponse = response.json().map_err(|e| invalid_response(&target, e))?;
        Ok(token.into_session(Utc::now().timestamp()))
    }

    /// POST /auth/v1/signup
    ///
    /// `profile` is stored as the user's metadata.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &Value,
    ) -> SessionResult<SignUpOutcome> {
        let data = if profile.is_null() { json!({}) } else { profile.clone() };
        // A replay of an accepted signup reports the account as taken, so
        // this request is not retried.
        let request = self
            .request(HttpMethod::Post, "signup", None)
            .json(&json!({ "email": email, "password": password, "data": data }));
        let target = request.describe();
        let response = self.send(request).await?;
        let body: Value = response.json().map_err(|e| invalid_response(&target, e))?;
        parse_sign_up(body, Utc::now().timestamp()).map_err(|e| invalid_response(&target, e).into())
    }

    /// GET /auth/v1/user
    pub async fn get_user(&self, access_token: &str) -> SessionResult<User> {
        let request = self.request(HttpMethod::Get, "user", Some(access_token));
        let target = request.describe();
        let response = self.send(request).await?;
        Ok(response.json().map_err(|e| invalid_response(&target, e))?)
    }

    /// POST /auth/v1/logout
    ///
    /// A token the backend no longer knows counts as signed out.
    pub async fn sign_out(&self, access_token: &str) -> SessionResult<()> {
        let request = self
            .request(HttpMethod::Post, "logout", Some(access_token))
            .idempotent(true);
        let response = self.client.execute(&request).await?;
        match response.status {
            200..=299 | 401 | 403 | 404 => Ok(()),
            status => Err(translate_error(status, &response.body).into()),
        }
    }

    /// POST /auth/v1/resend for a sign-up confirmation email.
    pub async fn resend_verification(&self, email: &str) -> SessionResult<()> {
        let request = self
            .request(HttpMethod::Post, "resend", None)
            .json(&json!({ "type": "signup", "email": email }))
            .idempotent(true);
        self.send(request).await.map(|_| ())
    }

    /// Authorize URL and verifier for a provider sign-in. No request is sent.
    pub fn begin_oauth(&self, options: &OAuthOptions) -> OAuthRedirect {
        pkce::begin(&self.config.auth_url("authorize"), options)
    }
}

fn invalid_response(target: &str, err: serde_json::Error) -> NetworkError {
    NetworkError::InvalidResponse {
        message: format!("{}: {}", target, err),
    }
}

/// Sign-up answers with a session when emails are auto-confirmed, otherwise
/// with the bare user or `{ user, session: null }`.
fn parse_sign_up(body: Value, now: i64) -> Result<SignUpOutcome, serde_json::Error> {
    if body.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(body)?;
        return Ok(SignUpOutcome::SignedIn(token.into_session(now)));
    }

    match body.get("user").filter(|u| !u.is_null()) {
        Some(user) => {
            let user: User = serde_json::from_value(user.clone())?;
            match body.get("session").filter(|s| s.get("access_token").is_some()) {
                Some(session) => {
                    let mut session = session.clone();
                    session["user"] = serde_json::to_value(&user)?;
                    let token: TokenResponse = serde_json::from_value(session)?;
                    Ok(SignUpOutcome::SignedIn(token.into_session(now)))
                }
                None => Ok(SignUpOutcome::VerificationRequired(user)),
            }
        }
        None => Ok(SignUpOutcome::VerificationRequired(serde_json::from_value(body)?)),
    }
}

/// Fold a backend error response into the closed [`AuthErrorReason`] set.
///
/// Understands both body shapes the backend has used:
/// `{"error_code": "...", "msg": "..."}` and
/// `{"error": "...", "error_description": "..."}`.
pub fn translate_error(status: u16, body: &[u8]) -> AuthError {
    let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
    let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);

    let code = field("error_code")
        .or_else(|| field("code"))
        .or_else(|| field("error"));
    let message = field("msg")
        .or_else(|| field("message"))
        .or_else(|| field("error_description"))
        .or_else(|| field("error"))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

    let reason = reason_for(status, code.as_deref(), &message);
    let detail = match &code {
        Some(code) => format!("{} {}: {}", status, code, message),
        None => format!("{}: {}", status, message),
    };
    AuthError::new(reason, detail)
}

fn reason_for(status: u16, code: Option<&str>, message: &str) -> AuthErrorReason {
    if let Some(code) = code {
        let by_code = match code {
            "invalid_credentials" => Some(AuthErrorReason::InvalidCredentials),
            "email_not_confirmed" => Some(AuthErrorReason::EmailNotConfirmed),
            "user_already_exists" | "email_exists" => Some(AuthErrorReason::UserAlreadyExists),
            "weak_password" => Some(AuthErrorReason::WeakPassword),
            "signup_disabled" | "email_provider_disabled" => Some(AuthErrorReason::SignupDisabled),
            "validation_failed" | "email_address_invalid" => Some(AuthErrorReason::InvalidInput),
            "session_not_found"
            | "session_expired"
            | "refresh_token_not_found"
            | "refresh_token_already_used"
            | "bad_jwt" => Some(AuthErrorReason::SessionExpired),
            "bad_code_verifier" => Some(AuthErrorReason::OAuthFailed),
            c if c.starts_with("over_") && c.ends_with("_rate_limit") => {
                Some(AuthErrorReason::RateLimited)
            }
            c if c.starts_with("flow_state_") || c.starts_with("bad_oauth_") => {
                Some(AuthErrorReason::OAuthFailed)
            }
            _ => None,
        };
        if let Some(reason) = by_code {
            return reason;
        }
    }

    let message = message.to_lowercase();
    if message.contains("invalid login credentials") {
        AuthErrorReason::InvalidCredentials
    } else if message.contains("email not confirmed") {
        AuthErrorReason::EmailNotConfirmed
    } else if message.contains("already registered") {
        AuthErrorReason::UserAlreadyExists
    } else if message.contains("password should") {
        AuthErrorReason::WeakPassword
    } else if message.contains("rate limit") || status == 429 {
        AuthErrorReason::RateLimited
    } else if message.contains("refresh token") || status == 401 {
        AuthErrorReason::SessionExpired
    } else if (500..=599).contains(&status) {
        AuthErrorReason::ServerError
    } else {
        AuthErrorReason::Rejected
    }
}
