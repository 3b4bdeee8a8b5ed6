//! Session and user domain types.
//!
//! A [`Session`] is the authenticated identity plus its token expiry. It is
//! persisted as JSON under the configured storage key so a restarted process
//! can reconstruct it.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A backend user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Set once the user followed the confirmation link.
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    /// Free-form profile payload supplied at sign-up (name, phone, ...).
    #[serde(default, rename = "user_metadata")]
    pub profile: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_email_verified(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

/// Authenticated session owned by the synchronizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Access token expiry as Unix timestamp (seconds since epoch).
    pub expires_at: i64,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn email(&self) -> Option<&str> {
        self.user.email.as_deref()
    }

    pub fn is_email_verified(&self) -> bool {
        self.user.is_email_verified()
    }

    /// Check if the access token is expired at `now` (Unix seconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Check if the access token is expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    /// Seconds left before the access token expires (negative once expired).
    pub fn seconds_until_expiry(&self) -> i64 {
        self.expires_at - Utc::now().timestamp()
    }

    /// Check if the token expires within `threshold_secs`.
    pub fn expires_within(&self, threshold_secs: i64) -> bool {
        self.seconds_until_expiry() < threshold_secs
    }

    /// Copy of this session carrying an updated user record.
    pub fn with_user(&self, user: User) -> Self {
        Self {
            user,
            ..self.clone()
        }
    }
}

/// JWT claims for extracting expiration time.
#[derive(Deserialize)]
struct JwtClaims {
    exp: i64,
}

/// Extract the `exp` claim (Unix seconds) from a JWT access token.
///
/// Returns None if the token cannot be parsed. The signature is not checked.
pub fn jwt_expires_at(access_token: &str) -> Option<i64> {
    let parts: Vec<&str> = access_token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let payload = URL_SAFE_NO_PAD.decode(parts[1]).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&payload).ok()?;
    Some(claims.exp)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn user(id: &str, email: &str, verified: bool) -> User {
        User {
            id: id.to_string(),
            email: Some(email.to_string()),
            email_confirmed_at: verified.then(Utc::now),
            profile: serde_json::json!({}),
            created_at: None,
        }
    }

    pub fn session(id: &str, email: &str, expires_in: i64) -> Session {
        Session {
            access_token: format!("access-{}", id),
            refresh_token: format!("refresh-{}", id),
            token_type: "bearer".to_string(),
            expires_at: Utc::now().timestamp() + expires_in,
            user: user(id, email, true),
        }
    }
}
