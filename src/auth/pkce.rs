//! OAuth sign-in with PKCE.
//!
//! The provider redirect is built locally: a random code verifier is kept by
//! the caller while the browser visits the authorize URL carrying the
//! verifier's SHA-256 challenge. The redirect back to `redirect_to` carries a
//! `code` that is exchanged, together with the verifier, for a session.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AuthError, AuthErrorReason};

/// Options for starting a provider sign-in.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthOptions {
    /// Provider name, e.g. `google`
    pub provider: String,
    /// Where the backend redirects after the provider consents
    pub redirect_to: String,
    pub scopes: Option<String>,
    /// Extra provider query parameters
    pub query_params: Vec<(String, String)>,
}

impl OAuthOptions {
    pub fn new(provider: impl Into<String>, redirect_to: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            redirect_to: redirect_to.into(),
            scopes: None,
            query_params: Vec::new(),
        }
    }

    /// Google sign-in asking for offline access and forcing the consent screen.
    pub fn google(redirect_to: impl Into<String>) -> Self {
        Self::new("google", redirect_to)
            .with_query_param("access_type", "offline")
            .with_query_param("prompt", "consent")
    }

    pub fn with_scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = Some(scopes.into());
        self
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }
}

/// URL to open in a browser plus the verifier needed to finish the flow.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthRedirect {
    pub url: String,
    /// Must be passed to `complete_oauth` with the returned code.
    pub code_verifier: String,
}

/// Generate a 43 character code verifier from 32 random bytes.
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}

/// S256 challenge for a verifier: base64url(sha256(verifier)).
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Build the authorize URL under `authorize_endpoint` (`.../auth/v1/authorize`).
pub fn authorize_url(authorize_endpoint: &str, options: &OAuthOptions, challenge: &str) -> String {
    let mut params: Vec<(&str, &str)> = vec![
        ("provider", options.provider.as_str()),
        ("redirect_to", options.redirect_to.as_str()),
    ];
    if let Some(scopes) = &options.scopes {
        params.push(("scopes", scopes.as_str()));
    }
    params.push(("code_challenge", challenge));
    params.push(("code_challenge_method", "s256"));
    for (key, value) in &options.query_params {
        params.push((key.as_str(), value.as_str()));
    }

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", authorize_endpoint, query)
}

/// Start a provider sign-in: fresh verifier and the matching authorize URL.
pub fn begin(authorize_endpoint: &str, options: &OAuthOptions) -> OAuthRedirect {
    let code_verifier = generate_code_verifier();
    let url = authorize_url(authorize_endpoint, options, &code_challenge(&code_verifier));
    OAuthRedirect { url, code_verifier }
}

/// Extract the authorization code from a callback URL or bare code.
///
/// A callback carrying `error`/`error_description` becomes
/// `AuthError(OAuthFailed)`.
pub fn code_from_callback(input: &str) -> Result<String, AuthError> {
    let input = input.trim();
    let Some((_, query)) = input.split_once('?') else {
        if input.is_empty() || input.contains('/') {
            return Err(AuthError::new(
                AuthErrorReason::OAuthFailed,
                "callback carries no authorization code",
            ));
        }
        return Ok(input.to_string());
    };

    let query = query.split('#').next().unwrap_or(query);
    let mut code = None;
    let mut error = None;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(&value.replace('+', " "))
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        match key {
            "code" => code = Some(value),
            "error_description" => error = Some(value),
            "error" if error.is_none() => error = Some(value),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AuthError::new(AuthErrorReason::OAuthFailed, error));
    }
    code.filter(|c| !c.is_empty()).ok_or_else(|| {
        AuthError::new(
            AuthErrorReason::OAuthFailed,
            "callback carries no authorization code",
        )
    })
}
