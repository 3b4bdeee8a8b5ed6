//! Authentication against the backend.
//!
//! This module provides:
//! - Session and user domain types
//! - Typed auth API client with backend error translation
//! - OAuth PKCE helpers

pub mod gotrue;
pub mod pkce;
pub mod session;

pub use gotrue::{translate_error, GoTrueApi, SignUpOutcome, TokenResponse};
pub use pkce::{OAuthOptions, OAuthRedirect};
pub use session::{jwt_expires_at, Session, User};
