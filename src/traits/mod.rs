//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - send one HTTP request
//! - [`SessionStore`] - persisted session storage
//! - [`RealtimeConnection`] - backend push channel events

pub mod http;
pub mod realtime;
pub mod session_store;

pub use http::{Headers, HttpClient, HttpMethod, HttpRequest, Response};
pub use realtime::RealtimeConnection;
pub use session_store::{SessionStore, StoreError};
