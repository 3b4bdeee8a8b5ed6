//! Mock implementations for testing.
//!
//! This module provides mock implementations of all trait abstractions,
//! enabling tests without network or file system access.
//!
//! # Available Mocks
//!
//! - [`MockHttpClient`] - HTTP client with configurable responses
//! - [`InMemorySessionStore`] - In-memory session storage
//! - [`MockRealtime`] - Realtime connection with event injection

pub mod http;
pub mod realtime;
pub mod session_store;

pub use http::{MockHttpClient, MockResponse};
pub use realtime::MockRealtime;
pub use session_store::InMemorySessionStore;
