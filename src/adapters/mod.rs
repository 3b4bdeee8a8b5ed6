//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`FileSessionStore`] - JSON file session storage
//!
//! The realtime connection lives in [`crate::realtime`].
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles for all adapters:
//! - [`mock::MockHttpClient`] - Configurable HTTP responses
//! - [`mock::MockRealtime`] - Realtime event injection
//! - [`mock::InMemorySessionStore`] - In-memory session storage

pub mod file_session_store;
pub mod mock;
pub mod reqwest_http;

pub use file_session_store::FileSessionStore;
pub use mock::{InMemorySessionStore, MockHttpClient, MockRealtime};
pub use reqwest_http::ReqwestHttpClient;
