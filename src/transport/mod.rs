//! Resilient transport for all backend traffic.

pub mod retry;

pub use retry::{ResilientClient, RetryPolicy, RetryableRequest};
