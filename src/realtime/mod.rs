//! Realtime websocket client for the backend push channel.
//!
//! The client speaks the Phoenix channel protocol: it joins the configured
//! topics, keeps the socket alive with heartbeats and reconnects with
//! backoff. Everything it observes is reported as a
//! [`RealtimeEvent`](crate::sync::RealtimeEvent).

pub mod client;
pub mod messages;

pub use client::{reconnect_backoff, RealtimeClient};
pub use messages::{channel_topic, PhoenixMessage};
