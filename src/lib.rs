//! Neatrix session - auth state synchronization for the Neatrix booking backend
//!
//! The crate keeps one authoritative answer to "who is signed in" for a
//! process talking to a Supabase-style backend:
//!
//! - [`transport`] retries idempotent requests with per-attempt timeouts
//! - [`auth`] speaks the `/auth/v1` API and owns the session types
//! - [`sync`] publishes immutable auth snapshots to subscribers
//! - [`realtime`] reports push channel connectivity

pub mod adapters;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod realtime;
pub mod sync;
pub mod traits;
pub mod transport;
