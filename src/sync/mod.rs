//! Session and auth state synchronization.
//!
//! [`SessionSynchronizer`] owns the authenticated session, validates it at
//! startup, keeps it fresh and publishes every change, including realtime
//! connectivity, as an immutable [`AuthSnapshot`].

pub mod events;
mod refresh;
pub mod state;
mod subscribers;
pub mod synchronizer;

pub use events::{AuthEvent, RealtimeEvent};
pub use state::{AuthChange, AuthPhase, AuthSnapshot, ConnectionState, EmailStatus};
pub use subscribers::StateSubscription;
pub use synchronizer::{SessionSynchronizer, SignOutReport};
