//! Proactive access token refresh.

use std::sync::Weak;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::synchronizer::SessionSynchronizer;

/// Check the session every `tick` and refresh it once it expires within
/// `threshold`. Stops on shutdown or when the synchronizer is dropped.
pub(crate) async fn run_auto_refresh(
    sync: Weak<SessionSynchronizer>,
    tick: Duration,
    threshold: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let threshold_secs = threshold.as_secs() as i64;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        let Some(sync) = sync.upgrade() else { break };
        let due = sync
            .current()
            .current_session()
            .map(|s| s.expires_within(threshold_secs))
            .unwrap_or(false);
        if !due {
            continue;
        }

        debug!("Access token close to expiry, refreshing");
        if let Err(e) = sync.refresh_now().await {
            warn!(error = %e, "Automatic refresh failed");
        }
    }
    debug!("Auto-refresh loop stopped");
}
