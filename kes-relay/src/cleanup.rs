//! Background sweep for rate limiter state.
//!
//! Keyed limiters keep one entry per peer ever seen. The sweep evicts
//! entries for peers whose quota has fully recharged. The key registry is
//! never touched: stored keys live until the process exits.

use crate::config::CleanupConfig;
use crate::limits::RateLimits;
use std::time::Duration;
use tokio::time::interval;

/// Spawn the background sweep task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_sweep_task(
    rate_limits: RateLimits,
    config: CleanupConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Rate limiter sweep disabled");
            return;
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!("Rate limiter sweep started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;

            let before = rate_limits.connection_keys_count() + rate_limits.message_keys_count();
            rate_limits.shrink();
            let after = rate_limits.connection_keys_count() + rate_limits.message_keys_count();

            tracing::debug!(
                "Sweep: {} limiter entries evicted, {} remain",
                before.saturating_sub(after),
                after
            );
        }
    })
}
