//! Main KeyRelay server coordination.
//!
//! KeyRelay owns the key registry, the rate limiters, and session tracking,
//! and turns exchange outcomes into replies.

use crate::config::Config;
use crate::limits::RateLimits;
use crate::registry::{Identity, KeyRegistry, Outcome};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total messages handed to the registry.
    pub messages_total: AtomicU64,
    /// Total messages stored as keys (including overwrites).
    pub keys_stored: AtomicU64,
    /// Total lookups that found a key.
    pub lookups_resolved: AtomicU64,
    /// Total lookups for unknown identities.
    pub lookups_missed: AtomicU64,
    /// Total connections accepted.
    pub connections_total: AtomicU64,
    /// Total rate limit rejections (connection + message + global).
    pub rate_limit_hits: AtomicU64,
    /// Total protocol errors (oversized frames, bad UTF-8, stream failures).
    pub errors_total: AtomicU64,
}

/// Main relay server.
pub struct KeyRelay {
    config: Config,
    registry: KeyRegistry,
    rate_limits: RateLimits,
    metrics: RelayMetrics,
    /// Open connections per peer identity.
    sessions: DashMap<Identity, usize>,
}

impl std::fmt::Debug for KeyRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRelay")
            .field("config", &self.config)
            .field("rate_limits", &self.rate_limits)
            .field("metrics", &self.metrics)
            .field("peers_online", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl KeyRelay {
    /// Create a new KeyRelay around an (usually empty) registry.
    pub fn new(config: Config, registry: KeyRegistry) -> Self {
        let rate_limits = RateLimits::new(&config.limits);
        Self {
            config,
            registry,
            rate_limits,
            metrics: RelayMetrics::default(),
            sessions: DashMap::new(),
        }
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get access to the key registry.
    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Get access to the rate limiters.
    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Run one inbound message through the registry and count the outcome.
    pub async fn handle_message(&self, sender: &Identity, text: &str) -> Outcome {
        self.metrics.messages_total.fetch_add(1, Ordering::Relaxed);

        let outcome = self.registry.handle(sender, text).await;
        let counter = match &outcome {
            Outcome::Stored => &self.metrics.keys_stored,
            Outcome::Resolved(_) => &self.metrics.lookups_resolved,
            Outcome::NotFound => &self.metrics.lookups_missed,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        outcome
    }

    /// The reply to send for an outcome, if any.
    ///
    /// Stores are always silent. Misses are silent unless
    /// `exchange.reply_on_miss` is set.
    pub fn reply_for(&self, outcome: Outcome) -> Option<String> {
        match outcome {
            Outcome::Stored => None,
            Outcome::Resolved(key) => Some(key),
            Outcome::NotFound if self.config.exchange.reply_on_miss => {
                Some(self.config.exchange.miss_reply.clone())
            }
            Outcome::NotFound => None,
        }
    }

    /// Register an open connection for `identity`.
    pub fn register_session(&self, identity: &Identity) {
        let mut count = self.sessions.entry(identity.clone()).or_insert(0);
        *count += 1;

        tracing::debug!(
            "Registered session: peer={:?} (connections: {})",
            identity,
            *count
        );
    }

    /// Unregister a closed connection for `identity`.
    pub fn unregister_session(&self, identity: &Identity) {
        if let Some(mut count) = self.sessions.get_mut(identity) {
            *count = count.saturating_sub(1);
        }
        self.sessions.remove_if(identity, |_, count| *count == 0);

        tracing::debug!(
            "Unregistered session: peer={:?} (remaining: {})",
            identity,
            self.session_count(identity)
        );
    }

    /// Open connections for one identity.
    pub fn session_count(&self, identity: &Identity) -> usize {
        self.sessions.get(identity).map(|c| *c).unwrap_or(0)
    }

    /// Total open connections across all peers.
    pub fn total_sessions(&self) -> usize {
        self.sessions.iter().map(|entry| *entry.value()).sum()
    }

    /// Number of distinct peers currently connected.
    pub fn total_peers(&self) -> usize {
        self.sessions.len()
    }
}
