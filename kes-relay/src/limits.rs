//! Rate limiting for kes-relay.
//!
//! Peers are keyed by their 32-byte EndpointId, which iroh authenticates
//! during the QUIC handshake. Three limiters apply:
//! - new connections per peer
//! - messages per peer
//! - messages across all peers
//!
//! Keyed limiters are backed by DashMap and swept by the cleanup task.

use crate::config::LimitsConfig;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Type alias for a keyed rate limiter using DashMap.
type KeyedLimiter<K> = RateLimiter<
    K,
    dashmap::DashMap<K, InMemoryState>,
    DefaultClock,
    NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Type alias for a direct (non-keyed) rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiters for the relay server.
#[derive(Clone)]
pub struct RateLimits {
    connection_limiter: Arc<KeyedLimiter<[u8; 32]>>,
    message_limiter: Arc<KeyedLimiter<[u8; 32]>>,
    global_limiter: Arc<DirectLimiter>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("connection_keys", &self.connection_limiter.len())
            .field("message_keys", &self.message_limiter.len())
            .finish()
    }
}

impl RateLimits {
    /// Create rate limiters from configuration.
    ///
    /// Zero values are rejected by [`crate::config::Config::validate`];
    /// if one slips through it is treated as a quota of one.
    pub fn new(config: &LimitsConfig) -> Self {
        let connection_quota = Quota::per_minute(non_zero(config.connections_per_minute));
        let message_quota = Quota::per_minute(non_zero(config.messages_per_minute));
        let global_quota = Quota::per_second(non_zero(config.global_requests_per_second));

        Self {
            connection_limiter: Arc::new(RateLimiter::keyed(connection_quota)),
            message_limiter: Arc::new(RateLimiter::keyed(message_quota)),
            global_limiter: Arc::new(RateLimiter::direct(global_quota)),
        }
    }

    /// Check if a connection attempt from `endpoint_id` is allowed.
    pub fn check_connection(&self, endpoint_id: &[u8; 32]) -> Result<(), RateLimitError> {
        self.connection_limiter
            .check_key(endpoint_id)
            .map_err(|_| RateLimitError::ConnectionLimitExceeded)
    }

    /// Check if a message from `endpoint_id` is allowed.
    ///
    /// The global limit is checked first so that one noisy peer cannot
    /// consume another peer's share of the aggregate budget.
    pub fn check_message(&self, endpoint_id: &[u8; 32]) -> Result<(), RateLimitError> {
        self.global_limiter
            .check()
            .map_err(|_| RateLimitError::GlobalLimitExceeded)?;
        self.message_limiter
            .check_key(endpoint_id)
            .map_err(|_| RateLimitError::MessageLimitExceeded)
    }

    /// Number of tracked connection keys (for metrics).
    pub fn connection_keys_count(&self) -> usize {
        self.connection_limiter.len()
    }

    /// Number of tracked message keys (for metrics).
    pub fn message_keys_count(&self) -> usize {
        self.message_limiter.len()
    }

    /// Evict entries for peers whose quota has fully recharged.
    pub fn shrink(&self) {
        self.connection_limiter.retain_recent();
        self.message_limiter.retain_recent();
    }
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

/// Rate limit error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// Too many connection attempts from this peer.
    #[error("connection rate limit exceeded")]
    ConnectionLimitExceeded,
    /// Too many messages from this peer.
    #[error("message rate limit exceeded")]
    MessageLimitExceeded,
    /// Aggregate message rate exceeded across all peers.
    #[error("global rate limit exceeded")]
    GlobalLimitExceeded,
}
