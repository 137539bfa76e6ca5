//! Health check endpoint.

use crate::server::KeyRelay;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Number of identities with a stored key.
    pub keys: usize,
    /// Number of open connections.
    pub connections: usize,
    /// Number of distinct connected peers.
    pub peers: usize,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
pub async fn health_handler(Extension(relay): Extension<Arc<KeyRelay>>) -> Json<HealthStatus> {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        keys: relay.registry().len().await,
        connections: relay.total_sessions(),
        peers: relay.total_peers(),
        uptime_seconds: uptime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry::{Identity, KeyRegistry};
    use crate::validator::fixtures::RSA_SPKI_PEM;

    #[test]
    fn health_status_serializes() {
        let status = HealthStatus {
            status: "ok".to_string(),
            version: "1.0.0".to_string(),
            keys: 7,
            connections: 3,
            peers: 2,
            uptime_seconds: 3600,
        };

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"keys\":7"));
    }

    #[tokio::test]
    async fn health_reports_key_count() {
        let relay = Arc::new(KeyRelay::new(Config::default(), KeyRegistry::new()));
        relay
            .handle_message(&Identity::from("alice"), RSA_SPKI_PEM)
            .await;
        relay.register_session(&Identity::from("alice"));

        let Json(status) = health_handler(Extension(relay)).await;

        assert_eq!(status.keys, 1);
        assert_eq!(status.connections, 1);
        assert_eq!(status.peers, 1);
    }
}
