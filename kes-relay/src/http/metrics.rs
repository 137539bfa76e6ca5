//! Prometheus metrics endpoint.

use crate::server::KeyRelay;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns gauges (current state) and counters (monotonic since startup)
/// in Prometheus text format.
pub async fn metrics_handler(Extension(relay): Extension<Arc<KeyRelay>>) -> impl IntoResponse {
    render(&relay, relay.registry().len().await)
}

fn render(relay: &KeyRelay, keys: usize) -> impl IntoResponse {
    let m = relay.metrics();

    // Gauges
    let connections = relay.total_sessions();
    let peers = relay.total_peers();
    let limiter_keys =
        relay.rate_limits().connection_keys_count() + relay.rate_limits().message_keys_count();

    // Counters
    let messages = m.messages_total.load(Ordering::Relaxed);
    let stored = m.keys_stored.load(Ordering::Relaxed);
    let resolved = m.lookups_resolved.load(Ordering::Relaxed);
    let missed = m.lookups_missed.load(Ordering::Relaxed);
    let conns_total = m.connections_total.load(Ordering::Relaxed);
    let rate_limits = m.rate_limit_hits.load(Ordering::Relaxed);
    let errors = m.errors_total.load(Ordering::Relaxed);

    let body = format!(
        r#"# HELP kes_relay_keys Number of identities with a stored key
# TYPE kes_relay_keys gauge
kes_relay_keys {keys}

# HELP kes_relay_connections_active Number of open connections
# TYPE kes_relay_connections_active gauge
kes_relay_connections_active {connections}

# HELP kes_relay_peers_active Number of distinct connected peers
# TYPE kes_relay_peers_active gauge
kes_relay_peers_active {peers}

# HELP kes_relay_limiter_entries Number of tracked rate limiter keys
# TYPE kes_relay_limiter_entries gauge
kes_relay_limiter_entries {limiter_keys}

# HELP kes_relay_info Server information
# TYPE kes_relay_info gauge
kes_relay_info{{version="{version}"}} 1

# HELP kes_relay_messages_total Total messages handled
# TYPE kes_relay_messages_total counter
kes_relay_messages_total {messages}

# HELP kes_relay_keys_stored_total Total keys stored, including overwrites
# TYPE kes_relay_keys_stored_total counter
kes_relay_keys_stored_total {stored}

# HELP kes_relay_lookups_resolved_total Total lookups that returned a key
# TYPE kes_relay_lookups_resolved_total counter
kes_relay_lookups_resolved_total {resolved}

# HELP kes_relay_lookups_missed_total Total lookups for unknown identities
# TYPE kes_relay_lookups_missed_total counter
kes_relay_lookups_missed_total {missed}

# HELP kes_relay_connections_total Total connections accepted
# TYPE kes_relay_connections_total counter
kes_relay_connections_total {conns_total}

# HELP kes_relay_rate_limit_hits_total Total rate limit rejections
# TYPE kes_relay_rate_limit_hits_total counter
kes_relay_rate_limit_hits_total {rate_limits}

# HELP kes_relay_errors_total Total protocol errors
# TYPE kes_relay_errors_total counter
kes_relay_errors_total {errors}
"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry::{Identity, KeyRegistry};
    use axum::body::to_bytes;

    #[tokio::test]
    async fn counters_appear_in_output() {
        let relay = Arc::new(KeyRelay::new(Config::default(), KeyRegistry::new()));
        relay.handle_message(&Identity::from("bob"), "alice").await;

        let response = metrics_handler(Extension(relay)).await.into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains("kes_relay_keys 0"));
        assert!(text.contains("kes_relay_messages_total 1"));
        assert!(text.contains("kes_relay_lookups_missed_total 1"));
    }
}
