//! Per-connection session management.
//!
//! A session lives as long as the QUIC connection. Every bidirectional
//! stream the peer opens carries exactly one message.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{read_text, write_text};
use crate::registry::{Identity, Outcome};
use crate::server::KeyRelay;
use iroh::endpoint::{Connection, RecvStream, SendStream};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// A per-connection session.
pub struct Session {
    relay: Arc<KeyRelay>,
    connection: Connection,
    /// Sender identity for every message on this connection.
    identity: Identity,
    /// Raw EndpointId, the rate limiter key.
    peer_key: [u8; 32],
}

impl Session {
    /// Create a new session for a connection.
    ///
    /// The identity is the authenticated remote EndpointId, rendered as text.
    pub fn new(relay: Arc<KeyRelay>, connection: Connection) -> Self {
        let remote_id = connection.remote_id();
        Self {
            relay,
            identity: Identity::new(remote_id.to_string()),
            peer_key: *remote_id.as_bytes(),
            connection,
        }
    }

    /// Run the session until the peer disconnects or goes idle.
    pub async fn run(self) {
        tracing::info!("New connection from {}", self.identity);
        self.relay.register_session(&self.identity);

        let idle_timeout = Duration::from_secs(self.relay.config().limits.idle_timeout_secs);

        loop {
            let (send, recv) =
                match tokio::time::timeout(idle_timeout, self.connection.accept_bi()).await {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(e)) => {
                        tracing::debug!("Connection closed: {}", e);
                        break;
                    }
                    Err(_) => {
                        tracing::debug!(
                            "Idle timeout ({}s) for {}",
                            idle_timeout.as_secs(),
                            self.identity
                        );
                        self.connection.close(0u32.into(), b"idle");
                        break;
                    }
                };

            if let Err(e) = self.handle_stream(send, recv).await {
                if !matches!(e, ProtocolError::RateLimited { .. }) {
                    self.relay.metrics().errors_total.fetch_add(1, Ordering::Relaxed);
                }
                tracing::warn!("Stream error from {:?}: {}", self.identity, e);
            }
        }

        self.relay.unregister_session(&self.identity);
    }

    /// Handle a single bidirectional stream: one message, at most one reply.
    async fn handle_stream(&self, mut send: SendStream, mut recv: RecvStream) -> ProtocolResult<()> {
        let max_size = self.relay.config().limits.max_message_size;
        let result = self.exchange(&mut send, &mut recv, max_size).await;

        // Always end the reply side so the peer's read completes, even when
        // nothing was written.
        send.finish()
            .map_err(|e| ProtocolError::Stream(e.to_string()))?;

        result
    }

    async fn exchange(
        &self,
        send: &mut SendStream,
        recv: &mut RecvStream,
        max_size: usize,
    ) -> ProtocolResult<()> {
        let text = read_text(recv, max_size).await?;

        if let Err(e) = self.relay.rate_limits().check_message(&self.peer_key) {
            self.relay.metrics().rate_limit_hits.fetch_add(1, Ordering::Relaxed);
            return Err(ProtocolError::RateLimited {
                reason: e.to_string(),
            });
        }

        let outcome = self.relay.handle_message(&self.identity, &text).await;
        tracing::info!(
            "{:?} → {}",
            self.identity,
            match &outcome {
                Outcome::Stored => "stored",
                Outcome::Resolved(_) => "resolved",
                Outcome::NotFound => "not found",
            }
        );

        if let Some(reply) = self.relay.reply_for(outcome) {
            write_text(send, &reply).await?;
        }

        Ok(())
    }
}
