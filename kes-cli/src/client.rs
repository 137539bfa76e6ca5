//! Minimal iroh client for the relay.
//!
//! One connection per invocation; one bidirectional stream per message.

use iroh::endpoint::Connection;
use iroh::{Endpoint, EndpointId, SecretKey};
use kes_relay::error::ProtocolError;
use kes_relay::protocol::{decode_reply, encode_frame, ALPN, LENGTH_PREFIX_SIZE};
use std::time::Duration;
use thiserror::Error;

/// Largest reply we are willing to read.
pub const MAX_REPLY_SIZE: usize = 64 * 1024;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The relay address is not a valid EndpointId.
    #[error("invalid relay id: {0}")]
    InvalidRelay(String),

    /// Binding or connecting failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// An operation took too long.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Stream I/O failed.
    #[error("stream error: {0}")]
    Stream(String),

    /// The reply could not be decoded.
    #[error("bad reply: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Parse a relay address into an EndpointId.
pub fn parse_relay(address: &str) -> Result<EndpointId, ClientError> {
    address
        .trim()
        .parse::<EndpointId>()
        .map_err(|e| ClientError::InvalidRelay(e.to_string()))
}

/// A connected client.
pub struct RelayClient {
    endpoint: Endpoint,
    connection: Connection,
    timeout: Duration,
}

impl RelayClient {
    /// Bind a local endpoint with `secret_key` and connect to `relay`.
    pub async fn connect(
        secret_key: SecretKey,
        relay: EndpointId,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let endpoint = Endpoint::builder()
            .secret_key(secret_key)
            .bind()
            .await
            .map_err(|e| ClientError::ConnectionFailed(format!("failed to bind endpoint: {e}")))?;

        let connection = tokio::time::timeout(timeout, endpoint.connect(relay, ALPN))
            .await
            .map_err(|_| ClientError::Timeout(timeout))?
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;

        tracing::debug!("Connected to relay {}", relay);

        Ok(Self {
            endpoint,
            connection,
            timeout,
        })
    }

    /// Our identity as the relay sees it.
    pub fn identity(&self) -> String {
        self.endpoint.id().to_string()
    }

    /// Send one message and wait for the relay to finish the stream.
    ///
    /// Returns `None` when the relay sent nothing back.
    pub async fn send(&self, text: &str) -> Result<Option<String>, ClientError> {
        let exchange = async {
            let (mut send, mut recv) = self
                .connection
                .open_bi()
                .await
                .map_err(|e| ClientError::Stream(format!("failed to open stream: {e}")))?;

            send.write_all(&encode_frame(text))
                .await
                .map_err(|e| ClientError::Stream(format!("failed to write: {e}")))?;
            send.finish()
                .map_err(|e| ClientError::Stream(format!("failed to finish: {e}")))?;

            let buf = recv
                .read_to_end(LENGTH_PREFIX_SIZE + MAX_REPLY_SIZE)
                .await
                .map_err(|e| ClientError::Stream(format!("failed to read reply: {e}")))?;

            Ok::<_, ClientError>(decode_reply(&buf, MAX_REPLY_SIZE)?)
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
    }

    /// Close the connection gracefully.
    pub async fn close(self) {
        self.connection.close(0u32.into(), b"done");
        self.endpoint.close().await;
    }
}
