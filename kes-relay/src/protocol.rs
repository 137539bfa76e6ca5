//! Protocol handler and framing for the `/kes/1` ALPN.
//!
//! Each message travels on its own bidirectional stream:
//!
//! ```text
//! peer  → relay   [u32 BE length][UTF-8 text]
//! relay → peer    [u32 BE length][UTF-8 reply]   or nothing, then FIN
//! ```
//!
//! The relay never sends an error frame. A peer that gets no frame back
//! before the stream finishes should assume its message was stored, was a
//! lookup miss, or was dropped.

use crate::error::{ProtocolError, ProtocolResult};
use crate::server::KeyRelay;
use crate::session::Session;
use iroh::endpoint::{Connection, RecvStream, SendStream};
use iroh::protocol::{AcceptError, ProtocolHandler};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Protocol identifier for the key exchange relay.
pub const ALPN: &[u8] = b"/kes/1";

/// Size of the big-endian length prefix on every frame.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Encode `text` as a length-prefixed frame.
pub fn encode_frame(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + bytes.len());
    frame.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    frame.extend_from_slice(bytes);
    frame
}

/// Decode a complete reply as read to the end of a stream.
///
/// An empty buffer means the relay finished the stream without replying.
pub fn decode_reply(buf: &[u8], max_size: usize) -> ProtocolResult<Option<String>> {
    if buf.is_empty() {
        return Ok(None);
    }

    let (prefix, body) = buf
        .split_first_chunk::<LENGTH_PREFIX_SIZE>()
        .ok_or_else(|| ProtocolError::Stream("truncated length prefix".to_string()))?;
    let len = check_len(*prefix, max_size)?;

    if body.len() != len {
        return Err(ProtocolError::Stream(format!(
            "frame length mismatch: prefix says {}, got {}",
            len,
            body.len()
        )));
    }

    Ok(Some(String::from_utf8(body.to_vec())?))
}

fn check_len(prefix: [u8; LENGTH_PREFIX_SIZE], max_size: usize) -> ProtocolResult<usize> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len > max_size {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            limit: max_size,
        });
    }
    Ok(len)
}

/// Read one length-prefixed UTF-8 message from the stream.
///
/// The length is checked before anything is allocated.
pub async fn read_text(recv: &mut RecvStream, max_size: usize) -> ProtocolResult<String> {
    let mut len_buf = [0u8; LENGTH_PREFIX_SIZE];
    recv.read_exact(&mut len_buf)
        .await
        .map_err(|e| ProtocolError::Stream(e.to_string()))?;
    let len = check_len(len_buf, max_size)?;

    let mut buf = vec![0u8; len];
    recv.read_exact(&mut buf)
        .await
        .map_err(|e| ProtocolError::Stream(e.to_string()))?;

    Ok(String::from_utf8(buf)?)
}

/// Write one length-prefixed UTF-8 message to the stream.
pub async fn write_text(send: &mut SendStream, text: &str) -> ProtocolResult<()> {
    send.write_all(&encode_frame(text))
        .await
        .map_err(|e| ProtocolError::Stream(e.to_string()))
}

/// Protocol handler for accepting key exchange connections.
#[derive(Clone, Debug)]
pub struct KesProtocol {
    relay: Arc<KeyRelay>,
}

impl KesProtocol {
    /// Create a new protocol handler.
    pub fn new(relay: Arc<KeyRelay>) -> Self {
        Self { relay }
    }
}

impl ProtocolHandler for KesProtocol {
    fn accept(
        &self,
        connection: Connection,
    ) -> impl std::future::Future<Output = Result<(), AcceptError>> + Send {
        let relay = self.relay.clone();
        async move {
            let remote_id = connection.remote_id();
            if let Err(e) = relay.rate_limits().check_connection(remote_id.as_bytes()) {
                tracing::warn!("Connection rate limited for {}: {}", remote_id, e);
                relay.metrics().rate_limit_hits.fetch_add(1, Ordering::Relaxed);
                connection.close(1u32.into(), b"rate limited");
                return Ok(());
            }

            let max_sessions = relay.config().limits.max_concurrent_sessions;
            if relay.total_sessions() >= max_sessions {
                tracing::warn!(
                    "Session limit reached ({}/{}), rejecting {}",
                    relay.total_sessions(),
                    max_sessions,
                    remote_id
                );
                connection.close(2u32.into(), b"too many sessions");
                return Ok(());
            }

            relay.metrics().connections_total.fetch_add(1, Ordering::Relaxed);

            let session = Session::new(relay, connection);
            // Don't block the accept loop
            tokio::spawn(session.run());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 64 * 1024;

    #[test]
    fn alpn_is_versioned() {
        assert_eq!(ALPN, b"/kes/1");
    }

    #[test]
    fn frame_has_big_endian_prefix() {
        let frame = encode_frame("alice");
        assert_eq!(&frame[..4], &[0, 0, 0, 5]);
        assert_eq!(&frame[4..], b"alice");
    }

    #[test]
    fn empty_stream_means_no_reply() {
        assert_eq!(decode_reply(&[], LIMIT).unwrap(), None);
    }

    #[test]
    fn decodes_single_frame() {
        let frame = encode_frame("-----BEGIN PUBLIC KEY-----");
        assert_eq!(
            decode_reply(&frame, LIMIT).unwrap().as_deref(),
            Some("-----BEGIN PUBLIC KEY-----")
        );
    }

    #[test]
    fn empty_text_is_a_reply() {
        let frame = encode_frame("");
        assert_eq!(decode_reply(&frame, LIMIT).unwrap(), Some(String::new()));
    }

    #[test]
    fn rejects_short_prefix() {
        assert!(matches!(
            decode_reply(&[0, 0], LIMIT),
            Err(ProtocolError::Stream(_))
        ));
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut frame = encode_frame("alice");
        frame.pop();
        assert!(matches!(
            decode_reply(&frame, LIMIT),
            Err(ProtocolError::Stream(_))
        ));
    }

    #[test]
    fn rejects_oversized_prefix() {
        let frame = (u32::MAX).to_be_bytes();
        assert!(matches!(
            decode_reply(&frame, LIMIT),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn rejects_invalid_utf8() {
        let mut frame = 2u32.to_be_bytes().to_vec();
        frame.extend_from_slice(&[0xc3, 0x28]);
        assert!(matches!(
            decode_reply(&frame, LIMIT),
            Err(ProtocolError::InvalidUtf8(_))
        ));
    }
}
