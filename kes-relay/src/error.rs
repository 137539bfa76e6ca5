//! Error types for kes-relay.
//!
//! None of these ever reach a peer as a message; the key exchange itself
//! has no error replies. They exist for logging and for startup failures.

use std::path::PathBuf;

/// Errors that stop the relay from starting.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Relay identity could not be loaded or created.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),
}

/// Errors loading or creating an endpoint secret key file.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Reading or writing the key file failed.
    #[error("secret key file {path}: {source}")]
    Io {
        /// Path of the key file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The key file does not hold 32 hex-encoded bytes.
    #[error("secret key file {path} is malformed: {reason}")]
    Malformed {
        /// Path of the key file.
        path: PathBuf,
        /// What was wrong with the contents.
        reason: String,
    },

    /// The OS random source failed.
    #[error("failed to generate secret key: {0}")]
    Random(String),
}

/// Protocol layer errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame length exceeds the configured maximum.
    #[error("message too large: {size} bytes (limit: {limit} bytes)")]
    MessageTooLarge {
        /// Length announced by the prefix.
        size: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// Message payload is not valid UTF-8 text.
    #[error("message is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Rate limit exceeded.
    #[error("rate limited: {reason}")]
    RateLimited {
        /// Reason for rate limiting.
        reason: String,
    },
}

/// Result type alias for relay startup.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::MessageTooLarge {
            size: 70_000,
            limit: 65_536,
        };
        assert_eq!(
            err.to_string(),
            "message too large: 70000 bytes (limit: 65536 bytes)"
        );
    }

    #[test]
    fn utf8_error_converts() {
        let bad = String::from_utf8(vec![0xff, 0xfe]).unwrap_err();
        let err: ProtocolError = bad.into();
        assert!(matches!(err, ProtocolError::InvalidUtf8(_)));
    }

    #[test]
    fn identity_error_converts() {
        let err: RelayError = IdentityError::Random("no entropy".to_string()).into();
        assert!(matches!(err, RelayError::Identity(_)));
        assert!(err.to_string().starts_with("identity error"));
    }
}
