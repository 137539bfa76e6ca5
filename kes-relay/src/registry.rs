//! In-memory key registry and the store-or-lookup dispatch policy.
//!
//! Every inbound message is classified by the validator:
//! - a valid PEM public key is stored against the sender (silently)
//! - anything else is treated as the identity of another peer to look up
//!
//! A lookup target that happens to parse as a key can never be requested,
//! since the key check runs first.

use crate::validator;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;

/// Opaque sender identity assigned by the transport.
///
/// Never parsed or validated here; used only as a map key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Wrap a transport-provided identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for Identity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Endpoint ids are long; a prefix is enough to correlate log lines.
        let short: String = self.0.chars().take(10).collect();
        write!(f, "Identity({})", short)
    }
}

/// The stored key text for one identity, exactly as it was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord(String);

impl KeyRecord {
    /// Borrow the raw key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take ownership of the raw key text.
    pub fn into_string(self) -> String {
        self.0
    }
}

/// Result of handling one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The message was a valid key and is now the sender's record.
    /// No reply is sent.
    Stored,
    /// The message named an identity with a record; reply with this key.
    Resolved(String),
    /// The message named an identity with no record.
    NotFound,
}

/// Identity → key mapping.
///
/// Created empty, owned by the running relay, dropped with it. All access
/// goes through one exclusive lock so that each [`KeyRegistry::handle`]
/// call is a single critical section.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    keys: Mutex<HashMap<Identity, KeyRecord>>,
}

impl KeyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify `text` and either store it for `sender` or resolve it.
    ///
    /// Validation and the map access happen under the same lock, so a
    /// concurrent store and lookup for one identity are linearizable.
    pub async fn handle(&self, sender: &Identity, text: &str) -> Outcome {
        let mut keys = self.keys.lock().await;

        if let Some(kind) = validator::classify_key(text) {
            let replaced = keys
                .insert(sender.clone(), KeyRecord(text.to_string()))
                .is_some();
            tracing::debug!(
                "Stored {} key for {:?} (replaced: {})",
                kind,
                sender,
                replaced
            );
            return Outcome::Stored;
        }

        match keys.get(text) {
            Some(record) => {
                tracing::debug!("Resolved key for {:?}", sender);
                Outcome::Resolved(record.as_str().to_string())
            }
            None => {
                tracing::debug!("Lookup miss from {:?}", sender);
                Outcome::NotFound
            }
        }
    }

    /// Current record for `identity`, if any.
    pub async fn get(&self, identity: &str) -> Option<KeyRecord> {
        self.keys.lock().await.get(identity).cloned()
    }

    /// Number of identities with a stored key.
    pub async fn len(&self) -> usize {
        self.keys.lock().await.len()
    }

    /// Whether no keys are stored.
    pub async fn is_empty(&self) -> bool {
        self.keys.lock().await.is_empty()
    }
}
