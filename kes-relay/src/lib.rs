//! # kes-relay
//!
//! In-memory public key exchange relay.
//!
//! Peers connect over iroh QUIC and send plain text messages. The relay
//! looks at each one and either:
//! - stores it as the sender's public key, if it is a well-formed PEM key
//! - treats it as another peer's identity and replies with that peer's key
//!
//! Nothing is persisted: keys live in memory until the process exits.
//!
//! ## Architecture
//!
//! ```text
//! Peer A ──┐                          ┌── Peer B
//!          │   iroh QUIC  /kes/1      │
//!          ├─────────────────────────►│
//!      ┌───┴──────────────────────────┴───┐
//!      │            kes-relay             │
//!      │  validator ─► registry (memory)  │
//!      └──────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! One message per bidirectional stream, length-prefixed UTF-8:
//! - PEM public key → stored against the sender's EndpointId, no reply
//! - EndpointId text → reply with that peer's key, or no reply on a miss

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleanup;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod limits;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod validator;

pub use registry::{Identity, KeyRecord, KeyRegistry, Outcome};
pub use server::KeyRelay;
pub use validator::{classify_key, is_valid_key, KeyKind};
