//! CLI command implementations.

pub mod id;
pub mod lookup;
pub mod publish;

use crate::client::{parse_relay, RelayClient};
use crate::config::load_secret_key;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

/// Connect to `relay` as the identity stored in `data_dir`.
pub(crate) async fn connect(data_dir: &Path, relay: &str, timeout: Duration) -> Result<RelayClient> {
    let relay_id = parse_relay(relay)?;
    let secret_key = load_secret_key(data_dir).await?;

    RelayClient::connect(secret_key, relay_id, timeout)
        .await
        .with_context(|| format!("Failed to connect to relay {}", relay_id))
}
