//! Publish a public key to the relay.

use anyhow::{Context, Result};
use kes_relay::classify_key;
use std::path::Path;
use std::time::Duration;

/// Run the publish command.
///
/// The key is checked locally first: text the relay does not recognize as a
/// key would be treated as a lookup instead of being stored.
pub async fn run(data_dir: &Path, relay: &str, key_file: &Path, timeout: Duration) -> Result<()> {
    let key = tokio::fs::read_to_string(key_file)
        .await
        .with_context(|| format!("Failed to read {}", key_file.display()))?;

    let kind = classify_key(&key).with_context(|| {
        format!(
            "{} is not a PEM public key; the relay would treat it as a lookup",
            key_file.display()
        )
    })?;

    let client = super::connect(data_dir, relay, timeout).await?;
    let identity = client.identity();

    if let Some(unexpected) = client.send(&key).await? {
        tracing::warn!("Relay replied to a publish: {}", unexpected);
    }
    client.close().await;

    println!("Published {} key as {}", kind, identity);
    Ok(())
}
