//! Look up another peer's public key.

use anyhow::{bail, Result};
use std::path::Path;
use std::time::Duration;

/// Run the lookup command.
///
/// Prints the peer's key on stdout so it can be redirected into a file.
pub async fn run(data_dir: &Path, relay: &str, identity: &str, timeout: Duration) -> Result<()> {
    if kes_relay::is_valid_key(identity) {
        bail!("Lookup target is itself a PEM key; the relay would store it as yours");
    }

    let client = super::connect(data_dir, relay, timeout).await?;
    let reply = client.send(identity).await?;
    client.close().await;

    match reply {
        Some(key) if kes_relay::is_valid_key(&key) => {
            print!("{}", key);
            if !key.ends_with('\n') {
                println!();
            }
            Ok(())
        }
        // Relays configured with `exchange.reply_on_miss` answer misses in text
        Some(notice) => bail!("No key for {}: relay says {:?}", identity, notice),
        None => bail!("No key returned for {}", identity),
    }
}
