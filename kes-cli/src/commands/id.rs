//! Show this client's identity.

use anyhow::Result;
use std::path::Path;

use crate::config::load_secret_key;

/// Run the id command.
///
/// Prints the text other peers send to the relay to look up our key.
pub async fn run(data_dir: &Path) -> Result<()> {
    let secret_key = load_secret_key(data_dir).await?;
    println!("{}", secret_key.public());
    Ok(())
}
