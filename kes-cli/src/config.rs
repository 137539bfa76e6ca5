//! Local client state: the data directory and the endpoint secret key.

use anyhow::{Context, Result};
use iroh::SecretKey;
use kes_relay::identity::load_or_create_secret_key;
use std::path::{Path, PathBuf};

/// File name of the client's endpoint secret key inside the data directory.
pub const SECRET_KEY_FILE: &str = "endpoint.key";

/// Default data directory for kes-cli.
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "kes", "kes-cli")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Create the data directory (owner-only on Unix) if it does not exist.
pub async fn ensure_data_dir(data_dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .context("Failed to create data directory")?;
    set_dir_permissions_0700(data_dir).await
}

/// Load this client's secret key, creating it on first use.
///
/// The relay identifies us by the matching public key, so losing this file
/// means publishing under a new identity.
pub async fn load_secret_key(data_dir: &Path) -> Result<SecretKey> {
    let path = data_dir.join(SECRET_KEY_FILE);
    load_or_create_secret_key(&path)
        .await
        .with_context(|| format!("Failed to load client identity from {}", path.display()))
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
