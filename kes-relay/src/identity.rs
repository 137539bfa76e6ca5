//! Persistent endpoint identity.
//!
//! A peer's identity on the relay is its iroh EndpointId, derived from the
//! endpoint's secret key. Keeping the secret in a file keeps the identity
//! stable across restarts. The file holds 32 bytes, hex-encoded.

use crate::config::ServerConfig;
use crate::error::IdentityError;
use iroh::SecretKey;
use std::path::Path;

/// Load the secret key at `path`, or generate and save one if missing.
pub async fn load_or_create_secret_key(path: &Path) -> Result<SecretKey, IdentityError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => parse_secret_key(path, &contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let key = generate_secret_key()?;
            save_secret_key(path, &key).await?;
            tracing::info!("Generated new secret key at {}", path.display());
            Ok(key)
        }
        Err(e) => Err(IdentityError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Secret key for the relay's own endpoint.
///
/// Persistent when `server.secret_key_path` is set, fresh on every start
/// otherwise.
pub async fn relay_secret_key(server: &ServerConfig) -> crate::error::Result<SecretKey> {
    match &server.secret_key_path {
        Some(path) => Ok(load_or_create_secret_key(path).await?),
        None => {
            tracing::warn!("No server.secret_key_path set, relay id will change on restart");
            Ok(generate_secret_key()?)
        }
    }
}

/// Generate a fresh secret key from the OS random source.
pub fn generate_secret_key() -> Result<SecretKey, IdentityError> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).map_err(|e| IdentityError::Random(e.to_string()))?;
    Ok(SecretKey::from_bytes(&bytes))
}

fn parse_secret_key(path: &Path, contents: &str) -> Result<SecretKey, IdentityError> {
    let malformed = |reason: String| IdentityError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = hex::decode(contents.trim()).map_err(|e| malformed(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| malformed(format!("expected 32 bytes, got {}", b.len())))?;

    Ok(SecretKey::from_bytes(&bytes))
}

async fn save_secret_key(path: &Path, key: &SecretKey) -> Result<(), IdentityError> {
    let io_err = |source| IdentityError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    tokio::fs::write(path, hex::encode(key.to_bytes()))
        .await
        .map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(io_err)?;
    }

    Ok(())
}
