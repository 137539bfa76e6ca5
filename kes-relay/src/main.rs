//! kes-relay binary entry point.
//!
//! Usage:
//! ```bash
//! kes-relay --config kes-relay.toml
//! RUST_LOG=kes_relay=debug kes-relay
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use iroh::protocol::Router;
use iroh::Endpoint;
use kes_relay::cleanup::spawn_sweep_task;
use kes_relay::config::Config;
use kes_relay::http::{build_router, health};
use kes_relay::identity::relay_secret_key;
use kes_relay::protocol::{KesProtocol, ALPN};
use kes_relay::{KeyRegistry, KeyRelay};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// In-memory public key exchange relay.
#[derive(Parser, Debug)]
#[command(name = "kes-relay")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, short, default_value = "kes-relay.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, config_found) = Config::load_or_default(&args.config)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.server.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if !config_found {
        tracing::info!(
            "No config file at {}, using defaults",
            args.config.display()
        );
    }

    health::init_start_time();

    let secret_key = relay_secret_key(&config.server).await?;

    let endpoint = Endpoint::builder()
        .secret_key(secret_key)
        .alpns(vec![ALPN.to_vec()])
        .bind()
        .await
        .context("Failed to bind iroh endpoint")?;

    tracing::info!(
        "KEY EXCHANGE SWARM v{} listening, relay id: {}",
        env!("CARGO_PKG_VERSION"),
        endpoint.id()
    );

    let relay = Arc::new(KeyRelay::new(config.clone(), KeyRegistry::new()));

    let sweep = spawn_sweep_task(relay.rate_limits().clone(), config.cleanup.clone());

    let http = if config.http.enabled {
        let listener = tokio::net::TcpListener::bind(&config.http.bind_address)
            .await
            .with_context(|| format!("Failed to bind HTTP on {}", config.http.bind_address))?;
        tracing::info!("HTTP endpoints on {}", config.http.bind_address);

        let app = build_router(relay.clone());
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("HTTP server error: {}", e);
            }
        }))
    } else {
        None
    };

    let router = Router::builder(endpoint)
        .accept(ALPN, KesProtocol::new(relay.clone()))
        .spawn();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    tracing::info!("Shutting down, discarding {} stored keys", relay.registry().len().await);

    sweep.abort();
    if let Some(http) = http {
        http.abort();
    }
    router
        .shutdown()
        .await
        .context("Failed to shutdown router")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_path() {
        let args = Args::try_parse_from(["kes-relay"]).unwrap();
        assert_eq!(args.config, PathBuf::from("kes-relay.toml"));
    }

    #[test]
    fn custom_config_path() {
        let args = Args::try_parse_from(["kes-relay", "--config", "/etc/kes.toml"]).unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/kes.toml"));
    }
}
