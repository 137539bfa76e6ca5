//! # kes-cli
//!
//! Command-line client for the kes public key relay.
//!
//! ## Commands
//!
//! - `id`: Print this client's identity (what peers look us up by)
//! - `publish`: Store a PEM public key on the relay under our identity
//! - `lookup`: Fetch another peer's key by identity
//!
//! ## Example
//!
//! ```bash
//! # Share your identity with a peer out of band
//! kes-cli id
//!
//! # Publish your key
//! kes-cli --relay <RELAY_ID> publish ~/.ssh/me.pub.pem
//!
//! # Fetch theirs
//! kes-cli --relay <RELAY_ID> lookup <PEER_ID> > peer.pem
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod client;
mod commands;
mod config;

use commands::{id, lookup, publish};

/// Command-line client for the kes public key relay.
#[derive(Parser, Debug)]
#[command(name = "kes-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding this client's identity key
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Relay EndpointId to talk to
    #[arg(long, global = true, env = "KES_RELAY")]
    relay: Option<String>,

    /// Seconds to wait for the relay before giving up
    #[arg(long, global = true, default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print this client's identity
    Id,

    /// Publish a PEM public key under this client's identity
    Publish {
        /// PEM file containing the public key
        key_file: PathBuf,
    },

    /// Look up the public key another peer published
    Lookup {
        /// The peer's identity (as printed by `kes-cli id`)
        identity: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => config::default_data_dir()?,
    };
    config::ensure_data_dir(&data_dir).await?;

    let timeout = Duration::from_secs(cli.timeout);

    match cli.command {
        Commands::Id => id::run(&data_dir).await?,
        Commands::Publish { key_file } => {
            let relay = require_relay(cli.relay.as_deref())?;
            publish::run(&data_dir, relay, &key_file, timeout).await?;
        }
        Commands::Lookup { identity } => {
            let relay = require_relay(cli.relay.as_deref())?;
            lookup::run(&data_dir, relay, &identity, timeout).await?;
        }
    }

    Ok(())
}

fn require_relay(relay: Option<&str>) -> Result<&str> {
    relay.context("No relay given. Pass --relay <ENDPOINT_ID> or set KES_RELAY")
}
