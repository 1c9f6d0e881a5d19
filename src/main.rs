//! Bingo Relay Server
//!
//! Binary entry point: initializes logging, reads configuration from the
//! environment, and runs the relay until interrupted.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bingo_relay::server::{RelayServer, ServerConfig};
use bingo_relay::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Bingo Relay Server v{}", VERSION);

    let config = ServerConfig::from_env();
    let mut handle = RelayServer::new(config).start().await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    handle.shutdown();
    handle.join().await;
    Ok(())
}
