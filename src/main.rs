//! Tool-dispatch server
//!
//! Entry point: loads configuration, initialises logging and serves the
//! WebSocket and HTTP transports.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use urs_mcp::config::{AppConfig, Cli};
use urs_mcp::{server, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before clap reads env-backed flags
    dotenv().ok();

    let cli = Cli::parse();
    telemetry::init(cli.log_json);

    let config = match AppConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        name: "config.loaded",
        host = %config.server.host,
        port = config.server.port,
        remote = config.remote.url.is_some(),
        "Configuration loaded"
    );

    server::start_server(Arc::new(config)).await
}
