//! Campaign relay.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                   CAMPAIGN RELAY                     │
//!                  │                                                      │
//!  GET /cid/<id>   │  ┌──────────┐   ┌──────────┐   ┌──────────────┐      │
//!  ────────────────┼─▶│   http   │──▶│ campaign │──▶│    target    │      │
//!                  │  │ dispatch │   │ registry │   │   builder    │      │
//!                  │  └──────────┘   └──────────┘   └──────┬───────┘      │
//!                  │                                       │              │
//!                  │                                       ▼              │
//!  Response        │  ┌──────────┐                 ┌──────────────┐      │
//!  ◀───────────────┼──│ response │◀────────────────│   forward    │◀─────┼─── Partner
//!  (no cookies,    │  │ rewrite  │                 │ (fresh conn) │      │    upstream
//!   no redirects)  │  └──────────┘                 └──────────────┘      │
//!                  │                                                      │
//!                  │  config · observability · lifecycle                  │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use campaign_relay::config::{load_config, RelayConfig};
use campaign_relay::lifecycle::{signals, Shutdown};
use campaign_relay::observability::{logging, metrics};
use campaign_relay::HttpServer;

const DEFAULT_CONFIG: &str = "campaign-relay.toml";

#[derive(Debug, Parser)]
#[command(name = "campaign-relay", version, about = "Ad campaign redirection relay")]
struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, env = "RELAY_CONFIG", default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Listen address, overrides `listener.bind_address`.
    #[arg(short, long, env = "RELAY_BIND")]
    bind: Option<String>,
}

fn load(cli: &Cli) -> Result<RelayConfig, Box<dyn std::error::Error>> {
    let mut config = if cli.config.as_os_str() == DEFAULT_CONFIG && !cli.config.exists() {
        RelayConfig::default()
    } else {
        load_config(&cli.config)?
    };

    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    } else if let Ok(port) = std::env::var("PORT") {
        config.listener.bind_address = format!("0.0.0.0:{port}");
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "campaign-relay starting");
    tracing::info!(
        config = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
