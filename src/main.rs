//! Gateway route configuration control plane.
//!
//! # Architecture Overview
//!
//! ```text
//!     Operator                 ┌──────────────────────────────────────────────────────┐
//!     ─── REST ───────────────▶│  api ──▶ repository ──▶ store (SQLite transaction)  │
//!                              │                │                                     │
//!                              │                ▼ after commit                        │
//!                              │            notifier ──▶ gateway::ChannelManager      │
//!                              │                                   │                  │
//!     Gateway                  │                                   ▼                  │
//!     ◀── config_update ───────┼──────────────────────────── gateway::session (ws)   │
//!     ─── GET /gateway/config ▶│  snapshot ──▶ store (read transaction)              │
//!                              └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gateway_control_plane::config::{load_config, ControlPlaneConfig};
use gateway_control_plane::lifecycle::{wait_for_signal, Shutdown};
use gateway_control_plane::observability::{logging, metrics};
use gateway_control_plane::{ConfigStore, HttpServer};

#[derive(Parser)]
#[command(name = "gateway-control-plane")]
#[command(about = "Route configuration control plane for API gateways", long_about = None)]
struct Args {
    /// Path to the TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ControlPlaneConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gateway-control-plane starting");

    if config.auth.operators.is_empty() {
        tracing::warn!("No operator tokens configured; the route API will reject every request");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        database = %config.database.url,
        send_timeout_ms = config.gateway.send_timeout_ms,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let store = ConfigStore::connect(&config.database).await?;

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, store.clone());

    match tls {
        Some(tls) => {
            let addr: SocketAddr = bind_address.parse()?;
            server.run_tls(addr, &tls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    store.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
