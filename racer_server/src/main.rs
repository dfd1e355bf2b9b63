//! Standalone server binary.
//!
//! Usage:
//!   PORT=5000 cargo run -p racer_server -- [--addr 0.0.0.0:5000] [--config racer.json]
//!
//! Serves the WebSocket endpoint at `/ws` and a banner at `/`, and broadcasts
//! the player table to every client 30 times a second.

use std::{env, sync::Arc};

use anyhow::Context;
use racer_server::GameServer;
use racer_shared::{config::RacerConfig, terrain::TerrainParams};
use tokio::net::TcpListener;
use tracing::info;

fn parse_args() -> anyhow::Result<RacerConfig> {
    let args: Vec<String> = env::args().collect();
    let mut cfg = RacerConfig::default();
    let mut addr = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                let text = std::fs::read_to_string(&args[i + 1])
                    .with_context(|| format!("read config {}", args[i + 1]))?;
                cfg = RacerConfig::from_json_str(&text).context("parse config")?;
                i += 2;
            }
            "--addr" if i + 1 < args.len() => {
                addr = Some(args[i + 1].clone());
                i += 2;
            }
            _ => i += 1,
        }
    }
    let mut cfg = cfg.with_port_env();
    if let Some(addr) = addr {
        cfg.listen_addr = addr;
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;

    let params = TerrainParams::default();
    let server = Arc::new(GameServer::with_terrain(params.generate()));
    info!(seed = params.seed, length = params.length, "Track generated");

    let listener = TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("bind {}", cfg.listen_addr))?;
    info!(addr = %listener.local_addr()?, "Server listening");

    server.serve(listener).await
}
