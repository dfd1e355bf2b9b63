//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p racer_client -- [--url ws://127.0.0.1:5000/ws] [--name dune] [--frames 600]
//!
//! There is no window: the vehicle is driven by a scripted autopilot and
//! progress is logged once a second. `--frames 0` runs until Ctrl-C.

use std::env;

use anyhow::Context;
use racer_client::{client::GameClient, input::Autopilot};
use racer_shared::{
    config::RacerConfig,
    net::{hz_to_period, FRAME_HZ},
};
use tokio::time::MissedTickBehavior;
use tracing::info;

struct Args {
    cfg: RacerConfig,
    frames: u64,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().collect();
    let mut cfg = RacerConfig::default();
    let mut url = None;
    let mut name = None;
    let mut frames = 0;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                let text = std::fs::read_to_string(&args[i + 1])
                    .with_context(|| format!("read config {}", args[i + 1]))?;
                cfg = RacerConfig::from_json_str(&text).context("parse config")?;
                i += 2;
            }
            "--url" if i + 1 < args.len() => {
                url = Some(args[i + 1].clone());
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                name = Some(args[i + 1].clone());
                i += 2;
            }
            "--frames" if i + 1 < args.len() => {
                frames = args[i + 1].parse().unwrap_or(0);
                i += 2;
            }
            _ => i += 1,
        }
    }
    if let Some(url) = url {
        cfg.server_url = url;
    }
    if name.is_some() {
        cfg.nickname = name;
    }
    Ok(Args { cfg, frames })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let Args { cfg, frames } = parse_args()?;
    info!(server = %cfg.server_url, "Starting client");

    let mut client = GameClient::connect(&cfg);
    let pilot = Autopilot::default();

    let mut ticker = tokio::time::interval(hz_to_period(FRAME_HZ));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }

        let frame = client.frames();
        client.frame(pilot.controls(frame), std::time::Instant::now());

        if frame % u64::from(FRAME_HZ) == 0 {
            info!(
                state = ?client.state(),
                x = client.vehicle.x,
                distance = client.vehicle.distance,
                on_ground = client.vehicle.on_ground,
                remote = client.remote_players().len(),
                "Progress"
            );
        }

        if frames > 0 && client.frames() >= frames {
            break;
        }
    }

    info!(distance = client.vehicle.distance, "Client exiting");
    Ok(())
}
