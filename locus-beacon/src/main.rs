//! Locus beacon agent - main entry point
//!
//! Reads `<mac> <rssi> [name]` lines on stdin (for example from a BLE scanner)
//! and reports averaged readings to the location server.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use locus_beacon::client::DEFAULT_SERVER_URL;
use locus_beacon::{parse_sighting_line, Agent, AgentSettings, BeaconConfig, Sighting, TelemetryClient};

/// Buffered sightings between the reader and the scan loop
const SIGHTING_CHANNEL_CAPACITY: usize = 1024;

/// Command-line arguments for locus-beacon
#[derive(Parser, Debug)]
#[command(name = "locus-beacon")]
#[command(about = "Beacon agent reporting RSSI sightings to locus-server")]
#[command(version)]
struct Args {
    /// Beacon config file (beacon_id, zone, x, y)
    #[arg(short, long, default_value = "beacon.toml", env = "LOCUS_BEACON_CONFIG")]
    config: PathBuf,

    /// Server ingest URL
    #[arg(short, long, default_value = DEFAULT_SERVER_URL, env = "LOCUS_SERVER_URL")]
    server: String,

    /// Scan window length in seconds
    #[arg(long, default_value = "30")]
    scan_duration: u64,

    /// Pause between windows in seconds
    #[arg(long, default_value = "5")]
    scan_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "locus_beacon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = BeaconConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load beacon config {}", args.config.display()))?;
    let client = TelemetryClient::new(args.server.clone()).context("Failed to create HTTP client")?;
    let settings = AgentSettings {
        scan_duration: Duration::from_secs(args.scan_duration),
        scan_interval: Duration::from_secs(args.scan_interval),
        ..AgentSettings::default()
    };

    let (tx, rx) = mpsc::channel(SIGHTING_CHANNEL_CAPACITY);
    tokio::spawn(read_stdin(tx));

    let agent = Agent::new(config, settings, client);
    tokio::select! {
        _ = agent.run(rx) => {},
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
    }

    Ok(())
}

/// Forward parsed stdin lines until EOF
async fn read_stdin(tx: mpsc::Sender<Sighting>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match parse_sighting_line(&line) {
                Ok(sighting) => {
                    if tx.send(sighting).await.is_err() {
                        return;
                    }
                }
                Err(e) => warn!("Skipping line: {}", e),
            },
            Ok(None) => return,
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                return;
            }
        }
    }
}
