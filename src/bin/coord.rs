//! Coordinator binary

use clap::Parser;
use minifs::{Config, Coordinator};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minifs-coord")]
#[command(about = "minifs coordinator: chunk placement, node liveness and file metadata")]
#[command(version)]
struct Cli {
    /// Config file (TOML); MINIFS__* environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address for HTTP
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Chunk size in bytes
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Seconds without a heartbeat before a node is evicted
    #[arg(long)]
    heartbeat_timeout: Option<u64>,

    /// Seconds between failure sweeps
    #[arg(long)]
    sweep_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config from file, then override with CLI arguments
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.coordinator.bind_addr = bind;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.coordinator.chunk_size = chunk_size;
    }
    if let Some(secs) = cli.heartbeat_timeout {
        config.coordinator.heartbeat_timeout_secs = secs;
    }
    if let Some(secs) = cli.sweep_interval {
        config.coordinator.sweep_interval_secs = secs;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let coord = Coordinator::new(config.coordinator);
    tokio::select! {
        res = coord.serve() => res?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down coordinator");
        }
    }

    Ok(())
}
