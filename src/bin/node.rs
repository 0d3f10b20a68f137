//! Storage node binary

use clap::Parser;
use minifs::{Config, NodeServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "minifs-node")]
#[command(about = "minifs storage node: stores chunks and heartbeats to the coordinator")]
#[command(version)]
struct Args {
    /// Config file (TOML); MINIFS__* environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Coordinator base URL
    #[arg(short, long)]
    coordinator: Option<String>,

    /// Directory for chunk files
    #[arg(short, long)]
    storage: Option<PathBuf>,

    /// Milliseconds between heartbeats
    #[arg(long)]
    heartbeat_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.node.bind_addr = bind;
    }
    if let Some(url) = args.coordinator {
        config.node.coordinator_url = url;
    }
    if let Some(path) = args.storage {
        config.node.storage_path = path;
    }
    if let Some(ms) = args.heartbeat_interval {
        config.node.heartbeat_interval_ms = ms;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = NodeServer::new(config.node);
    tokio::select! {
        res = server.serve() => res?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down storage node");
        }
    }

    Ok(())
}
