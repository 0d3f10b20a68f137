//! Coordinator server

use crate::common::{CoordinatorConfig, Result};
use crate::coordinator::assembler::FileAssembler;
use crate::coordinator::http::{create_router, CoordState};
use crate::coordinator::metadata::MetadataStore;
use crate::coordinator::node_client::{HttpNodeClient, StorageNodeClient};
use crate::coordinator::placement::PlacementPlanner;
use crate::coordinator::registry::NodeRegistry;
use crate::coordinator::sweeper::{FailureSweeper, ReplicationNeeded};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub struct Coordinator {
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self { config }
    }

    /// Bind the configured address and serve until the listener fails
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        self.config.validate()?;

        tracing::info!("Starting coordinator");
        tracing::info!("  HTTP API: {}", listener.local_addr()?);
        tracing::info!("  Chunk size: {} bytes", self.config.chunk_size);
        tracing::info!("  Heartbeat timeout: {:?}", self.config.heartbeat_timeout());
        tracing::info!("  Sweep interval: {:?}", self.config.sweep_interval());
        if self.config.sweep_interval() > self.config.heartbeat_timeout() {
            tracing::warn!(
                "Sweep interval exceeds heartbeat timeout; dead nodes will linger past the timeout"
            );
        }

        let registry = Arc::new(NodeRegistry::new());
        let metadata = Arc::new(MetadataStore::new());
        let client: Arc<dyn StorageNodeClient> =
            Arc::new(HttpNodeClient::new(self.config.node_timeout())?);

        let planner = Arc::new(PlacementPlanner::new(
            registry.clone(),
            metadata.clone(),
            client.clone(),
            self.config.chunk_size,
        )?);
        let assembler = Arc::new(FileAssembler::new(metadata.clone(), client));

        let sweeper = Arc::new(FailureSweeper::new(
            registry.clone(),
            metadata.clone(),
            self.config.sweep_interval(),
            self.config.heartbeat_timeout(),
        ));
        let _events = spawn_event_logger(sweeper.subscribe());

        let state = CoordState {
            registry,
            metadata,
            planner,
            assembler,
        };
        let router = create_router(state, self.config.max_upload_bytes);

        tracing::info!("✓ Coordinator ready");

        let http_server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .into_future();

        tokio::select! {
            res = http_server => {
                if let Err(e) = res {
                    tracing::error!("HTTP server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = sweeper.run() => {}
        }

        Ok(())
    }
}

/// Record re-replication signals until the sweeper goes away
pub fn spawn_event_logger(mut rx: broadcast::Receiver<ReplicationNeeded>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => tracing::info!(target: "minifs::replication", "{}", json),
                    Err(e) => tracing::warn!("Failed to encode replication event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Replication event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
