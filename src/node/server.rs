//! Storage node server

use crate::common::{NodeConfig, Result};
use crate::node::heartbeat::Heartbeat;
use crate::node::http::{create_router, NodeState};
use crate::node::store::ChunkStore;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Largest multipart body a node accepts for one chunk upload
const MAX_CHUNK_REQUEST_BYTES: usize = 256 * 1024 * 1024;

pub struct NodeServer {
    config: NodeConfig,
}

impl NodeServer {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener; heartbeats advertise its port
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        self.config.validate()?;
        let local = listener.local_addr()?;

        tracing::info!("Starting storage node");
        tracing::info!("  HTTP API: {}", local);
        tracing::info!("  Storage path: {}", self.config.storage_path.display());
        tracing::info!("  Coordinator: {}", self.config.coordinator_url);

        let store = Arc::new(ChunkStore::open(&self.config.storage_path)?);

        // A heartbeat must finish well inside one interval
        let heartbeat = Heartbeat::new(
            &self.config.coordinator_url,
            local.port(),
            self.config.heartbeat_interval(),
        )?;

        let router = create_router(NodeState { store }, MAX_CHUNK_REQUEST_BYTES);

        tracing::info!("✓ Storage node ready");

        tokio::select! {
            res = axum::serve(listener, router).into_future() => {
                if let Err(e) = res {
                    tracing::error!("HTTP server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = heartbeat.run(self.config.heartbeat_interval()) => {}
        }

        Ok(())
    }
}
