//! File reassembly for downloads

use crate::common::{verify_chunk, Result, METRICS};
use crate::coordinator::metadata::MetadataStore;
use crate::coordinator::node_client::StorageNodeClient;
use crate::Error;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use std::time::Instant;

/// FileAssembler rebuilds a file by pulling its chunks in recorded order.
///
/// There is a single copy of every chunk, so the first chunk that cannot be
/// fetched fails the whole download.
pub struct FileAssembler {
    metadata: Arc<MetadataStore>,
    client: Arc<dyn StorageNodeClient>,
}

impl FileAssembler {
    pub fn new(metadata: Arc<MetadataStore>, client: Arc<dyn StorageNodeClient>) -> Self {
        Self { metadata, client }
    }

    pub async fn assemble(&self, name: &str) -> Result<Bytes> {
        let started = Instant::now();
        let result = self.assemble_inner(name).await;
        match &result {
            Ok(data) => {
                METRICS.downloads_total.inc();
                METRICS.bytes_downloaded.add(data.len() as u64);
                METRICS.download_latency.observe_duration(started.elapsed());
            }
            Err(e) => {
                METRICS.downloads_failed.inc();
                tracing::warn!(file = %name, error = %e, "Download failed");
            }
        }
        result
    }

    async fn assemble_inner(&self, name: &str) -> Result<Bytes> {
        // Copy out of the store; no lock is held while pulling
        let meta = self
            .metadata
            .get(name)
            .ok_or_else(|| Error::FileNotFound(name.to_string()))?;

        let mut buf = BytesMut::with_capacity(meta.total_size as usize);
        for chunk in &meta.chunks {
            let data = self.client.pull(&chunk.node, name, &chunk.chunk_id).await?;
            verify_chunk(&data, &chunk.chunk_id)?;
            METRICS.chunks_pulled.inc();
            buf.extend_from_slice(&data);
        }

        let actual = buf.len() as u64;
        if actual != meta.total_size {
            return Err(Error::IntegrityMismatch {
                expected: meta.total_size,
                actual,
            });
        }

        tracing::debug!(file = %name, size = actual, chunks = meta.chunks.len(), "File reassembled");
        Ok(buf.freeze())
    }
}
