//! Placement of uploaded chunks on storage nodes
//!
//! Chunk `i` of an upload goes to `nodes[i % nodes.len()]`, where `nodes` is
//! the registry snapshot taken when the upload starts. The snapshot is not
//! refreshed mid-upload and a failed push is not retried elsewhere: the chunk
//! is reported in `UploadOutcome::failures` and left out of the metadata.

use crate::common::{timestamp_now, Result, METRICS};
use crate::coordinator::chunker::{self, RawChunk};
use crate::coordinator::metadata::{ChunkRecord, FileMetadata, MetadataStore};
use crate::coordinator::node_client::StorageNodeClient;
use crate::coordinator::registry::NodeRegistry;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;

/// Round-robin target for the chunk at `index`
pub fn assign(index: usize, nodes: &[String]) -> Option<&str> {
    if nodes.is_empty() {
        None
    } else {
        Some(nodes[index % nodes.len()].as_str())
    }
}

/// A chunk that could not be stored during an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub index: usize,
    pub chunk_id: String,
    pub node: String,
    pub reason: String,
}

/// Result of a completed upload
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// What was installed in the metadata store
    pub metadata: FileMetadata,
    /// Chunks dropped because their push failed
    pub failures: Vec<ChunkFailure>,
}

impl UploadOutcome {
    /// Chunks actually recorded
    pub fn chunk_count(&self) -> usize {
        self.metadata.chunk_count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// PlacementPlanner splits uploads and pushes every chunk to one live node.
pub struct PlacementPlanner {
    registry: Arc<NodeRegistry>,
    metadata: Arc<MetadataStore>,
    client: Arc<dyn StorageNodeClient>,
    chunk_size: usize,
}

impl PlacementPlanner {
    pub fn new(
        registry: Arc<NodeRegistry>,
        metadata: Arc<MetadataStore>,
        client: Arc<dyn StorageNodeClient>,
        chunk_size: usize,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(crate::Error::InvalidConfig(
                "chunk_size must be greater than zero".into(),
            ));
        }
        Ok(Self {
            registry,
            metadata,
            client,
            chunk_size,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Store a file read from `stream` and install its metadata.
    ///
    /// Fails with `NoActiveNodes` before touching the stream if no node is
    /// registered. A read error aborts the upload and installs nothing; chunks
    /// already pushed stay on their nodes.
    pub async fn place_file<S>(&self, name: &str, stream: S) -> Result<UploadOutcome>
    where
        S: Stream<Item = Result<Bytes>> + Send,
    {
        let started = Instant::now();
        let nodes = self.registry.active_addresses();
        if nodes.is_empty() {
            METRICS.uploads_failed.inc();
            return Err(crate::Error::NoActiveNodes);
        }

        tracing::info!(
            file = %name,
            nodes = nodes.len(),
            chunk_size = self.chunk_size,
            "Placing file"
        );

        let chunks = chunker::split(stream, self.chunk_size);
        futures_util::pin_mut!(chunks);

        let mut records = Vec::new();
        let mut failures = Vec::new();
        let mut total_size = 0u64;

        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    METRICS.uploads_failed.inc();
                    tracing::error!(file = %name, error = %e, "Upload stream failed");
                    return Err(e);
                }
            };
            total_size += chunk.len() as u64;

            // nodes is non-empty, so assign always has a target
            let Some(target) = assign(chunk.index, &nodes) else {
                return Err(crate::Error::NoActiveNodes);
            };

            match self.push_chunk(target, name, &chunk).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    METRICS.chunk_push_failures.inc();
                    tracing::warn!(
                        file = %name,
                        chunk = chunk.index,
                        node = %target,
                        error = %e,
                        "Chunk push failed, dropping chunk from metadata"
                    );
                    failures.push(ChunkFailure {
                        index: chunk.index,
                        chunk_id: chunk.id.clone(),
                        node: target.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let metadata = FileMetadata {
            name: name.to_string(),
            total_size,
            chunks: records,
            created_at: timestamp_now(),
        };

        if self.metadata.install(metadata.clone()).is_some() {
            tracing::info!(file = %name, "Replaced existing file metadata");
        }

        METRICS.uploads_total.inc();
        METRICS.bytes_uploaded.add(total_size);
        METRICS.files.set(self.metadata.len() as u64);
        METRICS.upload_latency.observe_duration(started.elapsed());

        tracing::info!(
            file = %name,
            size = total_size,
            chunks = metadata.chunks.len(),
            failed = failures.len(),
            "Upload complete"
        );

        Ok(UploadOutcome { metadata, failures })
    }

    async fn push_chunk(&self, node: &str, name: &str, chunk: &RawChunk) -> Result<ChunkRecord> {
        self.client
            .push(node, name, &chunk.id, chunk.data.clone())
            .await?;
        METRICS.chunks_pushed.inc();
        tracing::debug!(file = %name, chunk = chunk.index, id = %chunk.id, node = %node, "Chunk stored");
        Ok(ChunkRecord {
            chunk_id: chunk.id.clone(),
            node: node.to_string(),
            size: chunk.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::chunker::once;
    use crate::coordinator::node_client::MemoryNodeClient;
    use std::collections::HashMap;

    fn planner(
        nodes: &[&str],
        chunk_size: usize,
    ) -> (PlacementPlanner, Arc<MetadataStore>, Arc<MemoryNodeClient>) {
        let registry = Arc::new(NodeRegistry::new());
        let now = Instant::now();
        for node in nodes {
            registry.register(node, now);
        }
        let metadata = Arc::new(MetadataStore::new());
        let client = Arc::new(MemoryNodeClient::new());
        let planner =
            PlacementPlanner::new(registry, metadata.clone(), client.clone(), chunk_size).unwrap();
        (planner, metadata, client)
    }

    #[test]
    fn test_assign_round_robin() {
        let nodes = vec!["A".to_string(), "B".to_string()];
        let targets: Vec<&str> = (0..5).filter_map(|i| assign(i, &nodes)).collect();
        assert_eq!(targets, vec!["A", "B", "A", "B", "A"]);
        assert_eq!(assign(0, &[]), None);
    }

    #[test]
    fn test_assign_balance() {
        let nodes: Vec<String> = (0..3).map(|i| format!("n{}", i)).collect();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for i in 0..10 {
            *counts.entry(assign(i, &nodes).unwrap()).or_default() += 1;
        }
        // 10 chunks over 3 nodes: 4, 3, 3
        assert!(counts.values().all(|&c| c == 3 || c == 4));
        assert_eq!(counts.values().sum::<usize>(), 10);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let result = PlacementPlanner::new(
            Arc::new(NodeRegistry::new()),
            Arc::new(MetadataStore::new()),
            Arc::new(MemoryNodeClient::new()),
            0,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_place_file_round_robin() {
        let (planner, metadata, client) = planner(&["10.0.0.1:6000", "10.0.0.2:6000"], 3);

        let outcome = planner.place_file("f.txt", once(&b"abcdefg"[..])).await.unwrap();
        assert_eq!(outcome.chunk_count(), 3);
        assert!(!outcome.is_partial());

        let nodes: Vec<&str> = outcome.metadata.chunks.iter().map(|c| c.node.as_str()).collect();
        assert_eq!(nodes, vec!["10.0.0.1:6000", "10.0.0.2:6000", "10.0.0.1:6000"]);
        assert_eq!(outcome.metadata.total_size, 7);
        assert_eq!(client.chunk_count("10.0.0.1:6000"), 2);
        assert_eq!(metadata.get("f.txt").unwrap(), outcome.metadata);
    }

    #[tokio::test]
    async fn test_no_active_nodes() {
        let (planner, metadata, _) = planner(&[], 3);
        let err = planner.place_file("f.txt", once(&b"abc"[..])).await.unwrap_err();
        assert!(matches!(err, crate::Error::NoActiveNodes));
        assert!(!metadata.contains("f.txt"));
    }

    #[tokio::test]
    async fn test_failed_push_is_reported_not_fatal() {
        let (planner, metadata, client) = planner(&["10.0.0.1:6000", "10.0.0.2:6000"], 2);
        client.set_down("10.0.0.2:6000", true);

        let outcome = planner.place_file("f.txt", once(&b"aabbccd"[..])).await.unwrap();
        // Chunks 1 and 3 were aimed at the down node
        assert_eq!(outcome.chunk_count(), 2);
        assert_eq!(outcome.failed_count(), 2);
        assert_eq!(
            outcome.failures.iter().map(|f| f.index).collect::<Vec<_>>(),
            vec![1, 3]
        );
        // Failed chunks are not retried on another node
        assert_eq!(client.chunk_count("10.0.0.1:6000"), 2);

        let stored = metadata.get("f.txt").unwrap();
        assert_eq!(stored.total_size, 7);
        assert!(!stored.is_complete());
    }

    #[tokio::test]
    async fn test_read_error_installs_nothing() {
        let (planner, metadata, _) = planner(&["10.0.0.1:6000"], 2);
        let source = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(crate::Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "client went away",
            ))),
        ]);

        let err = planner.place_file("f.txt", source).await.unwrap_err();
        assert!(matches!(err, crate::Error::Io(_)));
        assert!(!metadata.contains("f.txt"));
    }

    #[tokio::test]
    async fn test_empty_file() {
        let (planner, metadata, _) = planner(&["10.0.0.1:6000"], 4);
        let outcome = planner.place_file("empty", once(Bytes::new())).await.unwrap();
        assert_eq!(outcome.chunk_count(), 0);
        assert_eq!(metadata.get("empty").unwrap().total_size, 0);
    }
}
