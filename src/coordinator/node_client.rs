//! Client side of the storage node API
//!
//! `StorageNodeClient` is the seam between the coordinator and the nodes:
//! `HttpNodeClient` speaks the real HTTP protocol, `MemoryNodeClient` keeps a
//! whole fleet in memory for tests and local experiments.

use crate::common::Result;
use crate::Error;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

#[async_trait]
pub trait StorageNodeClient: Send + Sync {
    /// Store a chunk on `node` under (file name, chunk id). Idempotent.
    async fn push(&self, node: &str, file_name: &str, chunk_id: &str, data: Bytes) -> Result<()>;

    /// Fetch a chunk from `node`.
    async fn pull(&self, node: &str, file_name: &str, chunk_id: &str) -> Result<Bytes>;

    /// Names of the files `node` holds chunks for.
    async fn list_files(&self, node: &str) -> Result<Vec<String>>;
}

pub struct HttpNodeClient {
    client: reqwest::Client,
}

impl HttpNodeClient {
    /// Every request carries `timeout`; expiry counts as a failed call.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn url(node: &str, path: &str) -> String {
        format!("http://{}{}", node, path)
    }
}

#[async_trait]
impl StorageNodeClient for HttpNodeClient {
    async fn push(&self, node: &str, file_name: &str, chunk_id: &str, data: Bytes) -> Result<()> {
        let push_failed = |reason: String| Error::ChunkPushFailed {
            node: node.to_string(),
            chunk_id: chunk_id.to_string(),
            reason,
        };

        let part = Part::bytes(data.to_vec())
            .file_name(format!("{}.{}", file_name, chunk_id))
            .mime_str("application/octet-stream")
            .map_err(|e| push_failed(e.to_string()))?;
        let form = Form::new()
            .text("filename", file_name.to_string())
            .text("chunkid", chunk_id.to_string())
            .part("chunk", part);

        let response = self
            .client
            .post(Self::url(node, "/upload-chunk"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| push_failed(Error::from(e).to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(push_failed(format!("node answered {}", response.status())));
        }
        Ok(())
    }

    async fn pull(&self, node: &str, file_name: &str, chunk_id: &str) -> Result<Bytes> {
        let unavailable = |reason: String| Error::ChunkUnavailable {
            node: node.to_string(),
            chunk_id: chunk_id.to_string(),
            reason,
        };

        let response = self
            .client
            .get(Self::url(node, "/download-chunk"))
            .query(&[("filename", file_name), ("chunkid", chunk_id)])
            .send()
            .await
            .map_err(|e| unavailable(Error::from(e).to_string()))?;

        match response.status() {
            StatusCode::OK => response
                .bytes()
                .await
                .map_err(|e| unavailable(Error::from(e).to_string())),
            StatusCode::NOT_FOUND => Err(unavailable("chunk not found".to_string())),
            status => Err(unavailable(format!("node answered {}", status))),
        }
    }

    async fn list_files(&self, node: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .get(Self::url(node, "/list"))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

type ChunkKey = (String, String, String);

/// In-memory fleet of storage nodes
#[derive(Debug, Default)]
pub struct MemoryNodeClient {
    chunks: Mutex<HashMap<ChunkKey, Bytes>>,
    down: Mutex<HashSet<String>>,
}

impl MemoryNodeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `node` fail (or succeed again)
    pub fn set_down(&self, node: &str, down: bool) {
        let mut nodes = self.down.lock();
        if down {
            nodes.insert(node.to_string());
        } else {
            nodes.remove(node);
        }
    }

    /// Number of chunks stored on `node`
    pub fn chunk_count(&self, node: &str) -> usize {
        self.chunks.lock().keys().filter(|(n, _, _)| n == node).count()
    }

    /// Overwrite a stored chunk's bytes
    pub fn overwrite(&self, node: &str, file_name: &str, chunk_id: &str, data: Bytes) {
        self.chunks.lock().insert(
            (node.to_string(), file_name.to_string(), chunk_id.to_string()),
            data,
        );
    }

    fn is_down(&self, node: &str) -> bool {
        self.down.lock().contains(node)
    }
}

#[async_trait]
impl StorageNodeClient for MemoryNodeClient {
    async fn push(&self, node: &str, file_name: &str, chunk_id: &str, data: Bytes) -> Result<()> {
        if self.is_down(node) {
            return Err(Error::ChunkPushFailed {
                node: node.to_string(),
                chunk_id: chunk_id.to_string(),
                reason: "node unreachable".to_string(),
            });
        }
        self.overwrite(node, file_name, chunk_id, data);
        Ok(())
    }

    async fn pull(&self, node: &str, file_name: &str, chunk_id: &str) -> Result<Bytes> {
        let unavailable = |reason: &str| Error::ChunkUnavailable {
            node: node.to_string(),
            chunk_id: chunk_id.to_string(),
            reason: reason.to_string(),
        };
        if self.is_down(node) {
            return Err(unavailable("node unreachable"));
        }
        self.chunks
            .lock()
            .get(&(node.to_string(), file_name.to_string(), chunk_id.to_string()))
            .cloned()
            .ok_or_else(|| unavailable("chunk not found"))
    }

    async fn list_files(&self, node: &str) -> Result<Vec<String>> {
        if self.is_down(node) {
            return Err(Error::Http(format!("{} unreachable", node)));
        }
        let names: BTreeSet<String> = self
            .chunks
            .lock()
            .keys()
            .filter(|(n, _, _)| n == node)
            .map(|(_, file, _)| file.clone())
            .collect();
        Ok(names.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_push_pull() {
        let client = MemoryNodeClient::new();
        client
            .push("A", "f.txt", "c1", Bytes::from_static(b"abc"))
            .await
            .unwrap();

        let data = client.pull("A", "f.txt", "c1").await.unwrap();
        assert_eq!(data, Bytes::from_static(b"abc"));
        assert_eq!(client.chunk_count("A"), 1);
        assert_eq!(client.list_files("A").await.unwrap(), vec!["f.txt"]);
    }

    #[tokio::test]
    async fn test_memory_pull_wrong_node() {
        let client = MemoryNodeClient::new();
        client
            .push("A", "f.txt", "c1", Bytes::from_static(b"abc"))
            .await
            .unwrap();

        let err = client.pull("B", "f.txt", "c1").await.unwrap_err();
        assert!(matches!(err, Error::ChunkUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_memory_down_node() {
        let client = MemoryNodeClient::new();
        client.set_down("A", true);

        let err = client
            .push("A", "f.txt", "c1", Bytes::from_static(b"abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChunkPushFailed { .. }));

        client.set_down("A", false);
        assert!(client
            .push("A", "f.txt", "c1", Bytes::from_static(b"abc"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_http_push_to_closed_port_fails() {
        // Bind then drop to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let client = HttpNodeClient::new(Duration::from_secs(2)).unwrap();
        let err = client
            .push(&addr, "f.txt", "c1", Bytes::from_static(b"abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChunkPushFailed { .. }));

        let err = client.pull(&addr, "f.txt", "c1").await.unwrap_err();
        assert!(matches!(err, Error::ChunkUnavailable { .. }));
    }
}
