//! In-memory file metadata store
//!
//! Stores, per file name:
//! - total size
//! - ordered chunk records (chunk id, holding node, length)
//!
//! Nothing is persisted; the table lives as long as the coordinator process.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One stored chunk of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    /// Address of the node holding the chunk (weak reference by address)
    pub node: String,
    pub size: u64,
}

/// File metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub total_size: u64,
    /// Reassembly order
    pub chunks: Vec<ChunkRecord>,
    pub created_at: i64,
}

impl FileMetadata {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Bytes covered by the recorded chunks
    pub fn stored_size(&self) -> u64 {
        self.chunks.iter().map(|c| c.size).sum()
    }

    /// Do the recorded chunks still cover the whole file?
    pub fn is_complete(&self) -> bool {
        self.stored_size() == self.total_size
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            name: self.name.clone(),
            total_size: self.total_size,
            chunks: self.chunks.len(),
            complete: self.is_complete(),
            created_at: self.created_at,
        }
    }
}

/// Listing view of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub name: String,
    pub total_size: u64,
    pub chunks: usize,
    pub complete: bool,
    pub created_at: i64,
}

/// Chunk records a file lost because their node went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLoss {
    pub file_name: String,
    pub removed: Vec<ChunkRecord>,
    pub remaining: usize,
}

/// Metadata store
#[derive(Debug, Default)]
pub struct MetadataStore {
    files: RwLock<BTreeMap<String, FileMetadata>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install metadata for a file, replacing any previous entry.
    ///
    /// Returns the replaced entry, if any.
    pub fn install(&self, meta: FileMetadata) -> Option<FileMetadata> {
        self.files.write().insert(meta.name.clone(), meta)
    }

    /// Get a copy of a file's metadata
    pub fn get(&self, name: &str) -> Option<FileMetadata> {
        self.files.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.read().contains_key(name)
    }

    /// Summaries of all files, by name
    pub fn list(&self) -> Vec<FileSummary> {
        self.files.read().values().map(FileMetadata::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    /// Remove every chunk record held by one of `dead_nodes`.
    ///
    /// The whole scan runs under one write lock. Returns one entry per file
    /// that lost at least one record.
    pub fn drop_chunks_on(&self, dead_nodes: &HashSet<String>) -> Vec<ChunkLoss> {
        if dead_nodes.is_empty() {
            return Vec::new();
        }

        let mut files = self.files.write();
        let mut losses = Vec::new();

        for (name, meta) in files.iter_mut() {
            let (removed, kept): (Vec<ChunkRecord>, Vec<ChunkRecord>) =
                std::mem::take(&mut meta.chunks)
                    .into_iter()
                    .partition(|chunk| dead_nodes.contains(&chunk.node));
            meta.chunks = kept;

            if !removed.is_empty() {
                losses.push(ChunkLoss {
                    file_name: name.clone(),
                    removed,
                    remaining: meta.chunks.len(),
                });
            }
        }

        losses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, node: &str, size: u64) -> ChunkRecord {
        ChunkRecord {
            chunk_id: id.to_string(),
            node: node.to_string(),
            size,
        }
    }

    fn file(name: &str, chunks: Vec<ChunkRecord>) -> FileMetadata {
        FileMetadata {
            name: name.to_string(),
            total_size: chunks.iter().map(|c| c.size).sum(),
            chunks,
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_install_and_get() {
        let store = MetadataStore::new();
        let meta = file("a.txt", vec![record("c1", "n1", 3), record("c2", "n2", 1)]);

        assert!(store.install(meta.clone()).is_none());
        let retrieved = store.get("a.txt").unwrap();
        assert_eq!(retrieved, meta);
        assert!(retrieved.is_complete());
        assert!(store.get("b.txt").is_none());
    }

    #[test]
    fn test_install_last_writer_wins() {
        let store = MetadataStore::new();
        store.install(file("a.txt", vec![record("c1", "n1", 3)]));
        let previous = store.install(file("a.txt", vec![record("c9", "n2", 5)]));

        assert_eq!(previous.unwrap().chunks[0].chunk_id, "c1");
        assert_eq!(store.get("a.txt").unwrap().chunks[0].chunk_id, "c9");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_drop_chunks_on_dead_node() {
        let store = MetadataStore::new();
        store.install(file(
            "a.txt",
            vec![record("c1", "A", 3), record("c2", "B", 3), record("c3", "A", 1)],
        ));
        store.install(file("b.txt", vec![record("c4", "B", 2)]));

        let dead: HashSet<String> = ["A".to_string()].into_iter().collect();
        let losses = store.drop_chunks_on(&dead);

        assert_eq!(losses.len(), 1);
        assert_eq!(losses[0].file_name, "a.txt");
        assert_eq!(losses[0].removed.len(), 2);
        assert_eq!(losses[0].remaining, 1);

        let a = store.get("a.txt").unwrap();
        assert_eq!(a.chunks, vec![record("c2", "B", 3)]);
        assert!(!a.is_complete());
        assert_eq!(a.total_size, 7);
        assert_eq!(store.get("b.txt").unwrap().chunks.len(), 1);
    }

    #[test]
    fn test_drop_preserves_order_of_survivors() {
        let store = MetadataStore::new();
        store.install(file(
            "f",
            vec![
                record("c1", "B", 1),
                record("c2", "A", 1),
                record("c3", "C", 1),
                record("c4", "B", 1),
            ],
        ));
        let dead: HashSet<String> = ["A".to_string()].into_iter().collect();
        store.drop_chunks_on(&dead);

        let ids: Vec<String> = store
            .get("f")
            .unwrap()
            .chunks
            .into_iter()
            .map(|c| c.chunk_id)
            .collect();
        assert_eq!(ids, vec!["c1", "c3", "c4"]);
    }

    #[test]
    fn test_list_summaries() {
        let store = MetadataStore::new();
        store.install(file("b", vec![record("c1", "A", 2)]));
        store.install(file("a", vec![]));

        let list = store.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "a");
        assert_eq!(list[1].chunks, 1);
        assert!(list[1].complete);
    }
}
