//! On-disk chunk storage
//!
//! Layout: `<root>/<encoded file name>/<chunk id>`. File names are
//! percent-encoded so any name maps to a single directory; chunk ids must be
//! lowercase hex digests.

use crate::common::{decode_name, encode_name, is_chunk_id, validate_name, Result};
use crate::Error;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Distinguishes temp files of concurrent writers in this process
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    /// Open or create a store rooted at `root`
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn chunk_path(&self, file_name: &str, chunk_id: &str) -> Result<PathBuf> {
        validate_name(file_name)?;
        if !is_chunk_id(chunk_id) {
            return Err(Error::BadRequest(format!("invalid chunk id: {}", chunk_id)));
        }
        Ok(self.root.join(encode_name(file_name)).join(chunk_id))
    }

    /// Store a chunk, replacing any previous copy
    pub async fn put(&self, file_name: &str, chunk_id: &str, data: &[u8]) -> Result<()> {
        let path = self.chunk_path(file_name, chunk_id)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        // Write then rename so readers never see a partial chunk. Every writer
        // gets its own temp file; concurrent puts of one chunk must not share it.
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}.{}.tmp", std::process::id(), seq));
        let written = match tokio::fs::write(&tmp, data).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(file = %file_name, chunk = %chunk_id, size = data.len(), "Chunk written");
        Ok(())
    }

    /// Read a chunk; `None` if it is not stored here
    pub async fn get(&self, file_name: &str, chunk_id: &str) -> Result<Option<Bytes>> {
        let path = self.chunk_path(file_name, chunk_id)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of files with at least one chunk here, sorted
    pub async fn list_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(encoded) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match decode_name(&encoded) {
                Ok(name) => names.push(name),
                Err(e) => tracing::warn!(dir = %encoded, error = %e, "Skipping unreadable directory"),
            }
        }
        names.sort();
        Ok(names)
    }

    /// Chunk ids stored for `file_name`, sorted
    pub async fn list_chunks(&self, file_name: &str) -> Result<Vec<String>> {
        validate_name(file_name)?;
        let dir = self.root.join(encode_name(file_name));
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = entry.file_name().to_str() {
                if is_chunk_id(id) {
                    ids.push(id.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
