//! In-memory blob store using `DashMap`.

use super::archive::pack_path;
use super::BlobStore;
use crate::experiment::Artifact;
use crate::{Error, Result};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::debug;

/// In-memory blob store.
///
/// Local sources are packed into tar archives on the blocking pool.
/// Artifacts without a key are stored content-addressed at
/// `blobstore/<sha256>.tgz`, so re-uploading unchanged content yields the
/// same key.
#[derive(Debug)]
pub struct MemoryBlobStore {
    bucket: String,
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    /// Create an empty store for `bucket`.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            blobs: DashMap::new(),
        }
    }

    /// Store raw bytes at `key`, bypassing packing.
    pub fn insert(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.blobs.insert(key.into(), bytes);
    }

    /// Raw bytes stored at `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.get(key).map(|v| v.value().clone())
    }

    /// Whether anything is stored at `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.blobs.contains_key(key)
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

fn content_key(bytes: &[u8]) -> String {
    format!("blobstore/{}.tgz", hex::encode(Sha256::digest(bytes)))
}

impl BlobStore for MemoryBlobStore {
    async fn put(&self, artifact: &Artifact) -> Result<String> {
        let local = artifact
            .local()
            .ok_or_else(|| Error::InvalidInput("artifact has no local source".into()))?
            .to_path_buf();

        let bytes = tokio::task::spawn_blocking(move || pack_path(&local)).await??;
        let key = artifact
            .key()
            .map_or_else(|| content_key(&bytes), ToString::to_string);

        debug!(key = %key, size = bytes.len(), "stored artifact");
        self.blobs.insert(key.clone(), bytes);
        Ok(key)
    }

    async fn stream(&self, artifact: &Artifact) -> Result<Option<Vec<u8>>> {
        Ok(artifact.key().and_then(|key| self.get(key)))
    }

    async fn delete(&self, artifact: &Artifact) -> Result<()> {
        if let Some(key) = artifact.key() {
            self.blobs.remove(key);
        }
        Ok(())
    }

    async fn resolve_url(&self, artifact: &Artifact) -> Result<Option<String>> {
        Ok(artifact
            .key()
            .filter(|key| self.blobs.contains_key(*key))
            .map(|key| self.qualified_location(key)))
    }

    fn qualified_location(&self, key: &str) -> String {
        format!("mem://{}/{}", self.bucket, key)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
