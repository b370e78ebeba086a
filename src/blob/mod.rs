//! Blob store for artifact bytes
//!
//! The registry never handles artifact bytes itself; it hands artifact
//! descriptors to a [`BlobStore`] and records the keys it returns.
//!
//! # Example
//!
//! ```rust,no_run
//! use trueno_registry::blob::{BlobStore, MemoryBlobStore};
//! use trueno_registry::experiment::Artifact;
//!
//! # async fn example() -> trueno_registry::Result<()> {
//! let store = MemoryBlobStore::new("lab-bucket");
//!
//! // Immutable artifacts get a content-addressed key
//! let artifact = Artifact::immutable("/home/alice/project");
//! let key = store.put(&artifact).await?;
//! assert!(key.starts_with("blobstore/"));
//! # Ok(())
//! # }
//! ```

pub mod archive;
mod memory;

pub use memory::MemoryBlobStore;

use crate::experiment::Artifact;
use crate::Result;
use std::future::Future;

/// Content store for artifact bytes, addressed by key.
pub trait BlobStore: Send + Sync {
    /// Upload the artifact's local source.
    ///
    /// Stores at the artifact's key if it already has one, otherwise at a
    /// key chosen by the store. Returns the key used.
    ///
    /// Fails with `Error::NotFound` if the local source is unreadable and
    /// `Error::InvalidInput` if the artifact has no local source.
    fn put(&self, artifact: &Artifact) -> impl Future<Output = Result<String>> + Send;

    /// Fetch the artifact's stored bytes.
    ///
    /// Returns `None` if the artifact has no key or nothing is stored at it.
    fn stream(&self, artifact: &Artifact) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Delete the artifact's stored bytes. No-op if absent.
    fn delete(&self, artifact: &Artifact) -> impl Future<Output = Result<()>> + Send;

    /// Resolve a download URL for the artifact, if it is stored.
    fn resolve_url(&self, artifact: &Artifact)
        -> impl Future<Output = Result<Option<String>>> + Send;

    /// Fully qualified location for a storage key. Pure; no round trip.
    fn qualified_location(&self, key: &str) -> String;

    /// Bucket attached to every artifact stored here.
    fn bucket(&self) -> &str;
}
