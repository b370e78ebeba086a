//! Artifact - one named payload belonging to an experiment

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Artifact represents one named payload of an experiment.
///
/// Mutability is fixed at creation:
/// - immutable artifacts are uploaded once, when the experiment is added,
///   and keep whatever key the blob store assigned
/// - mutable artifacts live at a key derived from the experiment key and
///   tag, and are re-uploaded by every checkpoint that has a local source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    mutable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    qualified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bucket: Option<String>,
}

impl Artifact {
    /// Create an artifact with the given mutability and no local source.
    #[must_use]
    pub const fn new(mutable: bool) -> Self {
        Self {
            mutable,
            local: None,
            key: None,
            qualified: None,
            bucket: None,
        }
    }

    /// Mutable artifact uploaded from `local` on every checkpoint.
    #[must_use]
    pub fn mutable(local: impl Into<PathBuf>) -> Self {
        Self::new(true).with_local(local)
    }

    /// Immutable artifact uploaded from `local` once, at add time.
    #[must_use]
    pub fn immutable(local: impl Into<PathBuf>) -> Self {
        Self::new(false).with_local(local)
    }

    /// Set the local source path.
    #[must_use]
    pub fn with_local(mut self, local: impl Into<PathBuf>) -> Self {
        self.local = Some(local.into());
        self
    }

    /// Set the storage key, e.g. for an artifact already in the blob store.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Whether checkpoints may overwrite this artifact.
    #[must_use]
    pub const fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Local source path, if any.
    #[must_use]
    pub fn local(&self) -> Option<&Path> {
        self.local.as_deref()
    }

    /// Storage key, once resolved.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Fully resolved location derived from the key.
    #[must_use]
    pub fn qualified(&self) -> Option<&str> {
        self.qualified.as_deref()
    }

    /// Bucket the artifact is stored in.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    /// Whether a checkpoint uploads this artifact.
    #[must_use]
    pub const fn is_checkpointed(&self) -> bool {
        self.mutable && self.local.is_some()
    }

    pub(crate) fn set_key(&mut self, key: String) {
        self.key = Some(key);
    }

    pub(crate) fn set_location(&mut self, qualified: Option<String>, bucket: String) {
        self.qualified = qualified;
        self.bucket = Some(bucket);
    }
}
