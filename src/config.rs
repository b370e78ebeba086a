//! Registry configuration
//!
//! Loaded from JSON; every field has a default so an empty object `{}`
//! is a valid configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default cap on keys validated per listing
pub const DEFAULT_MAX_KEYS: usize = 100;

/// Default bucket name for artifact blobs
pub const DEFAULT_BUCKET: &str = "trueno-artifacts";

/// Configuration for [`crate::registry::ExperimentRegistry`] and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Keys validated per listing; `0` disables the cap
    pub max_keys: usize,
    /// Force the guest identity regardless of the principal
    pub guest: bool,
    /// Bucket attached to every artifact
    pub bucket: String,
    /// Concurrent validation tasks
    pub worker_pool_size: usize,
    /// Concurrent checkpoint uploads
    pub upload_concurrency: usize,
    /// Reject mutations from callers that fail `can_write`
    pub enforce_ownership: bool,
    /// Default `EnvFilter` directive used by [`crate::telemetry::init_tracing_from`]
    pub log_filter: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_keys: DEFAULT_MAX_KEYS,
            guest: false,
            bucket: DEFAULT_BUCKET.to_string(),
            worker_pool_size: 8,
            upload_concurrency: 4,
            enforce_ownership: false,
            log_filter: "info".to_string(),
        }
    }
}

impl RegistryConfig {
    /// Parse a configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the document is malformed or fails
    /// [`RegistryConfig::validate`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a pool size is zero or the bucket is empty.
    pub fn validate(&self) -> Result<()> {
        if self.worker_pool_size == 0 {
            return Err(Error::Config("worker_pool_size must be positive".into()));
        }
        if self.upload_concurrency == 0 {
            return Err(Error::Config("upload_concurrency must be positive".into()));
        }
        if self.bucket.is_empty() {
            return Err(Error::Config("bucket must not be empty".into()));
        }
        Ok(())
    }

    /// Set `max_keys`.
    #[must_use]
    pub const fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    /// Set `enforce_ownership`.
    #[must_use]
    pub const fn with_enforce_ownership(mut self, enforce: bool) -> Self {
        self.enforce_ownership = enforce;
        self
    }

    /// Set `guest`.
    #[must_use]
    pub const fn with_guest(mut self, guest: bool) -> Self {
        self.guest = guest;
        self
    }
}
