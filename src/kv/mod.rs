//! Hierarchical keyed store
//!
//! The registry persists every record as JSON at a slash-separated path,
//! Firebase style:
//! - `set` on a path replaces the whole subtree below it
//! - `get` on an interior path reassembles the subtree as a JSON object
//! - `get_shallow` lists one level of children only
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use trueno_registry::kv::{KeyedStore, MemoryKeyedStore};
//!
//! # async fn example() -> trueno_registry::Result<()> {
//! let store = MemoryKeyedStore::new();
//!
//! store.set("experiments/exp-1", json!({"status": "waiting"})).await?;
//! store.set("experiments/exp-1/status", json!("running")).await?;
//!
//! let record = store.get("experiments/exp-1").await?;
//! assert_eq!(record, Some(json!({"status": "running"})));
//!
//! store.delete("experiments/exp-1").await?;
//! assert!(store.get("experiments").await?.is_none());
//! # Ok(())
//! # }
//! ```

mod memory;

pub use memory::MemoryKeyedStore;

use crate::Result;
use serde_json::Value;
use std::future::Future;

/// Path-addressed JSON store consumed by the registry.
///
/// Implementations own their transport and session handling; the
/// registry relies only on per-path write atomicity. No operation spans
/// several paths transactionally.
pub trait KeyedStore: Send + Sync {
    /// Get the value or subtree at `path`.
    ///
    /// Returns `None` if nothing is stored at or below the path.
    fn get(&self, path: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Get one level below `path`.
    ///
    /// Interior children map to `true`, leaf children to their value.
    fn get_shallow(&self, path: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Replace the value or subtree at `path`.
    fn set(&self, path: &str, value: Value) -> impl Future<Output = Result<()>> + Send;

    /// Delete the value or subtree at `path`.
    ///
    /// No-op if nothing is stored there.
    fn delete(&self, path: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Canonical form of a store path: no leading, trailing or doubled slashes.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join path segments, normalizing the result.
#[must_use]
pub fn join_path(segments: &[&str]) -> String {
    normalize_path(&segments.join("/"))
}
