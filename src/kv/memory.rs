//! In-memory keyed store using `DashMap`.
//!
//! Only leaves are stored, keyed by their full normalized path; subtrees
//! are reassembled on read. Data is lost on process restart.

use super::{normalize_path, KeyedStore};
use crate::Result;
use dashmap::DashMap;
use serde_json::{Map, Value};

/// In-memory hierarchical store.
///
/// Each leaf write is atomic. A `set` of an object touches several
/// leaves and is not atomic with respect to concurrent readers of the
/// same subtree.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use trueno_registry::kv::{KeyedStore, MemoryKeyedStore};
///
/// # async fn example() -> trueno_registry::Result<()> {
/// let store = MemoryKeyedStore::new();
/// store.set("projects/vision/e1/owner", json!("alice")).await?;
/// assert_eq!(
///     store.get("projects/vision").await?,
///     Some(json!({"e1": {"owner": "alice"}}))
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryKeyedStore {
    leaves: DashMap<String, Value>,
}

impl MemoryKeyedStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            leaves: DashMap::new(),
        }
    }

    /// Number of stored leaves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.leaves.clear();
    }

    fn remove_subtree(&self, path: &str) {
        if path.is_empty() {
            self.leaves.clear();
            return;
        }
        let prefix = format!("{path}/");
        self.leaves
            .retain(|key, _| key != path && !key.starts_with(&prefix));
    }

    fn remove_ancestor_leaves(&self, path: &str) {
        let mut end = 0;
        while let Some(offset) = path[end..].find('/') {
            end += offset;
            self.leaves.remove(&path[..end]);
            end += 1;
        }
    }

    fn insert_flattened(&self, path: String, value: Value) {
        match value {
            Value::Null => {}
            Value::Object(map) => {
                for (child, child_value) in map {
                    let child_path = if path.is_empty() {
                        normalize_path(&child)
                    } else {
                        format!("{path}/{}", normalize_path(&child))
                    };
                    self.insert_flattened(child_path, child_value);
                }
            }
            leaf => {
                self.leaves.insert(path, leaf);
            }
        }
    }

    /// Leaves strictly below `path`, as (relative path, value).
    fn collect_below(&self, path: &str) -> Vec<(String, Value)> {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        self.leaves
            .iter()
            .filter_map(|entry| {
                entry
                    .key()
                    .strip_prefix(&prefix)
                    .map(|rel| (rel.to_string(), entry.value().clone()))
            })
            .collect()
    }
}

impl Default for MemoryKeyedStore {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_nested(root: &mut Map<String, Value>, relative: &str, value: Value) {
    match relative.split_once('/') {
        None => {
            root.insert(relative.to_string(), value);
        }
        Some((head, rest)) => {
            let child = root
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child_map) = child {
                insert_nested(child_map, rest, value);
            }
        }
    }
}

impl KeyedStore for MemoryKeyedStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let path = normalize_path(path);
        if let Some(leaf) = self.leaves.get(&path) {
            return Ok(Some(leaf.value().clone()));
        }

        let below = self.collect_below(&path);
        if below.is_empty() {
            return Ok(None);
        }
        let mut root = Map::new();
        for (relative, value) in below {
            insert_nested(&mut root, &relative, value);
        }
        Ok(Some(Value::Object(root)))
    }

    async fn get_shallow(&self, path: &str) -> Result<Option<Value>> {
        let path = normalize_path(path);
        if let Some(leaf) = self.leaves.get(&path) {
            return Ok(Some(leaf.value().clone()));
        }

        let below = self.collect_below(&path);
        if below.is_empty() {
            return Ok(None);
        }
        let mut children = Map::new();
        for (relative, value) in below {
            match relative.split_once('/') {
                Some((child, _)) => {
                    children.insert(child.to_string(), Value::Bool(true));
                }
                None => {
                    children.insert(relative, value);
                }
            }
        }
        Ok(Some(Value::Object(children)))
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        let path = normalize_path(path);
        self.remove_subtree(&path);
        self.remove_ancestor_leaves(&path);
        self.insert_flattened(path, value);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.remove_subtree(&normalize_path(path));
        Ok(())
    }
}
