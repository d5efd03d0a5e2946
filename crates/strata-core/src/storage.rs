//! Warehouse filesystem abstraction.
//!
//! The scheduler never talks to the cluster filesystem directly; it goes
//! through [`WarehouseStore`], which models the small set of operations the
//! materialization protocol needs: writing and deleting objects, existence
//! checks, and prefix listing. Production deployments back this with a
//! distributed filesystem client running under the configured user identity;
//! tests use [`MemoryStore`].
//!
//! ## Success markers
//!
//! A zero-byte `_SUCCESS` object under a view's storage path signals that
//! the data there is complete. [`success_marker_path`] builds the marker path
//! for a view path; creation and deletion of markers go through the action
//! runner so that per-view writes stay serialized.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Error, Result};

/// Name of the completeness marker object under a view's path.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Returns the success-marker path for a view storage path.
///
/// # Example
///
/// ```rust
/// use strata_core::storage::success_marker_path;
///
/// assert_eq!(
///     success_marker_path("/warehouse/events/day=1"),
///     "/warehouse/events/day=1/_SUCCESS"
/// );
/// ```
#[must_use]
pub fn success_marker_path(full_path: &str) -> String {
    let trimmed = full_path.trim_end_matches('/');
    format!("{trimmed}/{SUCCESS_MARKER}")
}

/// Storage contract for the warehouse filesystem.
///
/// Semantics follow object storage: paths are flat keys, deletes are
/// idempotent, and a recursive delete removes every object under a prefix.
#[async_trait]
pub trait WarehouseStore: Send + Sync + 'static {
    /// Writes an object, replacing any existing content.
    async fn put(&self, path: &str, data: Bytes) -> Result<()>;

    /// Deletes an object, or everything under `path` when `recursive`.
    ///
    /// Succeeds even if nothing exists at `path` (idempotent).
    async fn delete(&self, path: &str, recursive: bool) -> Result<()>;

    /// Returns true if an object exists at exactly `path`.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Lists object paths with the given prefix.
    ///
    /// Returns an empty vec if nothing matches. Ordering is unspecified;
    /// callers requiring deterministic order should sort.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// In-memory warehouse store for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    /// Creates a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored objects.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn object_count(&self) -> Result<usize> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "store lock poisoned".into(),
        })?;
        Ok(objects.len())
    }
}

#[async_trait]
impl WarehouseStore for MemoryStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "store lock poisoned".into(),
        })?;
        objects.insert(path.to_string(), data);
        Ok(())
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Error::Internal {
            message: "store lock poisoned".into(),
        })?;
        if recursive {
            let prefix = format!("{}/", path.trim_end_matches('/'));
            objects.retain(|key, _| key != path && !key.starts_with(&prefix));
        } else {
            objects.remove(path);
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "store lock poisoned".into(),
        })?;
        Ok(objects.contains_key(path))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "store lock poisoned".into(),
        })?;
        Ok(objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
