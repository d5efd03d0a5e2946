//! Schema/metadata service contract.
//!
//! The schema service owns all durable scheduler state: partition
//! registrations, view version digests, and transformation timestamps. The
//! scheduler itself is in-memory; after a restart, coordinators lazily
//! re-derive their freshness from these calls.
//!
//! Every call is request/reply and is bounded by the configured
//! `schema_action_timeout` at the call site; a timeout surfaces as
//! [`strata_core::Error::Timeout`], which coordinators treat as the
//! conservative worst case (for version checks, a mismatch).

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use strata_core::{Error, Result, ViewId};

use crate::view::ViewSpec;

/// Result of comparing a view's current version digest against the stored
/// one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    /// Stored version matches the view's current digest.
    Ok,
    /// Stored version differs (or was never recorded); the view must be
    /// retransformed.
    Mismatch {
        /// The digest on record; empty when none was ever stored.
        stored: String,
    },
}

impl VersionCheck {
    /// Returns true if the check demands retransformation.
    #[must_use]
    pub const fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }
}

/// Contract with the warehouse metadata store.
#[async_trait]
pub trait SchemaService: Send + Sync + 'static {
    /// Registers the view's partition in the metastore. Idempotent.
    async fn add_partition(&self, view: &ViewSpec) -> Result<()>;

    /// Writes the view's current version digest.
    async fn set_view_version(&self, view: &ViewSpec) -> Result<()>;

    /// Compares the view's current version digest against the stored one.
    async fn check_view_version(&self, view: &ViewSpec) -> Result<VersionCheck>;

    /// Records "transformed at now()" for the view.
    async fn log_transformation_timestamp(&self, view: &ViewSpec) -> Result<()>;

    /// Returns the last recorded transformation timestamp in milliseconds
    /// since epoch, or `0` if the view was never transformed.
    async fn get_transformation_timestamp(&self, view: &ViewSpec) -> Result<u64>;
}

#[derive(Debug, Default)]
struct SchemaState {
    partitions: HashSet<ViewId>,
    versions: HashMap<ViewId, String>,
    timestamps: HashMap<ViewId, u64>,
    add_partition_calls: HashMap<ViewId, usize>,
    set_version_calls: HashMap<ViewId, usize>,
}

/// In-memory schema service for testing.
///
/// Thread-safe via `RwLock`. Tracks per-view call counts so tests can
/// assert on registration traffic.
#[derive(Debug, Default)]
pub struct InMemorySchemaService {
    state: RwLock<SchemaState>,
}

impl InMemorySchemaService {
    /// Creates a new empty schema service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, SchemaState>> {
        self.state.read().map_err(|_| Error::Internal {
            message: "schema lock poisoned".into(),
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, SchemaState>> {
        self.state.write().map_err(|_| Error::Internal {
            message: "schema lock poisoned".into(),
        })
    }

    /// Presets a transformation timestamp, as if the view had been
    /// transformed at `ts_millis` in an earlier process lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn record_transformation_timestamp(&self, view: ViewId, ts_millis: u64) -> Result<()> {
        self.write()?.timestamps.insert(view, ts_millis);
        Ok(())
    }

    /// Returns how many times `add_partition` was called for the view.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn add_partition_calls(&self, view: ViewId) -> Result<usize> {
        Ok(self.read()?.add_partition_calls.get(&view).copied().unwrap_or(0))
    }

    /// Returns how many times `set_view_version` was called for the view.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn set_version_calls(&self, view: ViewId) -> Result<usize> {
        Ok(self.read()?.set_version_calls.get(&view).copied().unwrap_or(0))
    }

    /// Returns true if the view's partition has been registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn has_partition(&self, view: ViewId) -> Result<bool> {
        Ok(self.read()?.partitions.contains(&view))
    }
}

#[async_trait]
impl SchemaService for InMemorySchemaService {
    async fn add_partition(&self, view: &ViewSpec) -> Result<()> {
        let mut state = self.write()?;
        state.partitions.insert(view.id());
        *state.add_partition_calls.entry(view.id()).or_insert(0) += 1;
        Ok(())
    }

    async fn set_view_version(&self, view: &ViewSpec) -> Result<()> {
        let mut state = self.write()?;
        state.versions.insert(view.id(), view.version_digest());
        *state.set_version_calls.entry(view.id()).or_insert(0) += 1;
        Ok(())
    }

    async fn check_view_version(&self, view: &ViewSpec) -> Result<VersionCheck> {
        let state = self.read()?;
        Ok(match state.versions.get(&view.id()) {
            Some(stored) if *stored == view.version_digest() => VersionCheck::Ok,
            Some(stored) => VersionCheck::Mismatch {
                stored: stored.clone(),
            },
            None => VersionCheck::Mismatch {
                stored: String::new(),
            },
        })
    }

    async fn log_transformation_timestamp(&self, view: &ViewSpec) -> Result<()> {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        self.write()?.timestamps.insert(view.id(), now);
        Ok(())
    }

    async fn get_transformation_timestamp(&self, view: &ViewSpec) -> Result<u64> {
        Ok(self.read()?.timestamps.get(&view.id()).copied().unwrap_or(0))
    }
}
