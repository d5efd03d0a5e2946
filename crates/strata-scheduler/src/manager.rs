//! Registry of view coordinators.
//!
//! The [`ViewManager`] is the sole arbiter of coordinator identity: exactly
//! one coordinator exists per [`ViewId`], created lazily on first reference
//! and kept for the process lifetime. Coordinators hold a manager handle and
//! look up their dependencies' current addresses on demand, which is how the
//! mutually-recursive references in the view graph resolve without cycles in
//! ownership.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use strata_core::{RequestId, ViewId, WarehouseStore};

use crate::config::SchedulerConfig;
use crate::coordinator;
use crate::error::{Error, Result};
use crate::graph;
use crate::messages::{Message, Outcome, Reply, StatusReport};
use crate::metrics::SchedulerMetrics;
use crate::runner::ActionRunner;
use crate::schema::SchemaService;
use crate::view::ViewSpec;

/// Address of one view's coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    view: ViewId,
    mailbox: mpsc::UnboundedSender<Message>,
}

impl CoordinatorHandle {
    /// Returns the view this coordinator serves.
    #[must_use]
    pub const fn view(&self) -> ViewId {
        self.view
    }

    /// Posts a message to the coordinator's mailbox.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CoordinatorUnavailable`] if the coordinator task has
    /// terminated.
    pub fn send(&self, message: Message) -> Result<()> {
        self.mailbox
            .send(message)
            .map_err(|_| Error::CoordinatorUnavailable {
                view: self.view.to_string(),
            })
    }
}

struct ManagerInner {
    coordinators: RwLock<HashMap<ViewId, CoordinatorHandle>>,
    /// Roots whose reachable graph has passed validation.
    validated: RwLock<HashSet<ViewId>>,
    runner: Arc<dyn ActionRunner>,
    schema: Arc<dyn SchemaService>,
    store: Arc<dyn WarehouseStore>,
    config: SchedulerConfig,
    metrics: SchedulerMetrics,
}

/// Thread-safe registry mapping view identity to its coordinator.
///
/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct ViewManager {
    inner: Arc<ManagerInner>,
}

impl ViewManager {
    /// Creates a manager over the given collaborators.
    #[must_use]
    pub fn new(
        runner: Arc<dyn ActionRunner>,
        schema: Arc<dyn SchemaService>,
        store: Arc<dyn WarehouseStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                coordinators: RwLock::new(HashMap::new()),
                validated: RwLock::new(HashSet::new()),
                runner,
                schema,
                store,
                config,
                metrics: SchedulerMetrics::new(),
            }),
        }
    }

    pub(crate) fn runner(&self) -> Arc<dyn ActionRunner> {
        Arc::clone(&self.inner.runner)
    }

    pub(crate) fn schema(&self) -> Arc<dyn SchemaService> {
        Arc::clone(&self.inner.schema)
    }

    pub(crate) fn store(&self) -> Arc<dyn WarehouseStore> {
        Arc::clone(&self.inner.store)
    }

    pub(crate) fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub(crate) fn metrics(&self) -> &SchedulerMetrics {
        &self.inner.metrics
    }

    /// Returns the coordinator for a view, creating it atomically on first
    /// reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn coordinator_for(&self, view: &Arc<ViewSpec>) -> Result<CoordinatorHandle> {
        let id = view.id();
        {
            let coordinators = self.read_registry()?;
            if let Some(handle) = coordinators.get(&id) {
                return Ok(handle.clone());
            }
        }

        let mut coordinators = self.write_registry()?;
        if let Some(handle) = coordinators.get(&id) {
            return Ok(handle.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = CoordinatorHandle {
            view: id,
            mailbox: tx.clone(),
        };
        coordinators.insert(id, handle.clone());
        let count = coordinators.len();
        drop(coordinators);

        debug!(view = %view.name, id = %id.short(), "coordinator created");
        self.inner.metrics.set_coordinators(count);
        coordinator::spawn(Arc::clone(view), self.clone(), tx, rx);
        Ok(handle)
    }

    /// Brings a view up to date, recursively materializing its
    /// dependencies, and returns the outcome.
    ///
    /// The first reference to a root validates the reachable dependency
    /// graph (acyclicity, disjoint storage paths).
    ///
    /// # Errors
    ///
    /// Returns an error if the graph is invalid or the coordinator cannot
    /// be reached.
    pub async fn materialize(&self, view: &Arc<ViewSpec>) -> Result<Outcome> {
        self.ensure_validated(view)?;
        let handle = self.coordinator_for(view)?;
        let request = RequestId::generate();
        let (tx, rx) = oneshot::channel();
        handle.send(Message::Materialize {
            request,
            reply: Reply::Client(tx),
        })?;
        rx.await.map_err(|_| Error::RequestDropped {
            view: view.name.clone(),
        })
    }

    /// Drops a view's memoized materialized state; the next `Materialize`
    /// re-evaluates from scratch.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator cannot be reached.
    pub fn invalidate(&self, view: &Arc<ViewSpec>) -> Result<()> {
        self.coordinator_for(view)?.send(Message::Invalidate)
    }

    /// Notifies every coordinator that `view` has newer data; coordinators
    /// filter by whether it is one of their upstreams.
    pub fn broadcast_new_data(&self, view: ViewId) {
        let handles: Vec<CoordinatorHandle> = match self.read_registry() {
            Ok(coordinators) => coordinators.values().cloned().collect(),
            Err(_) => return,
        };
        debug!(view = %view.short(), fanout = handles.len(), "broadcasting new data");
        for handle in handles {
            // A stopped coordinator just misses the notification.
            let _ = handle.send(Message::NewDataAvailable { view });
        }
    }

    /// Returns a diagnostic snapshot of a view's coordinator.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinator cannot be reached or does not
    /// answer within the dependency timeout.
    pub async fn status(&self, view: &Arc<ViewSpec>) -> Result<StatusReport> {
        let handle = self.coordinator_for(view)?;
        let (tx, rx) = oneshot::channel();
        handle.send(Message::GetStatus { reply: tx })?;
        match tokio::time::timeout(self.inner.config.dependency_timeout, rx).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(_)) => Err(Error::RequestDropped {
                view: view.name.clone(),
            }),
            Err(_) => Err(strata_core::Error::timeout("get_status", "coordinator did not answer").into()),
        }
    }

    /// Returns the number of live coordinators.
    #[must_use]
    pub fn coordinator_count(&self) -> usize {
        self.read_registry().map_or(0, |coordinators| coordinators.len())
    }

    fn ensure_validated(&self, view: &Arc<ViewSpec>) -> Result<()> {
        let id = view.id();
        {
            let validated = self.inner.validated.read().map_err(poisoned)?;
            if validated.contains(&id) {
                return Ok(());
            }
        }
        graph::validate(view)?;
        self.inner.validated.write().map_err(poisoned)?.insert(id);
        Ok(())
    }

    fn read_registry(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<ViewId, CoordinatorHandle>>> {
        self.inner.coordinators.read().map_err(poisoned)
    }

    fn write_registry(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<ViewId, CoordinatorHandle>>> {
        self.inner.coordinators.write().map_err(poisoned)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> Error {
    Error::Core(strata_core::Error::Internal {
        message: "coordinator registry lock poisoned".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{StoreActionRunner, SucceedingDriver, TransformationDriver};
    use crate::schema::InMemorySchemaService;
    use strata_core::MemoryStore;

    fn manager() -> ViewManager {
        let config = SchedulerConfig::default();
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let driver: Arc<dyn TransformationDriver> = Arc::new(SucceedingDriver::new());
        let runner = Arc::new(StoreActionRunner::new(
            Arc::clone(&store) as Arc<dyn WarehouseStore>,
            driver,
            config.user_identity.clone(),
        ));
        ViewManager::new(runner, Arc::new(InMemorySchemaService::new()), store, config)
    }

    fn leaf(name: &str, path: &str) -> Arc<ViewSpec> {
        Arc::new(ViewSpec::new(name, "(id int)", path))
    }

    #[tokio::test]
    async fn one_coordinator_per_identity() -> Result<()> {
        let manager = manager();
        let view = leaf("raw.events", "/warehouse/raw/events");

        let first = manager.coordinator_for(&view)?;
        let second = manager.coordinator_for(&view)?;
        assert_eq!(first.view(), second.view());
        assert_eq!(manager.coordinator_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn same_descriptor_different_identity_gets_own_coordinator() -> Result<()> {
        let manager = manager();
        let a = leaf("raw.a", "/warehouse/raw/a");
        let b = leaf("raw.b", "/warehouse/raw/b");

        manager.coordinator_for(&a)?;
        manager.coordinator_for(&b)?;
        assert_eq!(manager.coordinator_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn status_creates_lazily_and_reports_initial() -> Result<()> {
        let manager = manager();
        let view = leaf("raw.events", "/warehouse/raw/events");

        let report = manager.status(&view).await?;
        assert_eq!(report.state, "initial");
        assert_eq!(report.waiters, 0);
        assert_eq!(report.pending_dependencies, 0);
        assert_eq!(report.view, view.id());
        Ok(())
    }

    #[tokio::test]
    async fn materialize_rejects_overlapping_paths() {
        let manager = manager();
        let dep = Arc::new(ViewSpec::new("raw.a", "(x int)", "/warehouse/shared"));
        let root = Arc::new(
            ViewSpec::new("stage.b", "(y bigint)", "/warehouse/shared").with_dependency(dep),
        );

        let err = manager.materialize(&root).await.unwrap_err();
        assert!(matches!(err, Error::PathOverlap { .. }));
    }
}
