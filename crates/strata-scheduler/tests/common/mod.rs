//! Shared harness for scheduler integration tests.

// Each integration test binary uses a different slice of this module.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use strata_core::{success_marker_path, MemoryStore, ViewId, WarehouseStore};
use strata_scheduler::config::SchedulerConfig;
use strata_scheduler::manager::ViewManager;
use strata_scheduler::runner::{
    ActionResult, StoreActionRunner, SucceedingDriver, TransformationDriver,
};
use strata_scheduler::schema::InMemorySchemaService;
use strata_scheduler::view::{Transformation, ViewSpec};

/// Store decorator that counts existence checks, for asserting that
/// memoized answers skip filesystem I/O.
#[derive(Debug, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    exists_calls: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WarehouseStore for CountingStore {
    async fn put(&self, path: &str, data: Bytes) -> strata_core::Result<()> {
        self.inner.put(path, data).await
    }

    async fn delete(&self, path: &str, recursive: bool) -> strata_core::Result<()> {
        self.inner.delete(path, recursive).await
    }

    async fn exists(&self, path: &str) -> strata_core::Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(path).await
    }

    async fn list(&self, prefix: &str) -> strata_core::Result<Vec<String>> {
        self.inner.list(prefix).await
    }
}

/// Compute driver that routes per view, with per-view execution counts.
///
/// Unrouted views succeed.
#[derive(Default)]
pub struct PerViewDriver {
    routes: Mutex<HashMap<ViewId, Arc<dyn TransformationDriver>>>,
    executions: Mutex<HashMap<ViewId, usize>>,
    fallback: SucceedingDriver,
}

impl PerViewDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes a view's transformations to the given driver.
    pub fn route(&self, view: ViewId, driver: Arc<dyn TransformationDriver>) {
        self.routes
            .lock()
            .expect("driver routes lock")
            .insert(view, driver);
    }

    /// Returns how many times a view's transformation was executed.
    pub fn executions(&self, view: ViewId) -> usize {
        self.executions
            .lock()
            .expect("driver executions lock")
            .get(&view)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl TransformationDriver for PerViewDriver {
    async fn execute(&self, view: &ViewSpec, engine: &str, definition: &str) -> ActionResult {
        *self
            .executions
            .lock()
            .expect("driver executions lock")
            .entry(view.id())
            .or_insert(0) += 1;
        let routed = self
            .routes
            .lock()
            .expect("driver routes lock")
            .get(&view.id())
            .cloned();
        match routed {
            Some(driver) => driver.execute(view, engine, definition).await,
            None => self.fallback.execute(view, engine, definition).await,
        }
    }
}

/// Compute driver that sleeps before succeeding, for tests that need an
/// in-flight transformation to pile waiters on.
pub struct SleepingDriver {
    delay: std::time::Duration,
}

impl SleepingDriver {
    pub fn new(delay: std::time::Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl TransformationDriver for SleepingDriver {
    async fn execute(&self, _view: &ViewSpec, _engine: &str, _definition: &str) -> ActionResult {
        tokio::time::sleep(self.delay).await;
        ActionResult::Success
    }
}

/// One warehouse under test: store, schema, driver, and manager wired the
/// way an embedding process would.
pub struct TestWarehouse {
    pub store: Arc<CountingStore>,
    pub schema: Arc<InMemorySchemaService>,
    pub driver: Arc<PerViewDriver>,
    pub manager: ViewManager,
}

impl TestWarehouse {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        let store = Arc::new(CountingStore::new());
        let schema = Arc::new(InMemorySchemaService::new());
        let driver = Arc::new(PerViewDriver::new());
        let runner = Arc::new(StoreActionRunner::new(
            Arc::clone(&store) as Arc<dyn WarehouseStore>,
            Arc::clone(&driver) as Arc<dyn TransformationDriver>,
            config.user_identity.clone(),
        ));
        let manager = ViewManager::new(
            runner,
            Arc::clone(&schema) as Arc<dyn strata_scheduler::schema::SchemaService>,
            Arc::clone(&store) as Arc<dyn WarehouseStore>,
            config,
        );
        Self {
            store,
            schema,
            driver,
            manager,
        }
    }

    /// Places a `_SUCCESS` marker under the view's path, as if a previous
    /// process had completed its data.
    pub async fn place_marker(&self, view: &ViewSpec) {
        self.store
            .put(&success_marker_path(&view.full_path), Bytes::new())
            .await
            .expect("place marker");
    }

    pub async fn marker_exists(&self, view: &ViewSpec) -> bool {
        self.store
            .exists(&success_marker_path(&view.full_path))
            .await
            .expect("marker check")
    }
}

/// An externally-loaded view: no transformation, data signaled by marker.
pub fn noop_view(name: &str, path: &str) -> Arc<ViewSpec> {
    Arc::new(ViewSpec::new(name, "(id int, ts bigint)", path))
}

/// A computed view over the given dependencies.
pub fn compute_view(name: &str, path: &str, deps: &[&Arc<ViewSpec>]) -> Arc<ViewSpec> {
    let mut spec = ViewSpec::new(name, "(id int, ts bigint)", path)
        .with_transformation(Transformation::compute("sql", format!("rebuild {name}")));
    for dep in deps {
        spec = spec.with_dependency(Arc::clone(dep));
    }
    Arc::new(spec)
}

/// Polls until `probe` returns true or ~5 s of (possibly auto-advanced)
/// time passes.
pub async fn eventually(mut probe: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if probe() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    probe()
}
