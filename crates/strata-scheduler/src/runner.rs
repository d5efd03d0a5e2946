//! Action runner contract and implementations.
//!
//! The action runner executes transformations and filesystem side-effects
//! on behalf of coordinators. Transformation execution is asynchronous from
//! the coordinator's point of view: the coordinator submits and keeps
//! processing its mailbox while a spawned task awaits the verdict. The
//! filesystem operations (`touch`, `delete`) are request/reply and bounded
//! by `file_action_timeout` at the call site.
//!
//! Every submission yields exactly one terminal [`ActionResult`]; runner
//! implementations must not hang forever or drop a submission silently.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use strata_core::{Error, Result, WarehouseStore};

use crate::config::UserIdentity;
use crate::view::{FilesystemOp, Transformation, ViewSpec};

/// Terminal verdict of one transformation submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    /// The transformation produced the view's data.
    Success,
    /// The transformation failed; the coordinator will retry with backoff.
    Failure {
        /// Description of the failure, for logs.
        message: String,
    },
}

impl ActionResult {
    /// Creates a failure verdict.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    /// Returns true for [`ActionResult::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns a lowercase label suitable for metrics.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure { .. } => "failure",
        }
    }
}

/// Contract with the action execution subsystem.
#[async_trait]
pub trait ActionRunner: Send + Sync + 'static {
    /// Executes the view's transformation and returns the terminal verdict.
    async fn run_transformation(
        &self,
        view: &ViewSpec,
        transformation: &Transformation,
    ) -> ActionResult;

    /// Creates a zero-byte object at `path`.
    async fn touch(&self, path: &str) -> Result<()>;

    /// Deletes `path`, or everything under it when `recursive`. Idempotent.
    async fn delete(&self, path: &str, recursive: bool) -> Result<()>;
}

/// Executes a compute transformation.
///
/// Compute engines (SQL, morphline, ...) live outside this workspace; the
/// scheduler only sees this seam.
#[async_trait]
pub trait TransformationDriver: Send + Sync + 'static {
    /// Runs the transformation's logic and reports the verdict.
    async fn execute(&self, view: &ViewSpec, engine: &str, definition: &str) -> ActionResult;
}

/// Production-shaped action runner over a [`WarehouseStore`].
///
/// Filesystem transformations are executed against the store directly;
/// compute transformations are delegated to the configured
/// [`TransformationDriver`].
pub struct StoreActionRunner {
    store: Arc<dyn WarehouseStore>,
    driver: Arc<dyn TransformationDriver>,
    /// Identity under which actions run; initialized at startup and passed
    /// explicitly, never read from ambient state.
    identity: UserIdentity,
}

impl StoreActionRunner {
    /// Creates a runner over the given store and compute driver, acting as
    /// `identity`.
    pub fn new(
        store: Arc<dyn WarehouseStore>,
        driver: Arc<dyn TransformationDriver>,
        identity: UserIdentity,
    ) -> Self {
        Self {
            store,
            driver,
            identity,
        }
    }

    async fn run_filesystem(&self, view: &ViewSpec, op: &FilesystemOp) -> ActionResult {
        let store = self.store.as_ref();
        let result: Result<()> = match op {
            FilesystemOp::CopyFrom { source } => {
                copy_objects(store, source, &view.full_path, false).await
            }
            FilesystemOp::StoreFrom { source } => {
                copy_objects(store, source, &view.full_path, true).await
            }
            FilesystemOp::Touch => store.put(&view.full_path, Bytes::new()).await,
        };
        match result {
            Ok(()) => ActionResult::Success,
            Err(e) => ActionResult::failure(e.to_string()),
        }
    }
}

/// Copies every object under `source` to the same relative key under
/// `target`, deleting the originals when `remove_source`.
async fn copy_objects(
    store: &dyn WarehouseStore,
    source: &str,
    target: &str,
    remove_source: bool,
) -> Result<()> {
    let source_prefix = source.trim_end_matches('/');
    let target_prefix = target.trim_end_matches('/');
    for path in store.list(source_prefix).await? {
        let relative = path
            .strip_prefix(source_prefix)
            .unwrap_or(&path)
            .trim_start_matches('/');
        // The store contract has no server-side copy; a zero-byte marker of
        // the original key is sufficient for scheduling semantics.
        store
            .put(&format!("{target_prefix}/{relative}"), Bytes::new())
            .await?;
        if remove_source {
            store.delete(&path, false).await?;
        }
    }
    Ok(())
}

#[async_trait]
impl ActionRunner for StoreActionRunner {
    async fn run_transformation(
        &self,
        view: &ViewSpec,
        transformation: &Transformation,
    ) -> ActionResult {
        tracing::debug!(
            view = %view.name,
            user = %self.identity,
            transformation = transformation.name(),
            "executing transformation"
        );
        match transformation {
            // NoOp views never submit; answered here for contract totality.
            Transformation::NoOp => ActionResult::Success,
            Transformation::Filesystem(op) => self.run_filesystem(view, op).await,
            Transformation::Compute {
                engine, definition, ..
            } => self.driver.execute(view, engine, definition).await,
        }
    }

    async fn touch(&self, path: &str) -> Result<()> {
        self.store.put(path, Bytes::new()).await
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<()> {
        self.store.delete(path, recursive).await
    }
}

/// A driver that always succeeds, counting executions.
#[derive(Debug, Default)]
pub struct SucceedingDriver {
    executions: AtomicUsize,
}

impl SucceedingDriver {
    /// Creates a new succeeding driver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many transformations were executed.
    #[must_use]
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransformationDriver for SucceedingDriver {
    async fn execute(&self, _view: &ViewSpec, _engine: &str, _definition: &str) -> ActionResult {
        self.executions.fetch_add(1, Ordering::SeqCst);
        ActionResult::Success
    }
}

/// A driver that always fails with a configurable message.
#[derive(Debug)]
pub struct FailingDriver {
    message: String,
    executions: AtomicUsize,
}

impl FailingDriver {
    /// Creates a new failing driver.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            executions: AtomicUsize::new(0),
        }
    }

    /// Returns how many transformations were executed.
    #[must_use]
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransformationDriver for FailingDriver {
    async fn execute(&self, _view: &ViewSpec, _engine: &str, _definition: &str) -> ActionResult {
        self.executions.fetch_add(1, Ordering::SeqCst);
        ActionResult::failure(self.message.clone())
    }
}

/// A driver that replays a script of verdicts, then succeeds.
///
/// Used for retry scenarios: load it with `[Failure, Failure]` and the
/// third attempt succeeds.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    script: Mutex<VecDeque<ActionResult>>,
    executions: AtomicUsize,
}

impl ScriptedDriver {
    /// Creates a driver that replays `verdicts` in order.
    #[must_use]
    pub fn new(verdicts: impl IntoIterator<Item = ActionResult>) -> Self {
        Self {
            script: Mutex::new(verdicts.into_iter().collect()),
            executions: AtomicUsize::new(0),
        }
    }

    /// Returns how many transformations were executed.
    #[must_use]
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransformationDriver for ScriptedDriver {
    async fn execute(&self, _view: &ViewSpec, _engine: &str, _definition: &str) -> ActionResult {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());
        scripted.unwrap_or(ActionResult::Success)
    }
}

/// Converts a scheduler-side failure into an action verdict.
impl From<Error> for ActionResult {
    fn from(err: Error) -> Self {
        Self::failure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::MemoryStore;

    fn runner_over(store: Arc<MemoryStore>, driver: Arc<dyn TransformationDriver>) -> StoreActionRunner {
        StoreActionRunner::new(
            store as Arc<dyn WarehouseStore>,
            driver,
            UserIdentity::default(),
        )
    }

    #[tokio::test]
    async fn touch_and_delete_roundtrip() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let runner = runner_over(Arc::clone(&store), Arc::new(SucceedingDriver::new()));

        runner.touch("/warehouse/a/_SUCCESS").await?;
        assert!(store.exists("/warehouse/a/_SUCCESS").await?);

        runner.delete("/warehouse/a/_SUCCESS", false).await?;
        assert!(!store.exists("/warehouse/a/_SUCCESS").await?);
        Ok(())
    }

    #[tokio::test]
    async fn compute_delegates_to_driver() {
        let store = Arc::new(MemoryStore::new());
        let driver = Arc::new(ScriptedDriver::new([ActionResult::failure("boom")]));
        let runner = runner_over(store, Arc::clone(&driver) as Arc<dyn TransformationDriver>);

        let view = ViewSpec::new("stage.events", "(id int)", "/warehouse/stage/events")
            .with_transformation(Transformation::compute("sql", "select 1"));

        let first = runner
            .run_transformation(&view, &view.transformation)
            .await;
        assert_eq!(first, ActionResult::failure("boom"));

        let second = runner
            .run_transformation(&view, &view.transformation)
            .await;
        assert!(second.is_success());
        assert_eq!(driver.executions(), 2);
    }

    #[tokio::test]
    async fn store_from_moves_objects() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        store.put("/landing/events/part-0", Bytes::new()).await?;

        let runner = runner_over(Arc::clone(&store), Arc::new(SucceedingDriver::new()));
        let view = ViewSpec::new("raw.events", "(id int)", "/warehouse/raw/events")
            .with_transformation(Transformation::Filesystem(FilesystemOp::StoreFrom {
                source: "/landing/events".into(),
            }));

        let verdict = runner
            .run_transformation(&view, &view.transformation)
            .await;
        assert!(verdict.is_success());
        assert!(store.exists("/warehouse/raw/events/part-0").await?);
        assert!(!store.exists("/landing/events/part-0").await?);
        Ok(())
    }

    #[tokio::test]
    async fn failing_driver_reports_message() {
        let store = Arc::new(MemoryStore::new());
        let driver = Arc::new(FailingDriver::new("quota exceeded"));
        let runner = runner_over(store, Arc::clone(&driver) as Arc<dyn TransformationDriver>);

        let view = ViewSpec::new("stage.events", "(id int)", "/warehouse/stage/events")
            .with_transformation(Transformation::compute("sql", "select 1"));

        match runner.run_transformation(&view, &view.transformation).await {
            ActionResult::Failure { message } => assert_eq!(message, "quota exceeded"),
            ActionResult::Success => panic!("expected failure"),
        }
        assert_eq!(driver.executions(), 1);
    }
}
