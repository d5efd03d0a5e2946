//! # strata-scheduler
//!
//! View materialization scheduler for the Strata warehouse.
//!
//! The warehouse is a directed acyclic graph of *views*: logical tables
//! produced by a *transformation* over zero or more upstream views. This
//! crate brings views into a materialized state on demand:
//!
//! - **One coordinator per view**: a single-threaded task owning that
//!   view's state machine, created lazily and addressed by content hash
//! - **Recursive materialization**: a request to a root view fans out to
//!   its dependencies and folds their answers back in
//! - **Freshness decisions**: a view retransforms only when an upstream is
//!   newer or its version digest drifted
//! - **Retry with exponential backoff**: transient transformation failures
//!   retry up to a configurable budget
//! - **Partial-failure propagation**: `incomplete` and `with_errors` flags
//!   travel downstream with every answer
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use strata_core::{MemoryStore, WarehouseStore};
//! use strata_scheduler::config::SchedulerConfig;
//! use strata_scheduler::manager::ViewManager;
//! use strata_scheduler::runner::{StoreActionRunner, SucceedingDriver, TransformationDriver};
//! use strata_scheduler::schema::InMemorySchemaService;
//! use strata_scheduler::view::{Transformation, ViewSpec};
//!
//! # async fn example() -> strata_scheduler::error::Result<()> {
//! let config = SchedulerConfig::default();
//! let store: Arc<dyn WarehouseStore> = Arc::new(MemoryStore::new());
//! let driver: Arc<dyn TransformationDriver> = Arc::new(SucceedingDriver::new());
//! let runner = Arc::new(StoreActionRunner::new(
//!     Arc::clone(&store),
//!     driver,
//!     config.user_identity.clone(),
//! ));
//! let schema = Arc::new(InMemorySchemaService::new());
//! let manager = ViewManager::new(runner, schema, store, config);
//!
//! let raw = Arc::new(ViewSpec::new("raw.events", "(id int)", "/warehouse/raw/events"));
//! let stage = Arc::new(
//!     ViewSpec::new("stage.events", "(id int)", "/warehouse/stage/events")
//!         .with_transformation(Transformation::compute("sql", "select * from raw.events"))
//!         .with_dependency(raw),
//! );
//!
//! let outcome = manager.materialize(&stage).await?;
//! println!("{}", outcome.as_label());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod graph;
pub mod manager;
pub mod messages;
pub mod metrics;
pub mod runner;
pub mod schema;
pub mod view;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{SchedulerConfig, UserIdentity};
    pub use crate::coordinator::Phase;
    pub use crate::error::{Error, Result};
    pub use crate::manager::{CoordinatorHandle, ViewManager};
    pub use crate::messages::{Message, Outcome, Reply, StatusReport};
    pub use crate::metrics::SchedulerMetrics;
    pub use crate::runner::{ActionResult, ActionRunner, StoreActionRunner, TransformationDriver};
    pub use crate::schema::{InMemorySchemaService, SchemaService, VersionCheck};
    pub use crate::view::{FilesystemOp, StorageFormat, Transformation, ViewSpec};
}
