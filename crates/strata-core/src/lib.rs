//! # strata-core
//!
//! Core abstractions for the Strata warehouse materialization scheduler.
//!
//! This crate provides the foundational types shared across all Strata
//! components:
//!
//! - **Identifiers**: Strongly-typed ids for views and requests
//! - **Storage Contract**: The warehouse filesystem interface and the
//!   success-marker convention
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Structured logging initialization and span helpers
//!
//! ## Crate Boundary
//!
//! `strata-core` is the **only** crate allowed to define shared primitives.
//! Scheduler logic lives in `strata-scheduler`; transformation executors and
//! metastore implementations live outside this workspace entirely.
//!
//! ## Example
//!
//! ```rust
//! use strata_core::prelude::*;
//!
//! let id = ViewId::derive("schema: (id int, ts bigint)", "/warehouse/events/day=1");
//! assert!(id.to_string().starts_with("v_"));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod observability;
pub mod storage;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use strata_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{RequestId, ViewId};
    pub use crate::storage::{success_marker_path, MemoryStore, WarehouseStore};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use id::{RequestId, ViewId};
pub use observability::{init_logging, LogFormat};
pub use storage::{success_marker_path, MemoryStore, WarehouseStore};
