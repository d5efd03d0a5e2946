//! Observability infrastructure for Strata.
//!
//! Structured logging with consistent spans. This module provides the
//! process-wide initialization helper and span constructors used across the
//! scheduler.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `strata_scheduler=debug`)
///
/// # Example
///
/// ```rust
/// use strata_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for per-view coordinator operations.
///
/// # Example
///
/// ```rust
/// use strata_core::observability::coordinator_span;
///
/// let span = coordinator_span("materialize", "v_abc123");
/// let _guard = span.enter();
/// // ... handle the message
/// ```
#[must_use]
pub fn coordinator_span(operation: &str, view: &str) -> Span {
    tracing::info_span!("coordinator", op = operation, view = view)
}

/// Creates a span for schema-service calls.
#[must_use]
pub fn schema_span(operation: &str, view: &str) -> Span {
    tracing::info_span!("schema", op = operation, view = view)
}
