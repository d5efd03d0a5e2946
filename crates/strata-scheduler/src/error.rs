//! Error types for the scheduler domain.

/// The result type used throughout strata-scheduler.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A cycle was detected in the view dependency graph.
    #[error("cycle detected in view graph at: {view}")]
    CycleDetected {
        /// The view on which the cycle was detected.
        view: String,
    },

    /// Two distinct views claim the same storage path.
    ///
    /// Disjoint `full_path`s are a precondition of the materialization
    /// protocol: the success marker and partition data of a view must not be
    /// writable through another view.
    #[error("storage path {path} is claimed by both {first} and {second}")]
    PathOverlap {
        /// The contested storage path.
        path: String,
        /// Name of the view registered first.
        first: String,
        /// Name of the conflicting view.
        second: String,
    },

    /// A coordinator's mailbox is gone; its task has terminated.
    #[error("coordinator unavailable for view {view}")]
    CoordinatorUnavailable {
        /// The view whose coordinator is unreachable.
        view: String,
    },

    /// A coordinator accepted a request but terminated before replying.
    #[error("request dropped by coordinator for view {view}")]
    RequestDropped {
        /// The view whose coordinator dropped the request.
        view: String,
    },

    /// An error from strata-core.
    #[error("core error: {0}")]
    Core(#[from] strata_core::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_display() {
        let err = Error::CycleDetected {
            view: "report.daily".into(),
        };
        assert!(err.to_string().contains("report.daily"));
    }

    #[test]
    fn path_overlap_display() {
        let err = Error::PathOverlap {
            path: "/warehouse/events".into(),
            first: "stage.events".into(),
            second: "raw.events".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/warehouse/events"));
        assert!(msg.contains("stage.events"));
    }

    #[test]
    fn core_error_converts() {
        let core = strata_core::Error::timeout("add_partition", "exceeded 30s");
        let err: Error = core.into();
        assert!(err.to_string().contains("add_partition"));
    }
}
