//! Scheduler configuration.
//!
//! All knobs the materialization protocol exposes. The struct deserializes
//! from JSON or TOML with humantime durations (`"30s"`, `"2m"`), and every
//! field has a default so embedding applications can start from
//! `SchedulerConfig::default()` and override selectively.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The identity under which filesystem and action calls run.
///
/// A process-wide handle initialized at startup and passed explicitly
/// through constructors; nothing in the scheduler reads it from ambient
/// state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserIdentity(String);

impl UserIdentity {
    /// Creates a new user identity.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserIdentity {
    fn default() -> Self {
        Self("strata".into())
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for the view materialization scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Retries beyond the first transformation attempt.
    pub max_retries: u32,

    /// Bound on registry ask-pattern calls (dependency lookups, status).
    #[serde(with = "humantime_serde")]
    pub dependency_timeout: Duration,

    /// Bound on filesystem request/reply through the action runner.
    #[serde(with = "humantime_serde")]
    pub file_action_timeout: Duration,

    /// Bound on schema-service calls.
    #[serde(with = "humantime_serde")]
    pub schema_action_timeout: Duration,

    /// Identity under which filesystem and action calls run.
    pub user_identity: UserIdentity,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            dependency_timeout: Duration::from_secs(10),
            file_action_timeout: Duration::from_secs(30),
            schema_action_timeout: Duration::from_secs(30),
            user_identity: UserIdentity::default(),
        }
    }
}
