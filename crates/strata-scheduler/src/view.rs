//! View descriptors and transformations.
//!
//! A [`ViewSpec`] is the immutable description of one logical table: where
//! its data lives, how it is produced, and which upstream views it reads.
//! Identity is content-addressed (schema + storage location, see
//! [`ViewId::derive`]), so the same logical view resolves to the same
//! coordinator no matter which client referenced it first.

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use strata_core::ViewId;

/// On-storage format of a view's partition data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// Columnar Parquet files.
    Parquet,
    /// Delimited text files.
    TextFile,
    /// Avro container files.
    Avro,
}

impl Default for StorageFormat {
    fn default() -> Self {
        Self::Parquet
    }
}

/// A named, pre-hashed logic resource referenced by a transformation
/// (a query file, a script, a jar).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource name, for diagnostics.
    pub name: String,
    /// Stable content hash of the resource.
    pub digest: String,
}

impl Resource {
    /// Creates a new resource reference.
    #[must_use]
    pub fn new(name: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            digest: digest.into(),
        }
    }
}

/// A pure data-movement operation on the warehouse filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilesystemOp {
    /// Copy objects from a source prefix into the view's path.
    CopyFrom {
        /// Source prefix to copy from.
        source: String,
    },
    /// Move objects from a source prefix into the view's path.
    StoreFrom {
        /// Source prefix to move from.
        source: String,
    },
    /// Create the view's path with no content.
    Touch,
}

/// How a view's data is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transformation {
    /// The view's data is managed externally; materialization only checks
    /// the success marker and registers metadata.
    NoOp,
    /// A filesystem transformation. Partition data is not deleted before
    /// one runs: the operation itself owns the target layout.
    Filesystem(FilesystemOp),
    /// A general compute transformation, executed by an external driver.
    Compute {
        /// Execution engine label (e.g. `"sql"`, `"morphline"`).
        engine: String,
        /// The transformation logic as understood by the engine.
        definition: String,
        /// Logic resources the definition references.
        #[serde(default)]
        resources: Vec<Resource>,
    },
}

impl Transformation {
    /// Convenience constructor for a compute transformation without
    /// resources.
    #[must_use]
    pub fn compute(engine: impl Into<String>, definition: impl Into<String>) -> Self {
        Self::Compute {
            engine: engine.into(),
            definition: definition.into(),
            resources: Vec::new(),
        }
    }

    /// Returns true for [`Transformation::NoOp`].
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp)
    }

    /// Returns true for pure filesystem transformations.
    #[must_use]
    pub const fn is_filesystem(&self) -> bool {
        matches!(self, Self::Filesystem(_))
    }

    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::NoOp => "noop",
            Self::Filesystem(_) => "filesystem",
            Self::Compute { engine, .. } => engine,
        }
    }

    /// Returns the definition text that feeds the version digest.
    #[must_use]
    pub fn definition(&self) -> String {
        match self {
            Self::NoOp => "noop".to_string(),
            Self::Filesystem(FilesystemOp::CopyFrom { source }) => format!("copy_from:{source}"),
            Self::Filesystem(FilesystemOp::StoreFrom { source }) => format!("store_from:{source}"),
            Self::Filesystem(FilesystemOp::Touch) => "touch".to_string(),
            Self::Compute { definition, .. } => definition.clone(),
        }
    }

    /// Returns the logic resources of the transformation.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        match self {
            Self::Compute { resources, .. } => resources,
            _ => &[],
        }
    }
}

impl Default for Transformation {
    fn default() -> Self {
        Self::NoOp
    }
}

/// Immutable descriptor of one view in the warehouse DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSpec {
    /// Human-readable view name (`database.table` style).
    pub name: String,
    /// The view's schema text; part of its identity.
    pub schema: String,
    /// Storage path of the view's partition data; part of its identity.
    /// Paths of distinct views must be disjoint.
    pub full_path: String,
    /// On-storage format.
    pub format: StorageFormat,
    /// How the view's data is produced.
    pub transformation: Transformation,
    /// Upstream views this view reads.
    pub dependencies: Vec<Arc<ViewSpec>>,
    #[serde(skip)]
    id: OnceLock<ViewId>,
}

impl ViewSpec {
    /// Creates a view descriptor with a `NoOp` transformation, Parquet
    /// format, and no dependencies.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        schema: impl Into<String>,
        full_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            full_path: full_path.into(),
            format: StorageFormat::default(),
            transformation: Transformation::default(),
            dependencies: Vec::new(),
            id: OnceLock::new(),
        }
    }

    /// Sets the storage format.
    #[must_use]
    pub fn with_format(mut self, format: StorageFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the transformation.
    #[must_use]
    pub fn with_transformation(mut self, transformation: Transformation) -> Self {
        self.transformation = transformation;
        self
    }

    /// Adds a dependency view.
    #[must_use]
    pub fn with_dependency(mut self, dependency: Arc<ViewSpec>) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Returns the view's content-addressed identity.
    ///
    /// Computed on first use and cached.
    pub fn id(&self) -> ViewId {
        *self
            .id
            .get_or_init(|| ViewId::derive(&self.schema, &self.full_path))
    }

    /// Returns the identities of the view's dependencies.
    #[must_use]
    pub fn dependency_ids(&self) -> Vec<ViewId> {
        self.dependencies.iter().map(|dep| dep.id()).collect()
    }

    /// Returns the view's version digest: a stable hex SHA-256 over the
    /// transformation's resource hashes and definition.
    ///
    /// Stored in the schema service and compared on each materialization
    /// round; a mismatch forces retransformation even when timestamps would
    /// suggest freshness.
    #[must_use]
    pub fn version_digest(&self) -> String {
        let mut hasher = Sha256::new();
        for resource in self.transformation.resources() {
            hasher.update(resource.digest.as_bytes());
            hasher.update(b"\0");
        }
        hasher.update(self.transformation.definition().as_bytes());
        hex::encode(hasher.finalize())
    }
}
