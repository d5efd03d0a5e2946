//! Strongly-typed identifiers for Strata entities.
//!
//! Two kinds of identity exist in the scheduler:
//!
//! - [`ViewId`] is **content-addressed**: derived from a view's schema and
//!   storage location, so the same logical view always maps to the same
//!   coordinator regardless of which process or client referenced it first.
//! - [`RequestId`] is **generated**: a ULID minted per materialization
//!   request, used to correlate one request's path through the logs.
//!
//! # Example
//!
//! ```rust
//! use strata_core::id::{RequestId, ViewId};
//!
//! let a = ViewId::derive("(id int)", "/warehouse/events");
//! let b = ViewId::derive("(id int)", "/warehouse/events");
//! assert_eq!(a, b);
//!
//! let request = RequestId::generate();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use base32::Alphabet;
use sha2::{Digest, Sha256};
use ulid::Ulid;

use crate::error::{Error, Result};

/// A content-addressed identifier for a view.
///
/// Derived as `sha256("view:" + schema + "\0" + full_path)`. Because the
/// hash covers both the schema and the storage location, two views are the
/// same view exactly when they would read and write the same data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewId(#[serde(with = "hex_bytes")] [u8; 32]);

impl ViewId {
    /// Derives the id for a view from its schema text and storage path.
    #[must_use]
    pub fn derive(schema: &str, full_path: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"view:");
        hasher.update(schema.as_bytes());
        hasher.update(b"\0");
        hasher.update(full_path.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the full 64-character hex form, as accepted by `FromStr`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns a 12-character hex prefix suitable for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        let full = hex::encode(self.0);
        full.get(..12).unwrap_or(&full).to_string()
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 32-byte hash -> 52 base32 chars; 26 chars (130 bits) keeps ids compact.
        let encoded = base32::encode(Alphabet::Rfc4648 { padding: false }, &self.0);
        let short = encoded.get(..26).unwrap_or(&encoded).to_lowercase();
        write!(f, "v_{short}")
    }
}

impl FromStr for ViewId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::InvalidId {
            message: format!("invalid view id '{s}': {e}"),
        })?;
        let array: [u8; 32] = bytes.try_into().map_err(|_| Error::InvalidId {
            message: format!("invalid view id '{s}': expected 32 bytes"),
        })?;
        Ok(Self(array))
    }
}

mod hex_bytes {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("expected 32 bytes"))
    }
}

/// A unique identifier for one materialization request.
///
/// Minted at the edge where a request enters the scheduler and threaded
/// through log statements so a single request can be traced across
/// coordinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Ulid);

impl RequestId {
    /// Generates a new unique request id.
    ///
    /// ULIDs are lexicographically sortable by creation time and globally
    /// unique without coordination.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Returns the underlying ULID.
    #[must_use]
    pub const fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ulid::from_string(s)
            .map(Self)
            .map_err(|e| Error::InvalidId {
                message: format!("invalid request id '{s}': {e}"),
            })
    }
}
