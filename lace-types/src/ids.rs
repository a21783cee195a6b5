//! Identifier newtypes shared across the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for an artifact (a stored blob of backing data).
///
/// A simple wrapper around `u64` so artifact keys cannot be mixed up with
/// other numeric values. The identifier is a non-owning lookup key resolved
/// through an artifact store; holding one never keeps the artifact alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactId(pub u64);

impl From<u64> for ArtifactId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ArtifactId> for u64 {
    fn from(id: ArtifactId) -> Self {
        id.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artifact:{}", self.0)
    }
}
