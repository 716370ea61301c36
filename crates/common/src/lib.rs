//! Shared identifier and protocol-header types for the LRA coordinator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the current LRA context on requests and responses.
pub const LRA_CONTEXT_HEADER: &str = "Long-Running-Action";

/// Header returned on enlistment, carrying the participant's recovery URL.
pub const LRA_RECOVERY_HEADER: &str = "Long-Running-Action-Recovery";

/// Unique identifier for a Long Running Action.
///
/// Wraps a UUID to provide type safety and prevent mixing up
/// LRA identifiers with other UUID-based identifiers. The API layer
/// renders it as the final segment of the coordinator's LRA URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LraId(Uuid);

impl LraId {
    /// Creates a new random LRA ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an LRA ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses an LRA ID from its string form.
    ///
    /// Accepts either a bare UUID or a URI whose last path segment is
    /// a UUID, so callers can pass back the value from the context header.
    pub fn parse(s: &str) -> Option<Self> {
        let tail = s.rsplit('/').next().unwrap_or(s);
        Uuid::parse_str(tail).ok().map(Self)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LraId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LraId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for LraId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<LraId> for Uuid {
    fn from(id: LraId) -> Self {
        id.0
    }
}
