//! Identifier types: client-assigned action ids and host-assigned versions

use serde::{Deserialize, Serialize};

/// Identifier of a locally issued action
///
/// Assigned by the issuing client from a per-session counter starting at 1.
/// Only unique within that client's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub u64);

impl ActionId {
    /// The first id a client hands out
    pub const FIRST: ActionId = ActionId(1);

    /// Create a new action id
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The id issued after this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Broadcast version, strictly increasing per state channel
///
/// Only the adapter owning a channel assigns versions. `Version::ZERO` is the
/// counter's starting point and never appears on the wire.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    /// Counter origin, before anything was broadcast
    pub const ZERO: Version = Version(0);

    /// Create a new version
    pub fn new(version: u64) -> Self {
        Self(version)
    }

    /// The version following this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
