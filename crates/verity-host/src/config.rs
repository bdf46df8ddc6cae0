//! Host configuration - what happens when a transition fails

use serde::{Deserialize, Serialize};
use verity_core::{Error, Result};

/// Policy for actions whose transition function fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Re-broadcast the unchanged state under a fresh version, tagged with
    /// the failed action's id, so the issuing client retires it
    #[default]
    Settle,
    /// Broadcast nothing; the version counter stays where it was
    Drop,
}

/// Configuration for an [`crate::Adapter`]
///
/// # Example
///
/// ```
/// use verity_host::{FailurePolicy, HostConfig};
///
/// let config = HostConfig::from_ron("(failure_policy: Drop)").unwrap();
/// assert_eq!(config.failure_policy, FailurePolicy::Drop);
/// assert_eq!(HostConfig::default().failure_policy, FailurePolicy::Settle);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// How failed transitions are settled
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl HostConfig {
    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Load a configuration from RON
    pub fn from_ron(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}
