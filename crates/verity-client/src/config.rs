//! Client configuration

use serde::{Deserialize, Serialize};

/// Default bound on unacknowledged actions
pub const DEFAULT_MAX_PENDING: usize = 256;

/// Configuration for a [`crate::SyncClient`]
///
/// # Example
///
/// ```
/// use verity_client::ClientConfig;
///
/// let config = ClientConfig::from_ron("(max_pending: 16)").unwrap();
/// assert_eq!(config.max_pending, 16);
/// assert!(config.snapshot_on_attach);
///
/// assert!(ClientConfig::from_ron("(max_pending: 0)").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Maximum number of actions awaiting acknowledgment
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Request a snapshot after attaching if no retained broadcast arrived
    #[serde(default = "default_snapshot_on_attach")]
    pub snapshot_on_attach: bool,
}

fn default_max_pending() -> usize {
    DEFAULT_MAX_PENDING
}

fn default_snapshot_on_attach() -> bool {
    true
}

impl ClientConfig {
    /// Set the pending bound
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Enable or disable the attach-time snapshot request
    pub fn with_snapshot_on_attach(mut self, enabled: bool) -> Self {
        self.snapshot_on_attach = enabled;
        self
    }

    /// Check the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_pending == 0 {
            return Err(verity_core::Error::InvalidConfig(
                "max_pending must be at least 1".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Load and validate a configuration from RON
    pub fn from_ron(source: &str) -> crate::Result<Self> {
        let config: Self = ron::from_str(source)
            .map_err(|e| verity_core::Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_pending: DEFAULT_MAX_PENDING,
            snapshot_on_attach: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_pending, 256);
        assert!(config.snapshot_on_attach);
        assert!(config.validate().is_ok());
        assert_eq!(ClientConfig::from_ron("()").unwrap(), config);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::default()
            .with_max_pending(4)
            .with_snapshot_on_attach(false);
        assert_eq!(config.max_pending, 4);
        assert!(!config.snapshot_on_attach);
    }

    #[test]
    fn test_invalid_config() {
        let err = ClientConfig::default().with_max_pending(0).validate().unwrap_err();
        assert!(matches!(err, Error::Core(verity_core::Error::InvalidConfig(_))));
        assert!(ClientConfig::from_ron("(max_pending: -1)").is_err());
    }
}
