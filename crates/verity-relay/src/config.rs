//! Relay configuration - which channels keep a retained value

use serde::{Deserialize, Serialize};
use verity_core::{Error, Result, Role};

/// Configuration for a [`crate::Relay`]
///
/// A channel is retained when its name ends with one of `retain_suffixes`,
/// or when it was flagged with [`crate::Relay::retain`].
///
/// # Example
///
/// ```
/// use verity_relay::RelayConfig;
///
/// let config = RelayConfig::from_ron(r#"(retain_suffixes: [":state", ":presence"])"#).unwrap();
/// assert!(config.retains("room:presence"));
/// assert!(!config.retains("room:action"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Channel-name suffixes that denote retention channels
    #[serde(default = "default_retain_suffixes")]
    pub retain_suffixes: Vec<String>,
}

fn default_retain_suffixes() -> Vec<String> {
    vec![Role::State.suffix().to_string()]
}

impl RelayConfig {
    /// Configuration with no suffix-based retention
    pub fn explicit_only() -> Self {
        Self {
            retain_suffixes: Vec::new(),
        }
    }

    /// Add a retention suffix
    pub fn with_retain_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.retain_suffixes.push(suffix.into());
        self
    }

    /// Whether `channel` is retained by naming convention
    pub fn retains(&self, channel: &str) -> bool {
        self.retain_suffixes
            .iter()
            .any(|suffix| channel.ends_with(suffix.as_str()))
    }

    /// Check the configuration
    pub fn validate(&self) -> Result<()> {
        if self.retain_suffixes.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidConfig(
                "empty retain suffix would retain every channel".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a configuration from RON
    pub fn from_ron(source: &str) -> Result<Self> {
        let config: Self =
            ron::from_str(source).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            retain_suffixes: default_retain_suffixes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retains_state_channels() {
        let config = RelayConfig::default();
        assert!(config.retains("counter:state"));
        assert!(!config.retains("counter:action"));
        assert!(!config.retains("counter:snapshot"));
    }

    #[test]
    fn test_explicit_only() {
        let config = RelayConfig::explicit_only().with_retain_suffix(":last");
        assert!(!config.retains("counter:state"));
        assert!(config.retains("feed:last"));
    }

    #[test]
    fn test_from_ron_defaults_missing_fields() {
        let config = RelayConfig::from_ron("()").unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_from_ron_rejects_empty_suffix() {
        assert!(RelayConfig::from_ron(r#"(retain_suffixes: [""])"#).is_err());
        assert!(RelayConfig::from_ron("(retain_suffixes: 3)").is_err());
    }
}
