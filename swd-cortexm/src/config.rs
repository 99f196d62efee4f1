//! Tunables of the Cortex-M controller.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settle delay used when no other value is configured.
pub const DEFAULT_RESET_SETTLE_DELAY_MS: u64 = 10;

/// Errors which occur when loading a [`CortexMConfig`].
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum ConfigError {
    /// Failed to parse the configuration.
    Parse(#[from] serde_yaml::Error),
}

/// Configuration of a [`CortexM`](crate::CortexM) controller.
///
/// ```
/// use swd_cortexm::CortexMConfig;
///
/// let config = CortexMConfig::from_yaml_str("reset_settle_delay_ms: 50")?;
/// assert_eq!(config.reset_settle_delay().as_millis(), 50);
/// # Ok::<(), swd_cortexm::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CortexMConfig {
    /// Time in milliseconds to block after a reset request.
    ///
    /// The core does not answer SWD transactions while it is being reset.
    pub reset_settle_delay_ms: u64,
}

impl Default for CortexMConfig {
    fn default() -> Self {
        Self {
            reset_settle_delay_ms: DEFAULT_RESET_SETTLE_DELAY_MS,
        }
    }
}

impl CortexMConfig {
    /// Parse a configuration from YAML. Missing keys take their default value.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Replace the settle delay after reset requests.
    ///
    /// The delay is rounded up to whole milliseconds.
    pub fn with_reset_settle_delay(mut self, delay: Duration) -> Self {
        self.reset_settle_delay_ms = delay
            .as_nanos()
            .div_ceil(1_000_000)
            .try_into()
            .unwrap_or(u64::MAX);
        self
    }

    /// Time to block after a reset request.
    pub fn reset_settle_delay(&self) -> Duration {
        Duration::from_millis(self.reset_settle_delay_ms)
    }
}
