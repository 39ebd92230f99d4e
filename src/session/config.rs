//! Per-session disclosure options.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Default hard upper bound on a session's lifetime.
pub const DEFAULT_TIMEOUT_MILLIS: u64 = 60_000;

/// Options recognised by the session state machine.
///
/// Deserializes from the host's `config` object. Presentation-only keys
/// (`theme`, `blockScreenshots`, `requireBiometric`) are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Milliseconds until the session closes with `Timeout`.
    #[serde(rename = "timeout", alias = "timeoutMillis")]
    pub timeout_millis: u64,

    /// Cover the fields when the app loses visibility instead of closing.
    #[serde(rename = "blurOnBackground", alias = "obscureOnBackground")]
    pub obscure_on_background: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_millis: DEFAULT_TIMEOUT_MILLIS,
            obscure_on_background: true,
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_millis == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
