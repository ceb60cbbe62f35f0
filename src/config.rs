//! Bridge configuration.
//!
//! Values are layered: built-in defaults first, then an optional TOML file,
//! then `LIGHTBRIDGE_` environment variables, with `__` separating sections
//! (`LIGHTBRIDGE_RETRY__MAX_ATTEMPTS=5`).

use crate::error::{LightbridgeError, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "LIGHTBRIDGE_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LightbridgeConfig {
    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PersistenceConfig {
    /// Snapshot file of the device directory
    #[serde(default = "default_location")]
    pub location: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            location: default_location(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_discovery_timeout")]
    pub timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_discovery_timeout(),
        }
    }
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts per protocol call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Double the delay after each failed attempt
    #[serde(default)]
    pub exponential: bool,

    /// Upper bound for exponential delays
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            exponential: false,
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_location() -> PathBuf {
    PathBuf::from("devices.json")
}
fn default_discovery_timeout() -> u64 {
    5
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    1000
}
fn default_max_backoff_ms() -> u64 {
    60_000
}

impl LightbridgeConfig {
    /// Load defaults, the TOML file at `path` (if given and present), and
    /// the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate a configuration from any figment
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.persistence.location.as_os_str().is_empty() {
            return Err(LightbridgeError::Config(
                "persistence.location cannot be blank".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(LightbridgeError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
