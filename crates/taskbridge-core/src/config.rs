//! Runtime configuration.
//!
//! Loaded from a JSON file; every field has a default so an empty object (or
//! no file at all) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Upper bound for one supervisor round trip.
    pub request_timeout_ms: u64,

    /// Extra vars exported alongside the task's own context vars.
    ///
    /// Values must be strings by the time they are exported; anything else is
    /// rejected at export time, not here.
    pub context_vars: IndexMap<String, serde_json::Value>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            context_vars: IndexMap::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SdkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}
