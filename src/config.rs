//! JSON configuration read once at startup.
//!
//! ```json
//! {
//!   "ConnectionStrings": { "AsyncPlaygroundDb": "AsyncPlaygroundDb" },
//!   "Playground": { "loop_steps": 100, "cancel_after_ms": 2500 }
//! }
//! ```
//!
//! The `Playground` section and each of its fields are optional.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};

/// Connection string name the store is looked up under.
pub const STORE_CONNECTION: &str = "AsyncPlaygroundDb";

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "PLAYGROUND_CONFIG";

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "ConnectionStrings", default)]
    pub connection_strings: HashMap<String, String>,

    #[serde(rename = "Playground", default)]
    pub playground: PlaygroundSettings,
}

/// Timings and sizes for one orchestrator run, in milliseconds where relevant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaygroundSettings {
    pub loop_steps: usize,
    pub loop_step_delay_ms: u64,
    pub cancel_after_ms: u64,
    pub background_delay_ms: u64,
    pub important_job_delay_ms: u64,
    pub fetch_delay_ms: u64,
    pub store_latency_ms: u64,
    pub bridge_workers: usize,
}

impl Default for PlaygroundSettings {
    fn default() -> Self {
        PlaygroundSettings {
            loop_steps: 100,
            loop_step_delay_ms: 1000,
            cancel_after_ms: 2500,
            background_delay_ms: 1000,
            important_job_delay_ms: 5000,
            fetch_delay_ms: 100,
            store_latency_ms: 0,
            bridge_workers: 2,
        }
    }
}

impl PlaygroundSettings {
    pub fn loop_step_delay(&self) -> Duration {
        Duration::from_millis(self.loop_step_delay_ms)
    }

    pub fn cancel_after(&self) -> Duration {
        Duration::from_millis(self.cancel_after_ms)
    }

    pub fn background_delay(&self) -> Duration {
        Duration::from_millis(self.background_delay_ms)
    }

    pub fn important_job_delay(&self) -> Duration {
        Duration::from_millis(self.important_job_delay_ms)
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }

    pub fn store_latency(&self) -> Duration {
        Duration::from_millis(self.store_latency_ms)
    }
}

impl AppConfig {
    /// Reads and parses the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|err| Error::Config(err.to_string()))
    }

    /// `$PLAYGROUND_CONFIG` if set, otherwise `config.json` in the working directory.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn connection_string(&self, name: &str) -> Option<&str> {
        self.connection_strings.get(name).map(String::as_str)
    }

    /// Like [`connection_string`](Self::connection_string) but missing or
    /// blank values are an error.
    pub fn require_connection_string(&self, name: &str) -> Result<&str> {
        match self.connection_string(name) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(Error::Config(format!("missing connection string '{name}'"))),
        }
    }
}
