//! CLI configuration
//!
//! Read once at startup from a TOML file. Every key is optional:
//!
//! ```toml
//! [detection]
//! temp_max = 80.0
//! heartbeat_timeout_secs = 4.0
//!
//! [storage]
//! raw_log = "raw.log"
//! store = "structured_metrics.csv"
//! error_log = "parser_errors.log"
//! report = "anomaly_report.json"
//! sync = false
//!
//! [source]
//! idle_backoff_ms = 10
//! read_timeout_ms = 250
//! baud_rate = 9600
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use telewatch_core::constants::DEFAULT_IDLE_BACKOFF_MS;
use telewatch_core::DetectionConfig;

/// Looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "telewatch.toml";

/// Full CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub detection: DetectionConfig,
    pub storage: StorageSettings,
    pub source: SourceSettings,
}

/// Artifact locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub raw_log: PathBuf,
    pub store: PathBuf,
    pub error_log: PathBuf,
    pub report: PathBuf,
    /// fsync every record
    pub sync: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            raw_log: PathBuf::from("raw.log"),
            store: PathBuf::from("structured_metrics.csv"),
            error_log: PathBuf::from("parser_errors.log"),
            report: PathBuf::from("anomaly_report.json"),
            sync: false,
        }
    }
}

/// Line source tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub idle_backoff_ms: u64,
    pub read_timeout_ms: u64,
    pub baud_rate: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            idle_backoff_ms: DEFAULT_IDLE_BACKOFF_MS,
            read_timeout_ms: 250,
            baud_rate: 9600,
        }
    }
}

impl SourceSettings {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Settings {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] if present
    ///
    /// An explicitly named file must exist; a missing default file means
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        settings
            .detection
            .validate()
            .context("invalid [detection] configuration")?;
        Ok(settings)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let settings = toml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }
}
