use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Daemon-level tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenSettings {
    /// File the service registry is persisted to
    pub store_path: PathBuf,

    /// Period of the host metrics sampler (in seconds)
    pub sample_interval_secs: u64,

    /// Period of the reconciliation loop (in seconds)
    pub reconcile_interval_secs: u64,

    /// Maximum number of snapshots kept in the metrics history
    pub history_capacity: usize,

    /// Window over which CPU utilization is measured (in milliseconds)
    pub cpu_window_ms: u64,

    /// Path whose disk is reported in snapshots
    pub disk_mount: PathBuf,

    /// Time a service gets to exit after SIGTERM before it is killed (in seconds)
    pub stop_grace_secs: u64,

    /// Pause between stop and start on restart (in seconds)
    pub restart_delay_secs: u64,

    /// Timeout of a single health probe (in seconds)
    pub probe_timeout_secs: u64,

    /// Captured output lines kept per service
    pub output_lines: usize,

    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,

    /// Optional file that receives a copy of every log line
    pub log_file: Option<PathBuf>,
}

impl Default for WardenSettings {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("apis_config.json"),
            sample_interval_secs: 30,
            reconcile_interval_secs: 60,
            history_capacity: 1000,
            cpu_window_ms: 1000,
            disk_mount: PathBuf::from("/"),
            stop_grace_secs: 10,
            restart_delay_secs: 2,
            probe_timeout_secs: 5,
            output_lines: 200,
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
        }
    }
}

impl WardenSettings {
    /// Load settings from a TOML or JSON file, falling back to defaults when it is missing
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// Load settings from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WardenError::InvalidConfig(format!("Failed to read settings file: {}", e))
        })?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let settings: WardenSettings = match extension {
            "toml" => toml::from_str(&contents)
                .map_err(|e| WardenError::InvalidConfig(format!("Failed to parse TOML: {}", e)))?,
            "json" => serde_json::from_str(&contents)
                .map_err(|e| WardenError::InvalidConfig(format!("Failed to parse JSON: {}", e)))?,
            _ => {
                return Err(WardenError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let non_zero = [
            ("sample_interval_secs", self.sample_interval_secs),
            ("reconcile_interval_secs", self.reconcile_interval_secs),
            ("history_capacity", self.history_capacity as u64),
            ("output_lines", self.output_lines as u64),
        ];

        for (field, value) in non_zero {
            if value == 0 {
                return Err(WardenError::ConfigValidation(format!(
                    "{} must be at least 1",
                    field
                )));
            }
        }

        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn cpu_window(&self) -> Duration {
        Duration::from_millis(self.cpu_window_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
