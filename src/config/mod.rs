mod settings;

pub use settings::{LoggingSettings, WardenSettings};

use crate::error::{Result, WardenError};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Desired configuration of a supervised service
///
/// The serialized shape matches one entry of the `apis_config.json` file, so
/// existing registry files load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name (unique key)
    pub name: String,

    /// Working directory the command is launched in
    pub path: PathBuf,

    /// Port the service listens on (informational only)
    pub port: u16,

    /// Launch command: executable followed by whitespace-separated arguments
    pub command: String,

    /// Whether reconciliation should restart the service when it is not running
    #[serde(default = "default_auto_restart")]
    pub auto_restart: bool,

    /// URL probed to compute the health state
    #[serde(default)]
    pub health_check_url: Option<String>,

    /// Environment overrides applied on top of the supervisor's environment
    #[serde(default, deserialize_with = "null_as_empty")]
    pub env_vars: HashMap<String, String>,
}

fn default_auto_restart() -> bool {
    true
}

// Older registry files store `"env_vars": null` for services without overrides.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl ServiceConfig {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        port: u16,
        command: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            port,
            command: command.into(),
            auto_restart: default_auto_restart(),
            health_check_url: None,
            env_vars: HashMap::new(),
        }
    }

    pub fn with_auto_restart(mut self, auto_restart: bool) -> Self {
        self.auto_restart = auto_restart;
        self
    }

    pub fn with_health_check(mut self, url: impl Into<String>) -> Self {
        self.health_check_url = Some(url.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Split the launch command into the executable and its arguments
    pub fn argv(&self) -> Result<(&str, Vec<&str>)> {
        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| WardenError::MissingConfigField("command".to_string()))?;
        Ok((program, parts.collect()))
    }

    /// Validate the configuration before it enters the registry
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(WardenError::MissingConfigField("name".to_string()));
        }

        if self.command.trim().is_empty() {
            return Err(WardenError::MissingConfigField("command".to_string()));
        }

        if let Some(ref url) = self.health_check_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(WardenError::ConfigValidation(format!(
                    "health_check_url must be an http(s) URL, got: {}",
                    url
                )));
            }
        }

        Ok(())
    }
}
