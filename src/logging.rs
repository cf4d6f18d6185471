// Logging - tracing subscriber setup for the warden binary

use crate::config::LoggingSettings;
use crate::error::{Result, WardenError};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the level filter; `RUST_LOG` takes precedence over the configured level
pub fn env_filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.level).map_err(|e| {
            WardenError::InvalidConfig(format!("Invalid log level '{}': {}", settings.level, e))
        }),
    }
}

/// Install the global subscriber
///
/// Logs go to stdout and, when `log_file` is set, are appended to that file
/// without ANSI colours.
pub fn init(settings: &LoggingSettings) -> Result<()> {
    let filter = env_filter(settings)?;

    let file_layer = match &settings.log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| WardenError::Other(format!("Failed to set logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let settings = LoggingSettings {
            level: "warden=loud".to_string(),
            log_file: None,
        };
        assert!(matches!(
            env_filter(&settings),
            Err(WardenError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_default_level_accepted() {
        assert!(env_filter(&LoggingSettings::default()).is_ok());
    }
}
