// CLI module - User-facing command-line interface

mod output;

use crate::config::{ServiceConfig, WardenSettings};
use crate::daemon::Daemon;
use crate::error::{Result, WardenError};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;

/// Warden - deploy long-running services and keep them alive
#[derive(Parser)]
#[command(name = "warden")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Daemon settings file (TOML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Service registry file, overriding the configured store path
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Defaults to `monitor` when omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new service
    Add {
        /// Unique service name
        name: String,

        /// Working directory the command runs in
        path: PathBuf,

        /// Port the service listens on
        port: u16,

        /// Launch command, split on whitespace
        command: String,

        /// URL probed for health while the service runs
        #[arg(long)]
        health_url: Option<String>,

        /// Do not restart the service when its process exits
        #[arg(long)]
        no_auto_restart: bool,

        /// Environment variables (KEY=VALUE format)
        #[arg(short, long)]
        env: Vec<String>,
    },

    /// Stop and remove a service
    Remove {
        /// Service name
        name: String,
    },

    /// List registered services
    List,

    /// Supervise every service in the foreground until Ctrl+C
    Monitor {
        /// Seconds between host metric samples
        #[arg(long)]
        monitor_interval: Option<u64>,
    },
}

impl Cli {
    /// Daemon settings from `--config`, with `--store` applied on top
    pub fn load_settings(&self) -> Result<WardenSettings> {
        let mut settings = match &self.config {
            Some(path) => WardenSettings::load_or_default(path)?,
            None => WardenSettings::default(),
        };

        if let Some(store) = &self.store {
            settings.store_path = store.clone();
        }

        Ok(settings)
    }

    /// Execute the parsed command
    pub async fn execute(self, settings: WardenSettings) -> Result<()> {
        match self.command.unwrap_or(Commands::Monitor {
            monitor_interval: None,
        }) {
            Commands::Add {
                name,
                path,
                port,
                command,
                health_url,
                no_auto_restart,
                env,
            } => {
                let mut config = ServiceConfig::new(&name, path, port, command)
                    .with_auto_restart(!no_auto_restart);
                config.health_check_url = health_url;
                config.env_vars = parse_env_vars(&env)?;

                let daemon = Daemon::new(settings)?;
                daemon.register(config).await?;
                output::print_success_msg(&format!("Service '{}' added", name));
                Ok(())
            }

            Commands::Remove { name } => {
                let daemon = Daemon::new(settings)?;
                daemon.deregister(&name).await?;
                output::print_success_msg(&format!("Service '{}' removed", name));
                Ok(())
            }

            Commands::List => {
                let daemon = Daemon::new(settings)?;
                output::print_status_table(&daemon.status_all().await);
                Ok(())
            }

            Commands::Monitor { monitor_interval } => monitor(settings, monitor_interval).await,
        }
    }
}

/// Run the daemon in the foreground, printing a report every sample period
async fn monitor(mut settings: WardenSettings, monitor_interval: Option<u64>) -> Result<()> {
    if let Some(secs) = monitor_interval {
        settings.sample_interval_secs = secs;
    }

    let mut daemon = Daemon::new(settings)?;
    daemon.launch()?;

    output::print_info(&format!(
        "Monitoring {} service(s) from {}",
        daemon.registry().len().await,
        daemon.settings().store_path.display()
    ));
    output::print_info("Press Ctrl+C to stop");

    let signal = Daemon::wait_for_signal();
    tokio::pin!(signal);

    let period = daemon.settings().sample_interval();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    let result = loop {
        tokio::select! {
            result = &mut signal => break result,
            _ = ticker.tick() => {
                output::print_status_table(&daemon.status_all().await);
                if let Some(summary) = daemon.history_summary().await {
                    output::print_metrics(&summary);
                }
            }
        }
    };

    output::print_info("Stopping monitoring...");
    let stopped = daemon.shutdown().await;
    output::print_success_msg(&format!(
        "Monitoring stopped ({} service(s) stopped)",
        stopped
    ));

    result
}

/// Parse environment variables from KEY=VALUE format
fn parse_env_vars(env_vars: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();

    for env_str in env_vars {
        match env_str.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                map.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(WardenError::InvalidConfig(format!(
                    "Invalid environment variable format: '{}'. Expected KEY=VALUE",
                    env_str
                )));
            }
        }
    }

    Ok(map)
}

/// Print a failed command's error the way the rest of the CLI reports
pub fn report_error(error: &dyn std::fmt::Display) {
    output::print_error(&error.to_string());
}
