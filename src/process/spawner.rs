use crate::config::ServiceConfig;
use crate::error::{Result, WardenError};
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Metadata returned when spawning a service
#[derive(Debug)]
pub struct SpawnedProcess {
    /// The child process handle
    pub child: Child,

    /// Process ID assigned by the OS
    pub pid: u32,

    /// Service name from configuration
    pub name: String,
}

/// Spawn a service based on its configuration
///
/// The command runs in the configured working directory with the supervisor's
/// environment overlaid by the service's overrides. Stdout and stderr are piped
/// for capture; stdin is closed. The child is killed if its handle is dropped.
///
/// Success means the OS accepted the launch, not that the service is ready.
pub fn spawn_process(config: &ServiceConfig) -> Result<SpawnedProcess> {
    if !config.path.is_dir() {
        return Err(WardenError::SpawnFailure(format!(
            "Working directory does not exist for '{}': {}",
            config.name,
            config.path.display()
        )));
    }

    let (program, args) = config.argv().map_err(|_| {
        WardenError::SpawnFailure(format!("Empty launch command for '{}'", config.name))
    })?;

    let mut command = Command::new(program);
    command
        .args(&args)
        .current_dir(&config.path)
        .envs(&config.env_vars)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|e| {
        WardenError::SpawnFailure(format!("Failed to spawn service '{}': {}", config.name, e))
    })?;

    let pid = child.id().ok_or_else(|| {
        WardenError::SpawnFailure(format!("Failed to get PID for service '{}'", config.name))
    })?;

    Ok(SpawnedProcess {
        child,
        pid,
        name: config.name.clone(),
    })
}
