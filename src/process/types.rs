use crate::error::WardenError;
use crate::process::health::HealthState;
use crate::process::output::{capture_output, OutputBuffer};
use crate::process::spawner::SpawnedProcess;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Running,
    Stopped,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Observed status of one service, computed on demand
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    #[serde(rename = "status")]
    pub state: LifecycleState,
    pub pid: Option<u32>,
    pub port: u16,
    pub health: HealthState,
    pub auto_restart: bool,
    pub started_at: Option<DateTime<Local>>,
    pub last_exit_code: Option<i32>,
    pub restarts: u32,
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }
}

/// Result of a successful `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: u32 },
    AlreadyRunning { pid: u32 },
}

impl StartOutcome {
    pub fn pid(&self) -> u32 {
        match self {
            StartOutcome::Started { pid } | StartOutcome::AlreadyRunning { pid } => *pid,
        }
    }
}

/// Result of a successful `stop`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// A live process was terminated and reaped
    Stopped {
        forced: bool,
        exit_code: Option<i32>,
    },
    /// Nothing was running
    NotRunning,
}

/// Runtime handle of one live service process
///
/// Owned by the supervisor; dropped only after the process has been reaped.
#[derive(Debug)]
pub struct ProcessHandle {
    name: String,
    pid: u32,
    started_at: DateTime<Local>,
    child: Child,
    exit_status: Option<ExitStatus>,
}

impl ProcessHandle {
    /// Wrap a freshly spawned process and start draining its output
    pub fn new(spawned: SpawnedProcess, output: &OutputBuffer) -> Self {
        let SpawnedProcess {
            mut child,
            pid,
            name,
        } = spawned;

        capture_output(&name, &mut child, output);

        Self {
            name,
            pid,
            started_at: Local::now(),
            child,
            exit_status: None,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.and_then(|status| status.code())
    }

    /// Reap the process if it has exited; true while it is still running
    pub fn poll_running(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }

        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                info!(
                    "Service {} (PID: {}) exited with {}",
                    self.name, self.pid, status
                );
                self.exit_status = Some(status);
                false
            }
            Err(e) => {
                // Dropping the handle kills the child, so treat it as gone
                warn!(
                    "Failed to poll service {} (PID: {}): {}",
                    self.name, self.pid, e
                );
                false
            }
        }
    }

    /// Terminate the process and block until it has been reaped
    ///
    /// Sends a graceful termination request, waits up to `grace`, then kills.
    /// Returns whether the kill was needed.
    pub async fn terminate(&mut self, grace: Duration) -> bool {
        if !self.poll_running() {
            return false;
        }

        info!(
            "Gracefully stopping service {} (PID: {})",
            self.name, self.pid
        );

        if let Err(e) = self.request_exit() {
            debug!("{}", e);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!("Service {} exited gracefully with {}", self.name, status);
                self.exit_status = Some(status);
                return false;
            }
            Ok(Err(e)) => {
                warn!("Waiting on service {} failed: {}", self.name, e);
            }
            Err(_) => {
                warn!(
                    "{} (grace period {:?})",
                    WardenError::TerminationTimeout(self.name.clone()),
                    grace
                );
            }
        }

        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill service {}: {}", self.name, e);
        }

        match self.child.wait().await {
            Ok(status) => self.exit_status = Some(status),
            Err(e) => warn!("Failed to reap service {}: {}", self.name, e),
        }

        true
    }

    #[cfg(unix)]
    fn request_exit(&mut self) -> crate::error::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        // The child is not reaped yet, so the PID cannot have been reused
        kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM).map_err(|e| {
            WardenError::Signal(format!(
                "Failed to send SIGTERM to {} (PID: {}): {}",
                self.name, self.pid, e
            ))
        })
    }

    #[cfg(not(unix))]
    fn request_exit(&mut self) -> crate::error::Result<()> {
        self.child.start_kill().map_err(WardenError::from)
    }
}
