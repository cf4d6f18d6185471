use crate::config::{ServiceConfig, WardenSettings};
use crate::error::{Result, WardenError};
use crate::process::health::{HealthChecker, HealthState};
use crate::process::output::{OutputBuffer, OutputLine};
use crate::process::spawner::spawn_process;
use crate::process::types::{
    LifecycleState, ProcessHandle, ServiceStatus, StartOutcome, StopOutcome,
};
use crate::registry::ServiceRegistry;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

/// Timing and buffering knobs of the supervisor
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Time a process gets to exit after the termination request
    pub stop_grace: Duration,
    /// Pause between stop and start on restart
    pub restart_delay: Duration,
    /// Timeout of a single health probe
    pub probe_timeout: Duration,
    /// Captured output lines kept per service
    pub output_lines: usize,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self::from(&WardenSettings::default())
    }
}

impl From<&WardenSettings> for SupervisorOptions {
    fn from(settings: &WardenSettings) -> Self {
        Self {
            stop_grace: settings.stop_grace(),
            restart_delay: settings.restart_delay(),
            probe_timeout: settings.probe_timeout(),
            output_lines: settings.output_lines,
        }
    }
}

/// What the last holder of a service's lock saw
#[derive(Debug, Clone, Default)]
struct Observation {
    pid: Option<u32>,
    started_at: Option<DateTime<Local>>,
    last_exit_code: Option<i32>,
    restarts: u32,
}

/// Mutable per-service state, guarded by the service's lock
#[derive(Default)]
struct ServiceSlot {
    handle: Option<ProcessHandle>,
    last_exit_code: Option<i32>,
    starts: u32,
}

impl ServiceSlot {
    /// Drop the handle if its process has exited; true while it is running
    fn reap(&mut self) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };

        if handle.poll_running() {
            return true;
        }

        self.last_exit_code = handle.exit_code();
        self.handle = None;
        false
    }

    fn observation(&self) -> Observation {
        Observation {
            pid: self.handle.as_ref().map(|h| h.pid()),
            started_at: self.handle.as_ref().map(|h| h.started_at()),
            last_exit_code: self.last_exit_code,
            restarts: self.starts.saturating_sub(1),
        }
    }
}

/// One service's lock plus the state published under it
///
/// The output buffer lives outside the lock and outlives individual processes.
struct ServiceEntry {
    slot: Mutex<ServiceSlot>,
    observed: watch::Sender<Observation>,
    output: OutputBuffer,
}

impl ServiceEntry {
    fn new(output_lines: usize) -> Self {
        let (observed, _) = watch::channel(Observation::default());
        Self {
            slot: Mutex::new(ServiceSlot::default()),
            observed,
            output: OutputBuffer::new(output_lines),
        }
    }

    fn publish(&self, slot: &ServiceSlot) {
        self.observed.send_replace(slot.observation());
    }
}

/// Single authority over live service processes
///
/// Operations on one service name are serialized by that service's lock;
/// operations on different names proceed independently. Status queries never
/// wait on a busy service: they fall back to the state published by the
/// operation in progress.
pub struct ProcessSupervisor {
    registry: Arc<ServiceRegistry>,
    entries: Mutex<HashMap<String, Arc<ServiceEntry>>>,
    health: HealthChecker,
    options: SupervisorOptions,
}

impl ProcessSupervisor {
    pub fn new(registry: Arc<ServiceRegistry>, options: SupervisorOptions) -> Result<Self> {
        let health = HealthChecker::new(options.probe_timeout)?;

        Ok(Self {
            registry,
            entries: Mutex::new(HashMap::new()),
            health,
            options,
        })
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    async fn entry(&self, name: &str) -> Arc<ServiceEntry> {
        let mut entries = self.entries.lock().await;
        Arc::clone(
            entries
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(ServiceEntry::new(self.options.output_lines))),
        )
    }

    async fn existing_entry(&self, name: &str) -> Option<Arc<ServiceEntry>> {
        self.entries.lock().await.get(name).cloned()
    }

    async fn all_entries(&self) -> Vec<(String, Arc<ServiceEntry>)> {
        self.entries
            .lock()
            .await
            .iter()
            .map(|(name, entry)| (name.clone(), Arc::clone(entry)))
            .collect()
    }

    /// Launch the service unless it is already running
    pub async fn start(&self, name: &str) -> Result<StartOutcome> {
        if !self.registry.contains(name).await {
            return Err(WardenError::NotFound(name.to_string()));
        }

        let entry = self.entry(name).await;
        let mut slot = entry.slot.lock().await;

        // Re-read under the lock; a deregister may have won the race
        let config = self
            .registry
            .get(name)
            .await
            .ok_or_else(|| WardenError::NotFound(name.to_string()))?;

        let outcome = Self::start_locked(&mut slot, &entry.output, &config);
        entry.publish(&slot);
        outcome
    }

    fn start_locked(
        slot: &mut ServiceSlot,
        output: &OutputBuffer,
        config: &ServiceConfig,
    ) -> Result<StartOutcome> {
        if slot.reap() {
            let pid = slot.handle.as_ref().map(|h| h.pid()).unwrap_or_default();
            debug!("Service {} is already running (PID: {})", config.name, pid);
            return Ok(StartOutcome::AlreadyRunning { pid });
        }

        let spawned = spawn_process(config).map_err(|e| {
            error!("{}", e);
            e
        })?;

        let handle = ProcessHandle::new(spawned, output);
        let pid = handle.pid();
        slot.handle = Some(handle);
        slot.starts += 1;

        info!(
            "Service {} started (PID: {}, port: {})",
            config.name, pid, config.port
        );

        Ok(StartOutcome::Started { pid })
    }

    /// Terminate the service's process, if any, and wait until it is reaped
    pub async fn stop(&self, name: &str) -> Result<StopOutcome> {
        let Some(entry) = self.existing_entry(name).await else {
            return Ok(StopOutcome::NotRunning);
        };

        let mut slot = entry.slot.lock().await;
        let outcome = self.stop_locked(&mut slot, name).await;
        entry.publish(&slot);
        Ok(outcome)
    }

    async fn stop_locked(&self, slot: &mut ServiceSlot, name: &str) -> StopOutcome {
        let Some(mut handle) = slot.handle.take() else {
            return StopOutcome::NotRunning;
        };

        if !handle.poll_running() {
            slot.last_exit_code = handle.exit_code();
            return StopOutcome::NotRunning;
        }

        let forced = handle.terminate(self.options.stop_grace).await;
        slot.last_exit_code = handle.exit_code();

        info!("Service {} stopped", name);

        StopOutcome::Stopped {
            forced,
            exit_code: handle.exit_code(),
        }
    }

    /// Stop, pause, then start; a failed stop does not prevent the start
    pub async fn restart(&self, name: &str) -> Result<StartOutcome> {
        if let Err(e) = self.stop(name).await {
            warn!("Stopping {} for restart failed: {}", name, e);
        }

        tokio::time::sleep(self.options.restart_delay).await;

        self.start(name).await
    }

    /// Stop the service and remove it from the registry
    ///
    /// Both steps happen under the service's lock, so no start can slip in
    /// between. A persistence failure is returned after the removal took effect.
    pub async fn deregister(&self, name: &str) -> Result<ServiceConfig> {
        if !self.registry.contains(name).await {
            return Err(WardenError::NotFound(name.to_string()));
        }

        let entry = self.entry(name).await;
        let removed = {
            let mut slot = entry.slot.lock().await;
            self.stop_locked(&mut slot, name).await;
            entry.publish(&slot);
            self.registry.deregister(name).await
        };

        self.entries.lock().await.remove(name);
        removed
    }

    /// Current observation, reaping an exited process when the lock is free
    async fn observe(&self, name: &str) -> Observation {
        let Some(entry) = self.existing_entry(name).await else {
            return Observation::default();
        };

        match entry.slot.try_lock() {
            Ok(mut slot) => {
                slot.reap();
                entry.publish(&slot);
            }
            Err(_) => debug!("Service {} is busy, using last observed state", name),
        }

        // The borrow guard must drop before `entry` does
        let observed = entry.observed.borrow().clone();
        observed
    }

    /// Process liveness only; never probes health
    pub async fn is_running(&self, name: &str) -> bool {
        self.observe(name).await.pid.is_some()
    }

    pub async fn running_count(&self) -> usize {
        let mut count = 0;
        for (name, _) in self.all_entries().await {
            if self.is_running(&name).await {
                count += 1;
            }
        }
        count
    }

    /// Observed status of one service, probing its health endpoint if running
    ///
    /// Blocks for at most the probe timeout.
    pub async fn status(&self, name: &str) -> Result<ServiceStatus> {
        let config = self
            .registry
            .get(name)
            .await
            .ok_or_else(|| WardenError::NotFound(name.to_string()))?;

        let observed = self.observe(name).await;

        let health = match (observed.pid, &config.health_check_url) {
            (None, _) => HealthState::Down,
            (Some(_), None) => HealthState::Unknown,
            (Some(_), Some(url)) => self.health.check(url).await,
        };

        Ok(ServiceStatus {
            name: config.name,
            state: if observed.pid.is_some() {
                LifecycleState::Running
            } else {
                LifecycleState::Stopped
            },
            pid: observed.pid,
            port: config.port,
            health,
            auto_restart: config.auto_restart,
            started_at: observed.started_at,
            last_exit_code: observed.last_exit_code,
            restarts: observed.restarts,
        })
    }

    /// Status of every registered service, in registry order
    pub async fn status_all(&self) -> Vec<ServiceStatus> {
        let mut statuses = Vec::new();
        for name in self.registry.names().await {
            match self.status(&name).await {
                Ok(status) => statuses.push(status),
                // Removed while we were iterating
                Err(WardenError::NotFound(_)) => {}
                Err(e) => warn!("Failed to get status of {}: {}", name, e),
            }
        }
        statuses
    }

    /// Most recent captured output lines of a service, oldest first
    pub async fn recent_output(&self, name: &str) -> Result<Vec<OutputLine>> {
        if !self.registry.contains(name).await {
            return Err(WardenError::NotFound(name.to_string()));
        }

        Ok(self
            .existing_entry(name)
            .await
            .map(|entry| entry.output.lines())
            .unwrap_or_default())
    }

    /// Stop every live process; returns how many were running
    pub async fn stop_all(&self) -> usize {
        let entries = self.all_entries().await;
        info!("Stopping {} service(s)", entries.len());

        let mut stopped = 0;
        for (name, entry) in entries {
            let mut slot = entry.slot.lock().await;
            if let StopOutcome::Stopped { .. } = self.stop_locked(&mut slot, &name).await {
                stopped += 1;
            }
            entry.publish(&slot);
        }
        stopped
    }
}
