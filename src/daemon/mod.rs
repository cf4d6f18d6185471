// Daemon module - Wires the registry, supervisor and background tasks together

use crate::config::{ServiceConfig, WardenSettings};
use crate::error::{Result, WardenError};
use crate::metrics::{run_sampler, HistorySummary, MetricsHistory, MetricsSampler};
use crate::process::{
    OutputLine, ProcessSupervisor, ServiceStatus, StartOutcome, StopOutcome, SupervisorOptions,
};
use crate::reconcile::ReconciliationLoop;
use crate::registry::ServiceRegistry;
use crate::store::{JsonFileStore, ServiceStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Supervision engine plus its two periodic background tasks
///
/// The control surface calls straight into the supervisor; the sampler and
/// the reconciler run on their own tasks until [`Daemon::shutdown`].
pub struct Daemon {
    settings: WardenSettings,
    registry: Arc<ServiceRegistry>,
    supervisor: Arc<ProcessSupervisor>,
    history: Arc<MetricsHistory>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Daemon {
    /// Open the registry stored at `settings.store_path`
    pub fn new(settings: WardenSettings) -> Result<Self> {
        let store = JsonFileStore::new(&settings.store_path);
        Self::with_store(settings, store)
    }

    pub fn with_store<S: ServiceStore + 'static>(
        settings: WardenSettings,
        store: S,
    ) -> Result<Self> {
        settings.validate()?;

        let registry = Arc::new(ServiceRegistry::open(store));
        let supervisor = Arc::new(ProcessSupervisor::new(
            Arc::clone(&registry),
            SupervisorOptions::from(&settings),
        )?);
        let history = Arc::new(MetricsHistory::new(settings.history_capacity));

        Ok(Self {
            settings,
            registry,
            supervisor,
            history,
            shutdown: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }

    pub fn settings(&self) -> &WardenSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn history(&self) -> &Arc<MetricsHistory> {
        &self.history
    }

    /// Token cancelled when shutdown begins
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_launched(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Spawn the metrics sampler and the reconciliation loop
    pub fn launch(&mut self) -> Result<()> {
        if self.is_launched() {
            return Ok(());
        }
        if self.shutdown.is_cancelled() {
            return Err(WardenError::Other("Daemon has already been shut down".to_string()));
        }

        info!(
            "Launching background tasks (store: {})",
            self.settings.store_path.display()
        );

        let sampler = MetricsSampler::new(self.settings.cpu_window(), &self.settings.disk_mount);
        self.tasks.push(tokio::spawn(run_sampler(
            sampler,
            Arc::clone(&self.history),
            Arc::clone(&self.supervisor),
            self.settings.sample_interval(),
            self.shutdown.clone(),
        )));

        let reconciler = ReconciliationLoop::new(
            Arc::clone(&self.supervisor),
            self.settings.reconcile_interval(),
        );
        self.tasks.push(tokio::spawn(reconciler.run(self.shutdown.clone())));

        Ok(())
    }

    /// Insert or replace a service definition
    pub async fn register(&self, config: ServiceConfig) -> Result<()> {
        self.registry.register(config).await
    }

    /// Stop the service if running, then remove its definition
    pub async fn deregister(&self, name: &str) -> Result<ServiceConfig> {
        self.supervisor.deregister(name).await
    }

    pub async fn start(&self, name: &str) -> Result<StartOutcome> {
        self.supervisor.start(name).await
    }

    pub async fn stop(&self, name: &str) -> Result<StopOutcome> {
        self.supervisor.stop(name).await
    }

    pub async fn restart(&self, name: &str) -> Result<StartOutcome> {
        self.supervisor.restart(name).await
    }

    pub async fn status(&self, name: &str) -> Result<ServiceStatus> {
        self.supervisor.status(name).await
    }

    pub async fn status_all(&self) -> Vec<ServiceStatus> {
        self.supervisor.status_all().await
    }

    pub async fn recent_output(&self, name: &str) -> Result<Vec<OutputLine>> {
        self.supervisor.recent_output(name).await
    }

    pub async fn history_summary(&self) -> Option<HistorySummary> {
        self.history.summary().await
    }

    /// Cancel both background tasks, wait for them to exit, then stop every
    /// live process
    ///
    /// Returns the number of processes that were stopped.
    pub async fn shutdown(&mut self) -> usize {
        info!("Shutting down warden...");
        self.shutdown.cancel();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("Background task ended abnormally: {}", e);
            }
        }

        let stopped = self.supervisor.stop_all().await;
        info!("Shutdown complete ({} service(s) stopped)", stopped);
        stopped
    }

    /// Resolve on the first SIGINT or SIGTERM
    #[cfg(unix)]
    pub async fn wait_for_signal() -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| WardenError::Signal(format!("Failed to install SIGTERM handler: {}", e)))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| WardenError::Signal(format!("Failed to install SIGINT handler: {}", e)))?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }

        Ok(())
    }

    /// Resolve on the first Ctrl+C
    #[cfg(not(unix))]
    pub async fn wait_for_signal() -> Result<()> {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| WardenError::Signal(format!("Failed to listen for Ctrl+C: {}", e)))?;
        info!("Received Ctrl+C");
        Ok(())
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_settings(dir: &TempDir) -> WardenSettings {
        WardenSettings {
            store_path: dir.path().join("apis_config.json"),
            sample_interval_secs: 1,
            reconcile_interval_secs: 1,
            cpu_window_ms: 100,
            stop_grace_secs: 2,
            restart_delay_secs: 0,
            probe_timeout_secs: 1,
            ..WardenSettings::default()
        }
    }

    #[tokio::test]
    async fn test_launch_starts_auto_restart_services() {
        let dir = TempDir::new().unwrap();
        let mut daemon = Daemon::new(test_settings(&dir)).unwrap();
        daemon
            .register(ServiceConfig::new("api", dir.path(), 8000, "sleep 30"))
            .await
            .unwrap();

        daemon.launch().unwrap();
        assert!(daemon.is_launched());

        let mut running = false;
        for _ in 0..100 {
            if daemon.supervisor().is_running("api").await {
                running = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(running);

        assert_eq!(daemon.shutdown().await, 1);
        assert!(!daemon.supervisor().is_running("api").await);
        assert!(!daemon.history().is_sampling());
    }

    #[tokio::test]
    async fn test_launch_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut daemon = Daemon::new(test_settings(&dir)).unwrap();

        daemon.launch().unwrap();
        daemon.launch().unwrap();
        assert_eq!(daemon.tasks.len(), 2);

        daemon.shutdown().await;
        assert!(!daemon.is_launched());
        assert!(daemon.launch().is_err());
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let dir = TempDir::new().unwrap();
        let settings = WardenSettings {
            history_capacity: 0,
            ..test_settings(&dir)
        };
        assert!(Daemon::new(settings).is_err());
    }

    #[tokio::test]
    async fn test_registrations_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let daemon = Daemon::new(test_settings(&dir)).unwrap();
            daemon
                .register(ServiceConfig::new("api", dir.path(), 8000, "sleep 30"))
                .await
                .unwrap();
        }

        let daemon = Daemon::new(test_settings(&dir)).unwrap();
        assert!(daemon.registry().contains("api").await);
    }
}
