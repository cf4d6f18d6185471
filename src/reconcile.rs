// Reconciliation - Restart auto-restart services whose process is gone

use crate::process::{ProcessSupervisor, StartOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Outcome of a single reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Services with auto-restart enabled that were inspected
    pub checked: usize,
    /// Services found stopped and started again
    pub restarted: Vec<String>,
    /// Services whose start failed, with the error message
    pub failed: Vec<(String, String)>,
}

/// Periodic task driving observed state toward the registry
///
/// Only process liveness is considered; health probe results never trigger
/// a restart.
pub struct ReconciliationLoop {
    supervisor: Arc<ProcessSupervisor>,
    period: Duration,
}

impl ReconciliationLoop {
    pub fn new(supervisor: Arc<ProcessSupervisor>, period: Duration) -> Self {
        Self { supervisor, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// One pass over every auto-restart service
    ///
    /// A failure to start one service is logged and does not affect the rest.
    pub async fn run_once(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for config in self.supervisor.registry().list().await {
            if !config.auto_restart {
                continue;
            }
            report.checked += 1;

            if self.supervisor.is_running(&config.name).await {
                continue;
            }

            match self.supervisor.start(&config.name).await {
                Ok(StartOutcome::Started { pid }) => {
                    info!("Auto-restarted service {} (PID: {})", config.name, pid);
                    report.restarted.push(config.name);
                }
                Ok(StartOutcome::AlreadyRunning { .. }) => {
                    debug!("Service {} came back before reconciliation", config.name);
                }
                Err(e) => {
                    error!("Failed to auto-restart service {}: {}", config.name, e);
                    report.failed.push((config.name, e.to_string()));
                }
            }
        }

        report
    }

    /// Run passes every period until `shutdown` is cancelled
    ///
    /// The first pass runs immediately, bringing up auto-restart services at
    /// launch. A pass in flight when shutdown arrives is abandoned.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting reconciliation loop (interval: {:?})", self.period);

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                report = self.run_once() => {
                    if !report.restarted.is_empty() || !report.failed.is_empty() {
                        info!(
                            "Reconciliation pass: {} checked, {} restarted, {} failed",
                            report.checked,
                            report.restarted.len(),
                            report.failed.len()
                        );
                    }
                }
            }
        }

        info!("Reconciliation loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::process::SupervisorOptions;
    use crate::registry::ServiceRegistry;
    use crate::store::JsonFileStore;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        supervisor: Arc<ProcessSupervisor>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let registry = Arc::new(ServiceRegistry::open(JsonFileStore::new(
                dir.path().join("services.json"),
            )));
            let options = SupervisorOptions {
                stop_grace: Duration::from_secs(2),
                restart_delay: Duration::from_millis(50),
                probe_timeout: Duration::from_secs(1),
                output_lines: 20,
            };
            let supervisor = Arc::new(ProcessSupervisor::new(registry, options).unwrap());
            Self { dir, supervisor }
        }

        async fn register(&self, name: &str, command: &str, auto_restart: bool) {
            let config = ServiceConfig::new(name, self.dir.path(), 8000, command)
                .with_auto_restart(auto_restart);
            self.supervisor.registry().register(config).await.unwrap();
        }

        fn reconciler(&self) -> ReconciliationLoop {
            ReconciliationLoop::new(Arc::clone(&self.supervisor), Duration::from_millis(100))
        }
    }

    async fn wait_until_stopped(supervisor: &ProcessSupervisor, name: &str) {
        for _ in 0..100 {
            if !supervisor.is_running(name).await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("service {} never exited", name);
    }

    #[tokio::test]
    async fn test_restarts_stopped_auto_restart_service() {
        let fixture = Fixture::new();
        fixture.register("api", "sleep 30", true).await;

        let report = fixture.reconciler().run_once().await;

        assert_eq!(report.checked, 1);
        assert_eq!(report.restarted, vec!["api".to_string()]);
        assert!(fixture.supervisor.is_running("api").await);

        fixture.supervisor.stop_all().await;
    }

    #[tokio::test]
    async fn test_ignores_services_without_auto_restart() {
        let fixture = Fixture::new();
        fixture.register("manual", "sleep 30", false).await;

        let report = fixture.reconciler().run_once().await;

        assert_eq!(report.checked, 0);
        assert!(report.restarted.is_empty());
        assert!(!fixture.supervisor.is_running("manual").await);
    }

    #[tokio::test]
    async fn test_running_service_is_left_alone() {
        let fixture = Fixture::new();
        fixture.register("api", "sleep 30", true).await;
        let pid = fixture.supervisor.start("api").await.unwrap().pid();

        let report = fixture.reconciler().run_once().await;

        assert_eq!(report.checked, 1);
        assert!(report.restarted.is_empty());
        assert_eq!(fixture.supervisor.status("api").await.unwrap().pid, Some(pid));

        fixture.supervisor.stop_all().await;
    }

    #[tokio::test]
    async fn test_exiting_service_keeps_coming_back() {
        let fixture = Fixture::new();
        fixture.register("echo", "echo hello", true).await;
        let reconciler = fixture.reconciler();

        for _ in 0..3 {
            let report = reconciler.run_once().await;
            assert_eq!(report.restarted, vec!["echo".to_string()]);
            wait_until_stopped(&fixture.supervisor, "echo").await;
        }

        let status = fixture.supervisor.status("echo").await.unwrap();
        assert_eq!(status.restarts, 2);
        assert_eq!(status.last_exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_failure_does_not_block_other_services() {
        let fixture = Fixture::new();
        fixture.register("broken", "/nonexistent/binary", true).await;
        fixture.register("healthy", "sleep 30", true).await;

        let report = fixture.reconciler().run_once().await;

        assert_eq!(report.checked, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "broken");
        assert_eq!(report.restarted, vec!["healthy".to_string()]);

        fixture.supervisor.stop_all().await;
    }

    #[tokio::test]
    async fn test_run_exits_on_cancel() {
        let fixture = Fixture::new();
        fixture.register("api", "sleep 30", true).await;

        let token = CancellationToken::new();
        let task = tokio::spawn(fixture.reconciler().run(token.clone()));

        for _ in 0..50 {
            if fixture.supervisor.is_running("api").await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(fixture.supervisor.is_running("api").await);

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("loop did not exit")
            .unwrap();

        fixture.supervisor.stop_all().await;
    }
}
