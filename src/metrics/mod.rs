// Metrics module - Host resource sampling and bounded history

mod history;
mod sampler;
mod snapshot;

pub use history::{HistorySummary, MetricsHistory, DEFAULT_HISTORY_CAPACITY};
pub use sampler::MetricsSampler;
pub use snapshot::{HostReadings, SystemSnapshot};

use crate::process::ProcessSupervisor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodic sampling task
///
/// Appends one snapshot per period until `shutdown` is cancelled. A failed
/// sample is logged and retried on the next period. An in-flight sample is
/// abandoned on shutdown.
pub async fn run_sampler(
    mut sampler: MetricsSampler,
    history: Arc<MetricsHistory>,
    supervisor: Arc<ProcessSupervisor>,
    period: Duration,
    shutdown: CancellationToken,
) {
    info!("Starting metrics sampler (interval: {:?})", period);
    history.set_sampling(true);

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        let running = supervisor.running_count().await;

        tokio::select! {
            _ = shutdown.cancelled() => break,
            result = sampler.sample(running) => match result {
                Ok(snapshot) => {
                    debug!(
                        "Sampled host: cpu {:.1}%, memory {:.1}%, disk {:.1}%",
                        snapshot.cpu_percent, snapshot.memory_percent, snapshot.disk_percent
                    );
                    history.append(snapshot).await;
                }
                Err(e) => warn!("Metrics sample failed: {}", e),
            }
        }
    }

    history.set_sampling(false);
    info!("Metrics sampler stopped");
}
