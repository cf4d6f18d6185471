use crate::error::{Result, WardenError};
use crate::metrics::snapshot::{HostReadings, SystemSnapshot};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::Duration;
#[cfg(not(unix))]
use sysinfo::Disks;
use sysinfo::{
    CpuRefreshKind, MemoryRefreshKind, Networks, RefreshKind, System, MINIMUM_CPU_UPDATE_INTERVAL,
};

/// Host resource sampler
///
/// CPU utilization is measured across a window rather than read
/// instantaneously. Any subsystem that cannot be read fails the whole sample.
pub struct MetricsSampler {
    /// System information collector
    system: System,
    #[cfg(not(unix))]
    disks: Disks,
    networks: Networks,
    cpu_window: Duration,
    /// Path whose disk is reported
    disk_mount: PathBuf,
}

impl MetricsSampler {
    pub fn new(cpu_window: Duration, disk_mount: impl Into<PathBuf>) -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::new().with_cpu_usage())
                .with_memory(MemoryRefreshKind::new().with_ram()),
        );

        Self {
            system,
            #[cfg(not(unix))]
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
            cpu_window: cpu_window.max(MINIMUM_CPU_UPDATE_INTERVAL),
            disk_mount: disk_mount.into(),
        }
    }

    pub fn cpu_window(&self) -> Duration {
        self.cpu_window
    }

    /// Take a full snapshot; blocks for the CPU window
    pub async fn sample(&mut self, running_services: usize) -> Result<SystemSnapshot> {
        let readings = self.read_host().await?;
        Ok(SystemSnapshot::from_readings(
            Local::now(),
            &readings,
            running_services,
        ))
    }

    /// Read every subsystem
    pub async fn read_host(&mut self) -> Result<HostReadings> {
        let cpu_percent = self.read_cpu().await?;
        let (memory_used, memory_total) = self.read_memory()?;
        let (disk_used, disk_total) = self.read_disk()?;
        let (network_sent, network_recv) = self.read_network();

        Ok(HostReadings {
            cpu_percent,
            memory_used,
            memory_total,
            disk_used,
            disk_total,
            network_sent,
            network_recv,
        })
    }

    async fn read_cpu(&mut self) -> Result<f32> {
        self.system.refresh_cpu_usage();
        tokio::time::sleep(self.cpu_window).await;
        self.system.refresh_cpu_usage();

        if self.system.cpus().is_empty() {
            return Err(WardenError::MetricsUnavailable("cpu".to_string()));
        }

        let usage = self.system.global_cpu_usage();
        if !usage.is_finite() {
            return Err(WardenError::MetricsUnavailable("cpu".to_string()));
        }

        Ok(usage.clamp(0.0, 100.0))
    }

    fn read_memory(&mut self) -> Result<(u64, u64)> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return Err(WardenError::MetricsUnavailable("memory".to_string()));
        }

        Ok((self.system.used_memory().min(total), total))
    }

    #[cfg(unix)]
    fn read_disk(&mut self) -> Result<(u64, u64)> {
        use nix::sys::statvfs::statvfs;

        let stats = statvfs(self.disk_mount.as_path()).map_err(|e| {
            WardenError::MetricsUnavailable(format!("disk ({}): {}", self.disk_mount.display(), e))
        })?;

        let fragment = stats.fragment_size() as u64;
        let total = (stats.blocks() as u64).saturating_mul(fragment);
        if total == 0 {
            return Err(disk_unavailable(&self.disk_mount));
        }

        let used = (stats.blocks() as u64)
            .saturating_sub(stats.blocks_free() as u64)
            .saturating_mul(fragment);

        Ok((used, total))
    }

    #[cfg(not(unix))]
    fn read_disk(&mut self) -> Result<(u64, u64)> {
        self.disks.refresh_list();

        // The disk mounted at the longest prefix of the configured path
        let disk = self
            .disks
            .list()
            .iter()
            .filter(|disk| self.disk_mount.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .ok_or_else(|| disk_unavailable(&self.disk_mount))?;

        let total = disk.total_space();
        if total == 0 {
            return Err(disk_unavailable(&self.disk_mount));
        }

        Ok((total.saturating_sub(disk.available_space()), total))
    }

    fn read_network(&mut self) -> (u64, u64) {
        self.networks.refresh_list();

        self.networks
            .list()
            .values()
            .fold((0, 0), |(sent, recv), data| {
                (
                    sent + data.total_transmitted(),
                    recv + data.total_received(),
                )
            })
    }
}

fn disk_unavailable(mount: &Path) -> WardenError {
    WardenError::MetricsUnavailable(format!("disk ({})", mount.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_window_is_clamped() {
        let sampler = MetricsSampler::new(Duration::ZERO, "/");
        assert_eq!(sampler.cpu_window(), MINIMUM_CPU_UPDATE_INTERVAL);
    }

    #[tokio::test]
    async fn test_sample_reads_host() {
        let mut sampler = MetricsSampler::new(Duration::from_millis(250), "/");

        let snapshot = sampler.sample(3).await.unwrap();

        assert!((0.0..=100.0).contains(&snapshot.cpu_percent));
        assert!(snapshot.memory_total_gb > 0.0);
        assert!(snapshot.memory_used_gb <= snapshot.memory_total_gb);
        assert!(snapshot.disk_total_gb > 0.0);
        assert!((0.0..=100.0).contains(&snapshot.disk_percent));
        assert_eq!(snapshot.running_services, 3);
    }

    #[tokio::test]
    async fn test_missing_disk_fails_whole_sample() {
        let mut sampler = MetricsSampler::new(Duration::from_millis(100), "/nonexistent/mount");

        let result = sampler.sample(0).await;
        assert!(matches!(result, Err(WardenError::MetricsUnavailable(_))));
    }

    #[tokio::test]
    async fn test_sample_measures_over_window() {
        let mut sampler = MetricsSampler::new(Duration::from_millis(400), "/");
        let started = std::time::Instant::now();

        sampler.sample(0).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(400));
    }
}
