use chrono::{DateTime, Local};
use serde::Serialize;

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// Raw host figures, in bytes, read at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HostReadings {
    /// CPU utilization over the sampling window, 0-100
    pub cpu_percent: f32,
    pub memory_used: u64,
    pub memory_total: u64,
    pub disk_used: u64,
    pub disk_total: u64,
    /// Cumulative bytes sent across all interfaces
    pub network_sent: u64,
    /// Cumulative bytes received across all interfaces
    pub network_recv: u64,
}

/// Point-in-time host resource snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSnapshot {
    pub timestamp: DateTime<Local>,
    pub cpu_percent: f32,
    pub memory_percent: f64,
    pub memory_used_gb: f64,
    pub memory_total_gb: f64,
    pub disk_percent: f64,
    pub disk_used_gb: f64,
    pub disk_total_gb: f64,
    pub network_sent_mb: f64,
    pub network_recv_mb: f64,
    pub network_bytes_sent: u64,
    pub network_bytes_recv: u64,
    pub running_services: usize,
}

impl SystemSnapshot {
    /// Convert raw readings using binary units
    pub fn from_readings(
        timestamp: DateTime<Local>,
        readings: &HostReadings,
        running_services: usize,
    ) -> Self {
        Self {
            timestamp,
            cpu_percent: readings.cpu_percent,
            memory_percent: percent(readings.memory_used, readings.memory_total),
            memory_used_gb: readings.memory_used as f64 / GIB,
            memory_total_gb: readings.memory_total as f64 / GIB,
            disk_percent: percent(readings.disk_used, readings.disk_total),
            disk_used_gb: readings.disk_used as f64 / GIB,
            disk_total_gb: readings.disk_total as f64 / GIB,
            network_sent_mb: readings.network_sent as f64 / MIB,
            network_recv_mb: readings.network_recv as f64 / MIB,
            network_bytes_sent: readings.network_sent,
            network_bytes_recv: readings.network_recv,
            running_services,
        }
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}
