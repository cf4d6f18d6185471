use crate::metrics::snapshot::SystemSnapshot;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Default number of snapshots retained
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Newest snapshot plus history bookkeeping
#[derive(Debug, Clone, Serialize)]
pub struct HistorySummary {
    pub current: SystemSnapshot,
    pub history_count: usize,
    pub monitoring_active: bool,
}

/// Bounded rolling buffer of host snapshots
///
/// Appends evict the oldest snapshot once capacity is reached. Readers see
/// the buffer either before or after an append, never in between.
pub struct MetricsHistory {
    snapshots: RwLock<VecDeque<SystemSnapshot>>,
    capacity: usize,
    sampling: AtomicBool,
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            sampling: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn append(&self, snapshot: SystemSnapshot) {
        let mut snapshots = self.snapshots.write().await;
        while snapshots.len() >= self.capacity {
            snapshots.pop_front();
        }
        snapshots.push_back(snapshot);
    }

    pub async fn latest(&self) -> Option<SystemSnapshot> {
        self.snapshots.read().await.back().cloned()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }

    /// The newest `n` snapshots, oldest first
    pub async fn recent(&self, n: usize) -> Vec<SystemSnapshot> {
        let snapshots = self.snapshots.read().await;
        let skip = snapshots.len().saturating_sub(n);
        snapshots.iter().skip(skip).cloned().collect()
    }

    /// `None` until the first snapshot arrives
    pub async fn summary(&self) -> Option<HistorySummary> {
        let snapshots = self.snapshots.read().await;
        snapshots.back().map(|current| HistorySummary {
            current: current.clone(),
            history_count: snapshots.len(),
            monitoring_active: self.is_sampling(),
        })
    }

    pub fn set_sampling(&self, active: bool) {
        self.sampling.store(active, Ordering::SeqCst);
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling.load(Ordering::SeqCst)
    }
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
