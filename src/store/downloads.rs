use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Snapshot of resume download activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadStats {
    pub total: u64,
    pub last_download: Option<DateTime<Utc>>,
}

/// Counts served resume downloads
#[derive(Debug, Default)]
pub struct DownloadTracker {
    stats: Mutex<DownloadStats>,
}

impl DownloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one download at `at` and return the updated stats
    pub fn record(&self, at: DateTime<Utc>) -> DownloadStats {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.total = stats.total.saturating_add(1);
        stats.last_download = Some(at);
        *stats
    }

    pub fn stats(&self) -> DownloadStats {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}
