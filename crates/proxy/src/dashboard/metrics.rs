//! Lock-free proxy counters.
//!
//! Session tasks bump these with relaxed atomic adds; the dashboard reads
//! them at its own pace.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::Instant;

pub struct Metrics {
    sessions_accepted: AtomicU64,
    sessions_rejected: AtomicU64,
    logins_failed: AtomicU64,
    transfers_completed: AtomicU64,
    transfers_failed: AtomicU64,

    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            sessions_accepted: AtomicU64::new(0),
            sessions_rejected: AtomicU64::new(0),
            logins_failed: AtomicU64::new(0),
            transfers_completed: AtomicU64::new(0),
            transfers_failed: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn session_accepted(&self) {
        self.sessions_accepted.fetch_add(1, Relaxed);
    }

    /// The client connected but no session could be created for it.
    pub fn session_rejected(&self) {
        self.sessions_rejected.fetch_add(1, Relaxed);
    }

    pub fn login_failed(&self) {
        self.logins_failed.fetch_add(1, Relaxed);
    }

    pub fn transfer_completed(&self) {
        self.transfers_completed.fetch_add(1, Relaxed);
    }

    pub fn transfer_failed(&self) {
        self.transfers_failed.fetch_add(1, Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            sessions_accepted: self.sessions_accepted.load(Relaxed),
            sessions_rejected: self.sessions_rejected.load(Relaxed),
            logins_failed: self.logins_failed.load(Relaxed),
            transfers_completed: self.transfers_completed.load(Relaxed),
            transfers_failed: self.transfers_failed.load(Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable snapshot of all counters at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: f64,
    pub sessions_accepted: u64,
    pub sessions_rejected: u64,
    pub logins_failed: u64,
    pub transfers_completed: u64,
    pub transfers_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = Metrics::new();
        metrics.session_accepted();
        metrics.session_accepted();
        metrics.session_rejected();
        metrics.transfer_failed();

        let snap = metrics.snapshot();
        assert_eq!(snap.sessions_accepted, 2);
        assert_eq!(snap.sessions_rejected, 1);
        assert_eq!(snap.logins_failed, 0);
        assert_eq!(snap.transfers_completed, 0);
        assert_eq!(snap.transfers_failed, 1);
    }
}
