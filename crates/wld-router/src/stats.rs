//! Dispatch statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of router dispatch counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WldStats {
    /// Number of transport calls made.
    pub sends: u64,
    /// Number of transport calls that succeeded.
    pub successes: u64,
    /// Number of transient transport failures.
    pub transient_failures: u64,
    /// Number of wildcard retries on another slot.
    pub failovers: u64,
    /// Number of wildcard sends that ran out of adapters.
    pub exhausted: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    sends: AtomicU64,
    successes: AtomicU64,
    transient_failures: AtomicU64,
    failovers: AtomicU64,
    exhausted: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn record_send(&self) {
        self.sends.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transient_failure(&self) {
        self.transient_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failover(&self) {
        self.failovers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> WldStats {
        WldStats {
            sends: self.sends.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
            failovers: self.failovers.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}
