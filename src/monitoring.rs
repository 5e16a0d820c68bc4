//! Export health counters.
//!
//! Every exporter agent owns one [`ExportStats`]. Backends that know more
//! than "the cycle succeeded" (the broker backend tracks deliveries and
//! queue drops) hand their own instance to the agent so the numbers end up
//! in one place.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Overall state of an export pipeline, derived from its counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportHealth {
    /// Nothing exported yet.
    Idle,
    /// Last cycles succeeded and nothing was lost.
    Healthy,
    /// Some deliveries failed or messages were dropped.
    Degraded,
    /// No cycle has succeeded.
    Failing,
}

impl ExportHealth {
    /// Lowercase label for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportHealth::Idle => "idle",
            ExportHealth::Healthy => "healthy",
            ExportHealth::Degraded => "degraded",
            ExportHealth::Failing => "failing",
        }
    }
}

/// Lock-free counters updated from the export loop and delivery tasks.
#[derive(Debug, Default)]
pub struct ExportStats {
    cycles_ok: AtomicU64,
    cycles_failed: AtomicU64,
    delivered: AtomicU64,
    delivery_failed: AtomicU64,
    last_dropped: AtomicI64,
    dropped_total: AtomicU64,
}

/// Point-in-time copy of [`ExportStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStatsSnapshot {
    /// Export cycles that completed.
    pub cycles_ok: u64,
    /// Export cycles that returned an error.
    pub cycles_failed: u64,
    /// Messages the broker acknowledged.
    pub delivered: u64,
    /// Messages the broker rejected or timed out.
    pub delivery_failed: u64,
    /// Unacknowledged message count reported by the broker client at the last flush.
    pub last_dropped: i64,
    /// Sum of the positive per-cycle drop deltas.
    pub dropped_total: u64,
}

impl ExportStats {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished export cycle.
    pub fn record_cycle(&self, ok: bool) {
        if ok {
            self.cycles_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count one delivery report.
    pub fn record_delivery(&self, ok: bool) {
        if ok {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.delivery_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Store the outstanding count and add the positive delta to the total.
    pub fn record_dropped(&self, outstanding: i64, delta: i64) {
        self.last_dropped.store(outstanding, Ordering::Relaxed);
        if delta > 0 {
            self.dropped_total.fetch_add(delta.unsigned_abs(), Ordering::Relaxed);
        }
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> ExportStatsSnapshot {
        ExportStatsSnapshot {
            cycles_ok: self.cycles_ok.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            delivery_failed: self.delivery_failed.load(Ordering::Relaxed),
            last_dropped: self.last_dropped.load(Ordering::Relaxed),
            dropped_total: self.dropped_total.load(Ordering::Relaxed),
        }
    }

    /// Health derived from the current counters.
    pub fn health(&self) -> ExportHealth {
        self.snapshot().health()
    }
}

impl ExportStatsSnapshot {
    /// Health derived from these counters.
    pub fn health(&self) -> ExportHealth {
        if self.cycles_ok == 0 && self.cycles_failed == 0 {
            ExportHealth::Idle
        } else if self.cycles_ok == 0 {
            ExportHealth::Failing
        } else if self.cycles_failed > 0 || self.delivery_failed > 0 || self.dropped_total > 0 {
            ExportHealth::Degraded
        } else {
            ExportHealth::Healthy
        }
    }
}
