//! Process memory collector.

use super::Collector;
use crate::metrics::{Aggregation, Registry, ValueKind, View};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Measure recorded by [`ProcessMemoryCollector`].
pub const ALLOC_MEASURE: &str = "alloc";
/// View exporting [`ALLOC_MEASURE`] as a gauge.
pub const ALLOC_VIEW: &str = "allocView";

/// Records the resident set size of this process, in bytes.
///
/// Reads `VmRSS` from `/proc/self/status`; on platforms without procfs
/// nothing is recorded.
pub struct ProcessMemoryCollector {
    status_path: PathBuf,
}

impl Default for ProcessMemoryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessMemoryCollector {
    /// Collector reading this process's procfs status.
    pub fn new() -> Self {
        Self::with_status_path("/proc/self/status")
    }

    /// Read a different status file (tests).
    pub fn with_status_path(path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: path.into(),
        }
    }

    fn resident_bytes(&self) -> Option<u64> {
        let status = fs::read_to_string(&self.status_path).ok()?;
        parse_vm_rss(&status)
    }
}

/// Extract `VmRSS` (reported in kB) from a procfs status file, in bytes.
pub fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let mut fields = line["VmRSS:".len()..].split_whitespace();
    let value: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") | None => Some(value * 1024),
        Some(_) => None,
    }
}

impl Collector for ProcessMemoryCollector {
    fn name(&self) -> &str {
        "process_memory"
    }

    fn views(&self) -> Vec<View> {
        vec![View::new(ALLOC_VIEW, ALLOC_MEASURE, Aggregation::LastValue, ValueKind::Int64)
            .description("view for allocated bytes")
            .unit("By")]
    }

    fn collect(&mut self, registry: &Registry) {
        match self.resident_bytes() {
            Some(bytes) => {
                registry.record_int(ALLOC_MEASURE, i64::try_from(bytes).unwrap_or(i64::MAX), &[])
            },
            None => debug!(path = %self.status_path.display(), "Resident memory unavailable"),
        }
    }
}
