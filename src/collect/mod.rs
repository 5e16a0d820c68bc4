//! Collectors refresh raw measurements in the registry on the reporter's
//! collection period.

pub mod process;

pub use process::ProcessMemoryCollector;

use crate::metrics::{Registry, View};

/// Pull-based source of measurements.
///
/// `collect` runs on the reporter's collection loop. A collector that
/// panics takes the whole loop down with it.
pub trait Collector: Send {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Views this collector records into. Registered once at reporter start.
    fn views(&self) -> Vec<View> {
        Vec::new()
    }

    /// Record fresh measurements into `registry`.
    fn collect(&mut self, registry: &Registry);
}
