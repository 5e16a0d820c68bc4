//! Metric aggregation.
//!
//! Exporter agents pull snapshots through [`MetricReader`]; collectors push
//! raw measurements into a [`Registry`], which aggregates them per
//! registered [`View`].

pub mod registry;
pub mod view;

pub use registry::Registry;
pub use view::{Aggregation, ValueKind, View};

use crate::core::Metric;

/// Pull interface over the aggregation layer.
pub trait MetricReader: Send + Sync {
    /// Current snapshot of every metric with data.
    fn read(&self) -> Vec<Metric>;
}
