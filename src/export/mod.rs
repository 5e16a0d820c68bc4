//! Metric export backends and the agent that drives them.
//!
//! Every backend implements [`Exporter`]. An [`ExporterAgent`] owns exactly
//! one backend and calls it on a fixed interval with the latest snapshot
//! from a [`crate::metrics::MetricReader`].

pub mod agent;
pub mod convert;
pub mod filter;
pub mod http;
pub mod kafka;
pub mod resource;
pub mod stdout;

pub use agent::ExporterAgent;
pub use filter::MetricFilter;
pub use http::HttpExporter;
pub use kafka::{KafkaExporter, TopicConfig};
pub use resource::{default_detector, ResourceDetector};
pub use stdout::StdoutExporter;

use crate::core::{Metric, Result};
use crate::monitoring::ExportStats;
use std::sync::Arc;
use std::time::Duration;

/// Settings shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Regular expression a metric name must match to be exported.
    pub include_filter: String,
    /// Interval between export cycles.
    pub reporting_period: Duration,
}

impl ExportConfig {
    /// Config with the given filter and period.
    pub fn new(include_filter: impl Into<String>, reporting_period: Duration) -> Self {
        Self {
            include_filter: include_filter.into(),
            reporting_period,
        }
    }
}

/// A delivery backend.
///
/// `export_metrics` takes `&mut self`: the agent never runs two cycles into
/// the same backend at once, so backends may keep cycle-to-cycle state
/// without their own locking.
#[async_trait::async_trait]
pub trait Exporter: Send {
    /// Backend name used in logs.
    fn name(&self) -> &str;

    /// Run one export cycle over a full snapshot.
    async fn export_metrics(&mut self, metrics: &[Metric]) -> Result<()>;

    /// Release backend resources. Must be safe to call more than once.
    async fn stop(&mut self) {}

    /// Counters maintained by the backend itself, if any.
    fn stats(&self) -> Option<Arc<ExportStats>> {
        None
    }
}
