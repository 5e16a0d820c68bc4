//! `opencensus.proto.agent.metrics.v1`

use super::metrics::Metric;
use super::resource::Resource;

/// Batch envelope POSTed by the HTTP exporter.
///
/// Field 1 (`node`) is never populated by this crate and is not declared;
/// decoders skip it.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExportMetricsServiceRequest {
    /// Metrics in the batch.
    #[prost(message, repeated, tag = "2")]
    pub metrics: Vec<Metric>,
    /// Default resource for metrics that carry none.
    #[prost(message, optional, tag = "3")]
    pub resource: Option<Resource>,
}
