//! Wire messages for the OpenCensus metrics protocol.
//!
//! Declared with `prost` derives instead of generated at build time; field
//! numbers match `opencensus/proto/metrics/v1/metrics.proto`,
//! `opencensus/proto/resource/v1/resource.proto` and
//! `opencensus/proto/agent/metrics/v1/metrics_service.proto`.

pub mod agent;
pub mod metrics;
pub mod resource;

pub use agent::ExportMetricsServiceRequest;
pub use metrics::Metric;
pub use resource::Resource;
