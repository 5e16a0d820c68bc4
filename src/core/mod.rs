//! Core types shared by every part of the pipeline.
//!
//! This module contains the error type, the configuration file model and
//! the in-memory metric model handed over by the aggregation layer.

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder, ExporterSpec, LogLevel};
pub use error::{ReporterError, Result};
pub use types::{
    Bucket, Descriptor, Distribution, Exemplar, LabelKey, LabelValue, Metric, MetricType,
    PercentileValue, Point, Resource, Snapshot, Summary, TimeSeries, Value,
};
