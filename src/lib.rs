//! Telemetry reporter - periodic metric export pipeline.
//!
//! Collectors record measurements into an in-process aggregation registry.
//! Exporter agents pull snapshots from it on their own reporting periods,
//! translate them to the OpenCensus wire format and hand them to a backend.
//!
//! # Features
//!
//! - **HTTP backend**: one protobuf batch POST per cycle with Basic auth
//! - **Kafka backend**: one message per metric, idempotent topic creation,
//!   delivery tracking and per-cycle drop accounting (`kafka` feature)
//! - **Stdout backend**: human-readable lines for local debugging
//! - **Single-flight scheduling**: export cycles of one backend never overlap
//!
//! # Architecture
//!
//! - `core`: errors, configuration and the metric model
//! - `proto`: OpenCensus wire messages
//! - `export`: filter, serializer, backends and the exporter agent
//! - `metrics`: aggregation registry and views
//! - `collect`: collectors
//! - `report`: the reporter tying collectors and agents together
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use telemetry_reporter::collect::ProcessMemoryCollector;
//! use telemetry_reporter::export::{ExportConfig, StdoutExporter};
//! use telemetry_reporter::report::{Reporter, ReporterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let export_config = ExportConfig::new(".*", Duration::from_secs(10));
//!     let reporter = Reporter::builder(ReporterConfig::default())
//!         .collector(Box::new(ProcessMemoryCollector::new()))
//!         .exporter(Box::new(StdoutExporter::new(&export_config)?), export_config)
//!         .start()
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     reporter.stop().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod collect;
pub mod core;
pub mod export;
pub mod metrics;
pub mod monitoring;
pub mod proto;
pub mod report;

// Re-export core types for convenience
pub use crate::core::{Config, Result};
