//! Error types for the reporter.

use thiserror::Error;

/// Errors produced while configuring, collecting or exporting.
#[derive(Error, Debug)]
pub enum ReporterError {
    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Include filter that is not a valid regular expression.
    #[error("Invalid include filter '{pattern}': {source}")]
    InvalidFilter {
        /// Pattern as configured.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// Metric whose shape breaks the model's invariants.
    #[error("Invalid metric '{metric}': {reason}")]
    InvalidMetric {
        /// Metric name.
        metric: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Wire point carrying a value the model cannot represent.
    #[error("Unsupported value type: {0}")]
    UnsupportedValueType(String),

    /// Protobuf encoding failure.
    #[error("Protobuf encode error: {0}")]
    Encode(#[from] prost::EncodeError),

    /// Protobuf decoding failure.
    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// HTTP transport failure or error status.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Broker client failure.
    #[error("Broker error: {0}")]
    Broker(String),

    /// A single message could not be queued.
    #[error("Failed to produce message to topic '{topic}': {reason}")]
    Produce {
        /// Destination topic.
        topic: String,
        /// Client error.
        reason: String,
    },

    /// Creating the destination topic failed for a reason other than it
    /// already existing.
    #[error("Topic creation failed for '{topic}': {reason}")]
    TopicCreation {
        /// Topic name.
        topic: String,
        /// Admin client error.
        reason: String,
    },

    /// Resource detection failed.
    #[error("Resource detection failed: {0}")]
    Resource(String),

    /// A different view is already registered under the same name.
    #[error("View registration conflict: {0}")]
    ViewConflict(String),

    /// An exporter agent could not start its periodic loop.
    #[error("Failed to start exporter agent: {0}")]
    AgentStart(String),

    /// A collector brought the collection loop down.
    #[error("Collector failure: {0}")]
    Collector(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Background task failed to complete.
    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias for reporter operations
pub type Result<T> = std::result::Result<T, ReporterError>;

impl ReporterError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new broker error
    pub fn broker<S: Into<String>>(msg: S) -> Self {
        Self::Broker(msg.into())
    }

    /// Creates a new resource detection error
    pub fn resource<S: Into<String>>(msg: S) -> Self {
        Self::Resource(msg.into())
    }

    /// Creates a new invalid metric error
    pub fn invalid_metric<M: Into<String>, R: Into<String>>(metric: M, reason: R) -> Self {
        Self::InvalidMetric {
            metric: metric.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the error only aborts the current export cycle.
    ///
    /// Everything else is a construction-time failure and is never retried.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Produce { .. } => true,
            Self::InvalidMetric { .. } | Self::UnsupportedValueType(_) | Self::Encode(_) => true,
            Self::Resource(_) | Self::Io(_) | Self::Join(_) => true,
            _ => false,
        }
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::InvalidFilter { .. } => "config",
            Self::InvalidMetric { .. } | Self::UnsupportedValueType(_) => "validation",
            Self::Encode(_) | Self::Decode(_) => "serialization",
            Self::Http(_) => "network",
            Self::Broker(_) | Self::Produce { .. } | Self::TopicCreation { .. } => "broker",
            Self::Resource(_) => "resource",
            Self::ViewConflict(_) => "registry",
            Self::AgentStart(_) => "lifecycle",
            Self::Collector(_) => "collect",
            Self::Io(_) => "io",
            Self::Join(_) => "async",
        }
    }
}
