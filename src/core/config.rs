//! Configuration management for the reporter.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Per-exporter settings with inherited reporting periods
//! - Validation and defaults

use crate::core::{ReporterError, Result};
use crate::export::filter::MetricFilter;
use crate::export::kafka::{TopicConfig, DEFAULT_FLUSH_TIMEOUT};
use crate::export::ExportConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Complete configuration for the reporter process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How often collectors refresh the registry
    #[serde(with = "humantime_serde")]
    pub collect_period: Duration,
    /// Default export interval for exporters without their own
    #[serde(with = "humantime_serde")]
    pub reporting_period: Duration,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Built-in collectors
    pub collectors: CollectorsConfig,
    /// Export backends
    pub exporters: Vec<ExporterSpec>,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
}

/// Built-in collector switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorsConfig {
    /// Record the process resident memory
    pub process_memory: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-message delivery reports
    Trace,
    /// Per-cycle details
    Debug,
    /// Lifecycle events
    Info,
    /// Failed cycles and dropped messages
    Warn,
    /// Failures that stop a component
    Error,
}

/// One export backend as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExporterSpec {
    /// Human-readable lines on stdout
    Stdout(StdoutSpec),
    /// Protobuf batch POSTed to an HTTP endpoint
    Http(HttpSpec),
    /// One protobuf message per metric on a Kafka topic
    Kafka(KafkaSpec),
}

/// Stdout exporter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdoutSpec {
    /// Regex selecting the metrics to export
    #[serde(default = "default_include_filter")]
    pub include_filter: String,
    /// Export period, defaults to the top-level reporting period
    #[serde(default, with = "humantime_serde")]
    pub reporting_period: Option<Duration>,
}

/// HTTP exporter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSpec {
    /// Endpoint URL the batch is POSTed to
    pub address: String,
    /// Basic auth user name
    #[serde(default)]
    pub api_key: String,
    /// Basic auth password
    #[serde(default)]
    pub api_secret: String,
    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Regex selecting the metrics to export
    #[serde(default = "default_include_filter")]
    pub include_filter: String,
    /// Export period, defaults to the top-level reporting period
    #[serde(default, with = "humantime_serde")]
    pub reporting_period: Option<Duration>,
}

/// Kafka exporter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaSpec {
    /// librdkafka client properties, e.g. `bootstrap.servers`
    pub brokers: BTreeMap<String, String>,
    /// Destination topic
    pub topic: TopicConfig,
    /// Bound on the end-of-cycle flush
    #[serde(default = "default_flush_timeout", with = "humantime_serde")]
    pub flush_timeout: Duration,
    /// Regex selecting the metrics to export
    #[serde(default = "default_include_filter")]
    pub include_filter: String,
    /// Export period, defaults to the top-level reporting period
    #[serde(default, with = "humantime_serde")]
    pub reporting_period: Option<Duration>,
}

fn default_include_filter() -> String {
    ".*".to_string()
}

fn default_flush_timeout() -> Duration {
    DEFAULT_FLUSH_TIMEOUT
}

impl Default for Config {
    fn default() -> Self {
        Config {
            collect_period: Duration::from_secs(10),
            reporting_period: Duration::from_secs(60),
            logging: LoggingConfig::default(),
            collectors: CollectorsConfig::default(),
            exporters: Vec::new(),
            debug: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
        }
    }
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        CollectorsConfig {
            process_memory: true,
        }
    }
}

impl ExporterSpec {
    /// Backend name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ExporterSpec::Stdout(_) => "stdout",
            ExporterSpec::Http(_) => "http",
            ExporterSpec::Kafka(_) => "kafka",
        }
    }

    /// Configured include filter
    pub fn include_filter(&self) -> &str {
        match self {
            ExporterSpec::Stdout(s) => &s.include_filter,
            ExporterSpec::Http(s) => &s.include_filter,
            ExporterSpec::Kafka(s) => &s.include_filter,
        }
    }

    /// Configured period, if any
    pub fn reporting_period(&self) -> Option<Duration> {
        match self {
            ExporterSpec::Stdout(s) => s.reporting_period,
            ExporterSpec::Http(s) => s.reporting_period,
            ExporterSpec::Kafka(s) => s.reporting_period,
        }
    }

    /// Agent configuration, inheriting `default_period` when unset
    pub fn export_config(&self, default_period: Duration) -> ExportConfig {
        ExportConfig::new(
            self.include_filter(),
            self.reporting_period().unwrap_or(default_period),
        )
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.collect_period.is_zero() {
            return Err(ReporterError::config("collect_period must be greater than 0"));
        }

        if self.reporting_period.is_zero() {
            return Err(ReporterError::config("reporting_period must be greater than 0"));
        }

        for (idx, exporter) in self.exporters.iter().enumerate() {
            MetricFilter::new(exporter.include_filter())?;

            if exporter.reporting_period().is_some_and(|p| p.is_zero()) {
                return Err(ReporterError::config(format!(
                    "exporter #{} ({}): reporting_period must be greater than 0",
                    idx,
                    exporter.kind()
                )));
            }

            match exporter {
                ExporterSpec::Stdout(_) => {},
                ExporterSpec::Http(spec) => {
                    if spec.address.trim().is_empty() {
                        return Err(ReporterError::config(format!(
                            "exporter #{idx} (http): address must not be empty"
                        )));
                    }
                },
                ExporterSpec::Kafka(spec) => {
                    if spec.topic.name.trim().is_empty() {
                        return Err(ReporterError::config(format!(
                            "exporter #{idx} (kafka): topic name must not be empty"
                        )));
                    }
                    if !spec.brokers.contains_key("bootstrap.servers") {
                        return Err(ReporterError::config(format!(
                            "exporter #{idx} (kafka): brokers must set bootstrap.servers"
                        )));
                    }
                    if spec.flush_timeout.is_zero() {
                        return Err(ReporterError::config(format!(
                            "exporter #{idx} (kafka): flush_timeout must be greater than 0"
                        )));
                    }
                },
            }
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        let debug = self.config.debug;
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| ReporterError::config(format!("Failed to parse YAML config: {}", e)))?;
        self.config.debug = debug;
        Ok(self)
    }

    /// Load configuration from a YAML file
    pub fn from_file(self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReporterError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        self.from_yaml(&content)
    }

    /// Set collection period
    pub fn collect_period(mut self, period: Duration) -> Self {
        self.config.collect_period = period;
        self
    }

    /// Set default reporting period
    pub fn reporting_period(mut self, period: Duration) -> Self {
        self.config.reporting_period = period;
        self
    }

    /// Add an exporter
    pub fn exporter(mut self, spec: ExporterSpec) -> Self {
        self.config.exporters.push(spec);
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
