//! Command-line interface for the telemetry reporter.
//!
//! Loads the YAML configuration, builds the configured exporters and runs
//! the reporter until Ctrl-C.

use crate::collect::ProcessMemoryCollector;
use crate::core::config::ConfigBuilder;
use crate::core::{Config, ExporterSpec, ReporterError, Result};
use crate::export::{ExportConfig, Exporter, HttpExporter, StdoutExporter};
use crate::report::{Reporter, ReporterConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

/// Periodically collect process metrics and export them.
#[derive(Parser, Debug)]
#[command(name = "telemetry-reporter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/telemetry-reporter/config.yaml)
    #[arg(short, long, env = "TELEMETRY_REPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "TELEMETRY_REPORTER_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("telemetry-reporter").join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("~/.config/telemetry-reporter/config.yaml"))
    }

    /// Load the configuration file. An explicitly given file must exist;
    /// a missing default file means built-in defaults.
    pub fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let path = self.config.clone().unwrap_or_else(Self::default_config_path);
        if self.config.is_some() || path.exists() {
            builder = builder.from_file(&path)?;
        }

        builder.debug(self.debug).build()
    }

    /// Initialize logging. `RUST_LOG` wins over the configured level,
    /// `--debug` wins over both.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = if self.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_line_number(self.debug)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| ReporterError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Build one backend from its configuration entry.
pub async fn build_exporter(
    spec: &ExporterSpec,
    default_period: std::time::Duration,
) -> Result<(Box<dyn Exporter>, ExportConfig)> {
    let export_config = spec.export_config(default_period);

    let exporter: Box<dyn Exporter> = match spec {
        ExporterSpec::Stdout(_) => Box::new(StdoutExporter::new(&export_config)?),
        ExporterSpec::Http(http) => Box::new(
            HttpExporter::new(
                http.address.as_str(),
                http.api_key.as_str(),
                http.api_secret.as_str(),
                &export_config,
            )?
            .with_headers(&http.headers)?,
        ),
        #[cfg(feature = "kafka")]
        ExporterSpec::Kafka(kafka) => {
            use crate::export::kafka::librdkafka::RdKafkaProducer;
            use crate::export::KafkaExporter;

            Box::new(
                KafkaExporter::<RdKafkaProducer>::connect(
                    &export_config,
                    &kafka.brokers,
                    kafka.topic.clone(),
                )
                .await?
                .with_flush_timeout(kafka.flush_timeout),
            )
        },
        #[cfg(not(feature = "kafka"))]
        ExporterSpec::Kafka(kafka) => {
            return Err(ReporterError::config(format!(
                "exporter for topic '{}' needs the `kafka` feature",
                kafka.topic.name
            )))
        },
    };

    Ok((exporter, export_config))
}

/// Build and start a reporter from a validated configuration.
pub async fn start_reporter(config: &Config) -> Result<Reporter> {
    let mut builder = Reporter::builder(ReporterConfig::from(config));

    if config.collectors.process_memory {
        builder = builder.collector(Box::new(ProcessMemoryCollector::new()));
    }

    if config.exporters.is_empty() {
        warn!("No exporters configured, metrics will only be collected");
    }
    for spec in &config.exporters {
        let (exporter, export_config) = build_exporter(spec, config.reporting_period).await?;
        info!(
            kind = spec.kind(),
            filter = %export_config.include_filter,
            period = ?export_config.reporting_period,
            "Configured exporter"
        );
        builder = builder.exporter(exporter, export_config);
    }

    builder.start().await
}

/// Execute the reporter.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  Collect period: {:?}", config.collect_period);
        println!("  Reporting period: {:?}", config.reporting_period);
        for spec in &config.exporters {
            println!("  Exporter: {} (filter {:?})", spec.kind(), spec.include_filter());
        }
        return Ok(());
    }

    cli.init_logging(&config)?;

    let reporter = start_reporter(&config).await?;

    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            signal.map_err(ReporterError::from)
        }
        closed = reporter.closed() => closed,
    };
    reporter.stop().await;

    result
}
