//! Human-readable log backend.

use crate::core::{Metric, Result};
use crate::export::filter::MetricFilter;
use crate::export::{ExportConfig, Exporter};
use chrono::{DateTime, SecondsFormat, Utc};
use std::io::{self, Write};

/// Writes each metric as a name/description line followed by one line per
/// point. Output is for people, not parsers.
pub struct StdoutExporter<W: Write + Send = io::Stdout> {
    out: W,
    filter: MetricFilter,
}

impl StdoutExporter<io::Stdout> {
    /// Exporter writing to the process stdout.
    pub fn new(config: &ExportConfig) -> Result<Self> {
        Self::with_writer(config, io::stdout())
    }
}

impl<W: Write + Send> StdoutExporter<W> {
    /// Exporter writing to `out`.
    pub fn with_writer(config: &ExportConfig, out: W) -> Result<Self> {
        Ok(Self {
            out,
            filter: MetricFilter::new(&config.include_filter)?,
        })
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_metric(&mut self, metric: &Metric) -> io::Result<()> {
        let descriptor = &metric.descriptor;
        writeln!(self.out, "Name: {}", descriptor.name)?;
        writeln!(self.out, "Description: {}", descriptor.description)?;

        for series in &metric.time_series {
            let labels: Vec<String> = descriptor
                .label_keys
                .iter()
                .zip(&series.label_values)
                .filter_map(|(k, v)| v.value.as_ref().map(|v| format!("{}={}", k.key, v)))
                .collect();

            for point in &series.points {
                let time: DateTime<Utc> = point.time.into();
                writeln!(
                    self.out,
                    "  {} [{}] {}",
                    time.to_rfc3339_opts(SecondsFormat::Millis, true),
                    labels.join(","),
                    point.value
                )?;
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<W: Write + Send> Exporter for StdoutExporter<W> {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn export_metrics(&mut self, metrics: &[Metric]) -> Result<()> {
        let selected: Vec<&Metric> = self.filter.select(metrics).collect();
        for metric in selected {
            self.write_metric(metric)?;
        }
        self.out.flush()?;
        Ok(())
    }
}
