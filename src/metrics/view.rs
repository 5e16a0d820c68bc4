//! View definitions: which measure to aggregate, how, and by which tags.

use crate::core::{MetricType, ReporterError, Result};

/// Aggregation applied to a measure.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Keep the most recent value.
    LastValue,
    /// Running total.
    Sum,
    /// Number of recorded values.
    Count,
    /// Histogram over the given, strictly increasing, bucket bounds.
    Distribution(Vec<f64>),
}

/// Numeric kind of the measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Integer measurements, aggregated without rounding.
    Int64,
    /// Floating point measurements.
    Float64,
}

/// How one measure is aggregated into one exported metric.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    /// Name of the exported metric.
    pub name: String,
    /// Description of the exported metric.
    pub description: String,
    /// Unit of the exported metric.
    pub unit: String,
    /// Measure the view aggregates.
    pub measure: String,
    /// Aggregation applied to each recording.
    pub aggregation: Aggregation,
    /// Numeric kind of the measure.
    pub kind: ValueKind,
    /// Tag keys become the label keys of the exported metric, in this order.
    pub tag_keys: Vec<String>,
}

impl View {
    /// View without description or tags, in unit `1`.
    pub fn new(
        name: impl Into<String>,
        measure: impl Into<String>,
        aggregation: Aggregation,
        kind: ValueKind,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            unit: "1".to_string(),
            measure: measure.into(),
            aggregation,
            kind,
            tag_keys: Vec::new(),
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the unit.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Append a tag key.
    pub fn tag_key(mut self, key: impl Into<String>) -> Self {
        self.tag_keys.push(key.into());
        self
    }

    /// Metric type of the stream this view produces.
    pub fn metric_type(&self) -> MetricType {
        match (&self.aggregation, self.kind) {
            (Aggregation::LastValue, ValueKind::Int64) => MetricType::GaugeInt64,
            (Aggregation::LastValue, ValueKind::Float64) => MetricType::GaugeFloat64,
            (Aggregation::Sum, ValueKind::Int64) | (Aggregation::Count, _) => {
                MetricType::CumulativeInt64
            },
            (Aggregation::Sum, ValueKind::Float64) => MetricType::CumulativeFloat64,
            (Aggregation::Distribution(_), _) => MetricType::CumulativeDistribution,
        }
    }

    /// Reject empty names, empty measures and unusable bucket bounds.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ReporterError::ViewConflict("view name is empty".to_string()));
        }
        if self.measure.trim().is_empty() {
            return Err(ReporterError::ViewConflict(format!(
                "view '{}' has no measure",
                self.name
            )));
        }
        if let Aggregation::Distribution(bounds) = &self.aggregation {
            let increasing = bounds.windows(2).all(|w| w[0] < w[1]);
            if !increasing || bounds.iter().any(|b| !b.is_finite()) {
                return Err(ReporterError::ViewConflict(format!(
                    "view '{}' has bucket bounds that are not finite and strictly increasing",
                    self.name
                )));
            }
        }
        Ok(())
    }
}
