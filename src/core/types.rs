//! In-memory metric model.
//!
//! These are the snapshots handed over by the aggregation layer. They are
//! immutable once produced; exporters only read them (and attach a
//! [`Resource`] to their own copy before serialization).

use crate::core::error::{ReporterError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

/// Kind of a metric stream.
///
/// Discriminants follow the measurement library's enumeration. The wire
/// format reserves 0 for "unspecified", so every wire code is the
/// discriminant plus one (see [`MetricType::wire_code`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    /// Instantaneous integer value.
    GaugeInt64 = 0,
    /// Instantaneous floating point value.
    GaugeFloat64 = 1,
    /// Histogram over a recent window.
    GaugeDistribution = 2,
    /// Integer counter since the series start time.
    CumulativeInt64 = 3,
    /// Floating point counter since the series start time.
    CumulativeFloat64 = 4,
    /// Histogram since the series start time.
    CumulativeDistribution = 5,
    /// Precomputed percentiles.
    Summary = 6,
}

impl MetricType {
    /// Offset between the semantic enumeration and the wire enumeration.
    pub const WIRE_OFFSET: i32 = 1;

    /// Semantic discriminant.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Wire enumeration value for this type.
    pub fn wire_code(self) -> i32 {
        self.as_i32() + Self::WIRE_OFFSET
    }

    /// Look up a type by semantic discriminant.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::GaugeInt64),
            1 => Some(Self::GaugeFloat64),
            2 => Some(Self::GaugeDistribution),
            3 => Some(Self::CumulativeInt64),
            4 => Some(Self::CumulativeFloat64),
            5 => Some(Self::CumulativeDistribution),
            6 => Some(Self::Summary),
            _ => None,
        }
    }

    /// Look up a type by wire enumeration value. `0` (unspecified) has no
    /// semantic counterpart.
    pub fn from_wire_code(code: i32) -> Option<Self> {
        Self::from_i32(code - Self::WIRE_OFFSET)
    }
}

/// Label key with its human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelKey {
    /// Key name.
    pub key: String,
    /// Human-readable description.
    pub description: String,
}

impl LabelKey {
    /// Key with a description, which may be empty.
    pub fn new(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
        }
    }
}

/// Label value. `None` means the label is absent for this series, which is
/// different from an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelValue {
    /// The value, or `None` when absent.
    pub value: Option<String>,
}

impl LabelValue {
    /// A present label value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    /// An absent label value.
    pub fn absent() -> Self {
        Self { value: None }
    }

    /// Whether the label has a value.
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }
}

/// Metadata describing a metric stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    /// Metric name, unique per stream.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// UCUM unit string, `1` for dimensionless.
    pub unit: String,
    /// Kind of stream. Determines the point variant.
    pub metric_type: MetricType,
    /// Paired with [`TimeSeries::label_values`] by position.
    pub label_keys: Vec<LabelKey>,
}

/// One labelled series of points.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    /// Paired with [`Descriptor::label_keys`] by position.
    pub label_values: Vec<LabelValue>,
    /// Time-ordered.
    pub points: Vec<Point>,
    /// Start of the accumulation window.
    pub start_time: SystemTime,
}

/// A single timestamped measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// Measurement time.
    pub time: SystemTime,
    /// Measured value.
    pub value: Value,
}

impl Point {
    /// Integer point.
    pub fn int64(time: SystemTime, value: i64) -> Self {
        Self {
            time,
            value: Value::Int64(value),
        }
    }

    /// Floating point point.
    pub fn float64(time: SystemTime, value: f64) -> Self {
        Self {
            time,
            value: Value::Float64(value),
        }
    }

    /// Histogram point.
    pub fn distribution(time: SystemTime, value: Distribution) -> Self {
        Self {
            time,
            value: Value::Distribution(value),
        }
    }

    /// Summary point.
    pub fn summary(time: SystemTime, value: Summary) -> Self {
        Self {
            time,
            value: Value::Summary(value),
        }
    }
}

/// Point payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer value.
    Int64(i64),
    /// Floating point value.
    Float64(f64),
    /// Histogram.
    Distribution(Distribution),
    /// Precomputed percentiles.
    Summary(Summary),
}

impl Value {
    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::Distribution(_) => "distribution",
            Value::Summary(_) => "summary",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Distribution(d) => write!(
                f,
                "distribution{{count={} sum={} buckets={:?}}}",
                d.count,
                d.sum,
                d.buckets.iter().map(|b| b.count).collect::<Vec<_>>()
            ),
            Value::Summary(s) => {
                write!(f, "summary{{count={} sum={}", s.count, s.sum)?;
                if let Some(snapshot) = &s.snapshot {
                    for p in &snapshot.percentiles {
                        write!(f, " p{}={}", p.percentile, p.value)?;
                    }
                }
                write!(f, "}}")
            },
        }
    }
}

/// Histogram-style aggregate with explicit bucket bounds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Distribution {
    /// Number of recorded values.
    pub count: i64,
    /// Sum of recorded values.
    pub sum: f64,
    /// Sum of squared deviations from the mean.
    pub sum_of_squared_deviation: f64,
    /// Strictly increasing upper bounds.
    pub bucket_bounds: Vec<f64>,
    /// One more bucket than there are bounds.
    pub buckets: Vec<Bucket>,
}

/// One histogram bucket.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bucket {
    /// Values that fell into this bucket.
    pub count: i64,
    /// Optional sample value.
    pub exemplar: Option<Exemplar>,
}

/// Example value recorded into a bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Exemplar {
    /// Recorded value.
    pub value: f64,
    /// Recording time.
    pub timestamp: SystemTime,
    /// Context such as trace ids.
    pub attachments: BTreeMap<String, String>,
}

/// Pre-computed percentile summary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
    /// Total number of recorded values.
    pub count: i64,
    /// Total sum of recorded values.
    pub sum: f64,
    /// Values over a recent window.
    pub snapshot: Option<Snapshot>,
}

/// Windowed values of a [`Summary`].
///
/// `count` and `sum` are only meaningful when `has_count_and_sum` is set;
/// otherwise they are absent, not zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    /// Whether `count` and `sum` carry data.
    pub has_count_and_sum: bool,
    /// Values in the window.
    pub count: i64,
    /// Sum over the window.
    pub sum: f64,
    /// Percentile values, in computation order.
    pub percentiles: Vec<PercentileValue>,
}

/// Value at one percentile.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PercentileValue {
    /// Percentile in `(0, 100]`.
    pub percentile: f64,
    /// Value at that percentile.
    pub value: f64,
}

/// Origin of a metric (host, runtime, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resource {
    /// Type identifier, e.g. `host`.
    pub resource_type: String,
    /// Identifying labels.
    pub labels: BTreeMap<String, String>,
}

impl Resource {
    /// Resource of `resource_type` without labels.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            labels: BTreeMap::new(),
        }
    }

    /// Add or replace one label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// No type and no labels.
    pub fn is_empty(&self) -> bool {
        self.resource_type.is_empty() && self.labels.is_empty()
    }
}

/// A metric snapshot: descriptor plus all of its series.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Stream metadata.
    pub descriptor: Descriptor,
    /// Series, one per label value combination.
    pub time_series: Vec<TimeSeries>,
    /// Origin, attached by the exporter.
    pub resource: Option<Resource>,
}

impl Metric {
    /// Metric without a resource.
    pub fn new(descriptor: Descriptor, time_series: Vec<TimeSeries>) -> Self {
        Self {
            descriptor,
            time_series,
            resource: None,
        }
    }

    /// Shorthand for the descriptor name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Returns a copy of this metric carrying `resource`.
    pub fn with_resource(&self, resource: Option<Resource>) -> Self {
        Self {
            resource,
            ..self.clone()
        }
    }

    /// Checks label arity and that every point uses the same variant.
    pub fn validate(&self) -> Result<()> {
        let arity = self.descriptor.label_keys.len();
        let mut variant: Option<&'static str> = None;

        for (idx, series) in self.time_series.iter().enumerate() {
            if series.label_values.len() != arity {
                return Err(ReporterError::invalid_metric(
                    self.name(),
                    format!(
                        "series {} has {} label values, descriptor declares {} keys",
                        idx,
                        series.label_values.len(),
                        arity
                    ),
                ));
            }

            for point in &series.points {
                let kind = point.value.kind();
                match variant {
                    None => variant = Some(kind),
                    Some(expected) if expected != kind => {
                        return Err(ReporterError::invalid_metric(
                            self.name(),
                            format!("mixes {expected} and {kind} points"),
                        ));
                    },
                    Some(_) => {},
                }
            }
        }

        Ok(())
    }
}
