//! In-process aggregation registry.

use crate::core::{
    Bucket, Descriptor, Distribution, LabelKey, LabelValue, Metric, Point, ReporterError, Result,
    TimeSeries, Value,
};
use crate::metrics::view::{Aggregation, ValueKind, View};
use crate::metrics::MetricReader;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::SystemTime;
use tracing::{debug, trace};

/// One recorded measurement.
#[derive(Debug, Clone, Copy)]
enum Sample {
    Int(i64),
    Float(f64),
}

impl Sample {
    fn as_f64(self) -> f64 {
        match self {
            Sample::Int(v) => v as f64,
            Sample::Float(v) => v,
        }
    }

    // Float to int saturates and truncates toward zero.
    fn as_i64(self) -> i64 {
        match self {
            Sample::Int(v) => v,
            Sample::Float(v) => v as i64,
        }
    }
}

#[derive(Debug, Clone)]
enum AggregationData {
    LastInt(i64),
    LastFloat(f64),
    SumInt(i64),
    SumFloat(f64),
    Count(i64),
    Distribution(DistributionData),
}

#[derive(Debug, Clone)]
struct DistributionData {
    count: i64,
    sum: f64,
    mean: f64,
    sum_of_squared_deviation: f64,
    buckets: Vec<i64>,
}

impl DistributionData {
    fn new(bounds: &[f64]) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            mean: 0.0,
            sum_of_squared_deviation: 0.0,
            buckets: vec![0; bounds.len() + 1],
        }
    }

    fn add(&mut self, bounds: &[f64], value: f64) {
        self.count += 1;
        self.sum += value;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.sum_of_squared_deviation += delta * (value - self.mean);

        let idx = bounds.partition_point(|b| *b <= value);
        self.buckets[idx] += 1;
    }
}

impl AggregationData {
    fn new(aggregation: &Aggregation, kind: ValueKind) -> Self {
        match (aggregation, kind) {
            (Aggregation::LastValue, ValueKind::Int64) => Self::LastInt(0),
            (Aggregation::LastValue, ValueKind::Float64) => Self::LastFloat(0.0),
            (Aggregation::Sum, ValueKind::Int64) => Self::SumInt(0),
            (Aggregation::Sum, ValueKind::Float64) => Self::SumFloat(0.0),
            (Aggregation::Count, _) => Self::Count(0),
            (Aggregation::Distribution(bounds), _) => {
                Self::Distribution(DistributionData::new(bounds))
            },
        }
    }

    fn add(&mut self, aggregation: &Aggregation, sample: Sample) {
        match (self, aggregation) {
            (Self::LastInt(v), _) => *v = sample.as_i64(),
            (Self::LastFloat(v), _) => *v = sample.as_f64(),
            (Self::SumInt(v), _) => *v = v.saturating_add(sample.as_i64()),
            (Self::SumFloat(v), _) => *v += sample.as_f64(),
            (Self::Count(c), _) => *c += 1,
            (Self::Distribution(d), Aggregation::Distribution(bounds)) => {
                d.add(bounds, sample.as_f64())
            },
            (Self::Distribution(_), _) => {},
        }
    }

    fn to_value(&self, view: &View) -> Value {
        match self {
            Self::LastInt(v) | Self::SumInt(v) | Self::Count(v) => Value::Int64(*v),
            Self::LastFloat(v) | Self::SumFloat(v) => Value::Float64(*v),
            Self::Distribution(d) => {
                let bucket_bounds = match &view.aggregation {
                    Aggregation::Distribution(bounds) => bounds.clone(),
                    _ => Vec::new(),
                };
                Value::Distribution(Distribution {
                    count: d.count,
                    sum: d.sum,
                    sum_of_squared_deviation: d.sum_of_squared_deviation,
                    bucket_bounds,
                    buckets: d
                        .buckets
                        .iter()
                        .map(|count| Bucket {
                            count: *count,
                            exemplar: None,
                        })
                        .collect(),
                })
            },
        }
    }
}

#[derive(Debug)]
struct Row {
    data: AggregationData,
    updated: SystemTime,
}

#[derive(Debug)]
struct ViewState {
    view: View,
    start: SystemTime,
    rows: BTreeMap<Vec<Option<String>>, Row>,
}

impl ViewState {
    fn to_metric(&self) -> Metric {
        let view = &self.view;
        let descriptor = Descriptor {
            name: view.name.clone(),
            description: view.description.clone(),
            unit: view.unit.clone(),
            metric_type: view.metric_type(),
            label_keys: view.tag_keys.iter().map(|k| LabelKey::new(k.as_str(), "")).collect(),
        };

        let time_series = self
            .rows
            .iter()
            .map(|(key, row)| TimeSeries {
                label_values: key
                    .iter()
                    .map(|v| match v {
                        Some(v) => LabelValue::new(v.as_str()),
                        None => LabelValue::absent(),
                    })
                    .collect(),
                points: vec![Point {
                    time: row.updated,
                    value: row.data.to_value(view),
                }],
                start_time: self.start,
            })
            .collect();

        Metric::new(descriptor, time_series)
    }
}

/// Registered views and their aggregated rows.
///
/// Rows are keyed by the view's tag values, in tag key order. Tags not
/// present in a recording become absent label values.
#[derive(Debug, Default)]
pub struct Registry {
    views: RwLock<BTreeMap<String, ViewState>>,
}

impl Registry {
    /// Registry without views.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view. Registering an identical view again is a no-op;
    /// a different view under the same name is a conflict.
    pub fn register(&self, view: View) -> Result<()> {
        view.validate()?;
        let mut views = self.views.write();

        if let Some(existing) = views.get(&view.name) {
            if existing.view == view {
                return Ok(());
            }
            return Err(ReporterError::ViewConflict(format!(
                "view '{}' is already registered with a different definition",
                view.name
            )));
        }

        debug!(view = %view.name, measure = %view.measure, "Registered view");
        views.insert(
            view.name.clone(),
            ViewState {
                view,
                start: SystemTime::now(),
                rows: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Whether a view named `name` is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.views.read().contains_key(name)
    }

    /// Registered view names, sorted.
    pub fn view_names(&self) -> Vec<String> {
        self.views.read().keys().cloned().collect()
    }

    /// Record `value` for `measure` into every view over that measure.
    ///
    /// Non-finite values are ignored. Integer views truncate the value.
    pub fn record(&self, measure: &str, value: f64, tags: &[(&str, &str)]) {
        if !value.is_finite() {
            trace!(measure, value, "Ignoring non-finite measurement");
            return;
        }
        self.record_sample(measure, Sample::Float(value), tags);
    }

    /// Record an integer measurement. Integer views aggregate it exactly.
    pub fn record_int(&self, measure: &str, value: i64, tags: &[(&str, &str)]) {
        self.record_sample(measure, Sample::Int(value), tags);
    }

    fn record_sample(&self, measure: &str, sample: Sample, tags: &[(&str, &str)]) {
        let now = SystemTime::now();
        let mut views = self.views.write();
        for state in views.values_mut().filter(|s| s.view.measure == measure) {
            let key: Vec<Option<String>> = state
                .view
                .tag_keys
                .iter()
                .map(|k| {
                    tags.iter()
                        .find(|(tk, _)| *tk == k.as_str())
                        .map(|(_, v)| (*v).to_string())
                })
                .collect();

            let aggregation = &state.view.aggregation;
            let kind = state.view.kind;
            let row = state.rows.entry(key).or_insert_with(|| Row {
                data: AggregationData::new(aggregation, kind),
                updated: now,
            });
            row.data.add(aggregation, sample);
            row.updated = now;
        }
    }
}

impl MetricReader for Registry {
    /// One metric per view that has at least one row, in view name order.
    fn read(&self) -> Vec<Metric> {
        self.views
            .read()
            .values()
            .filter(|s| !s.rows.is_empty())
            .map(ViewState::to_metric)
            .collect()
    }
}
