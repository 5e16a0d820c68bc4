//! Common test utilities and fixtures.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use telemetry_reporter::core::{
    Descriptor, LabelKey, LabelValue, Metric, MetricType, Point, Result, TimeSeries, Value,
};
use telemetry_reporter::export::Exporter;
use telemetry_reporter::metrics::MetricReader;

/// Fixed timestamp used by every fixture.
pub fn fixed_time() -> SystemTime {
    UNIX_EPOCH + Duration::new(1_700_000_000, 500_000_000)
}

/// Test fixture builder for metrics with one series and sensible defaults.
pub struct TestMetricBuilder {
    name: String,
    description: String,
    unit: String,
    metric_type: MetricType,
    labels: Vec<(LabelKey, LabelValue)>,
    value: Value,
}

impl TestMetricBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: "desc".to_string(),
            unit: "ms".to_string(),
            metric_type: MetricType::CumulativeInt64,
            labels: Vec::new(),
            value: Value::Int64(1),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn metric_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }

    pub fn label(mut self, key: &str, description: &str, value: &str) -> Self {
        self.labels
            .push((LabelKey::new(key, description), LabelValue::new(value)));
        self
    }

    pub fn value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    pub fn build(self) -> Metric {
        let (label_keys, label_values) = self.labels.into_iter().unzip();
        Metric::new(
            Descriptor {
                name: self.name,
                description: self.description,
                unit: self.unit,
                metric_type: self.metric_type,
                label_keys,
            },
            vec![TimeSeries {
                label_values,
                points: vec![Point {
                    time: fixed_time(),
                    value: self.value,
                }],
                start_time: fixed_time(),
            }],
        )
    }
}

/// `metric` / `desc` / `ms`, semantic type 4, label `Key`=`Val`, one Int64 point of 10.
pub fn reference_metric() -> Metric {
    TestMetricBuilder::new("metric")
        .metric_type(MetricType::CumulativeFloat64)
        .label("Key", "key desc", "Val")
        .value(Value::Int64(10))
        .build()
}

/// Reader returning whatever was last stored.
#[derive(Default)]
pub struct FixedReader {
    metrics: Mutex<Vec<Metric>>,
}

impl FixedReader {
    pub fn new(metrics: Vec<Metric>) -> Arc<Self> {
        Arc::new(Self {
            metrics: Mutex::new(metrics),
        })
    }

    pub fn set(&self, metrics: Vec<Metric>) {
        *self.metrics.lock() = metrics;
    }
}

impl MetricReader for FixedReader {
    fn read(&self) -> Vec<Metric> {
        self.metrics.lock().clone()
    }
}

/// Observations made by a [`CountingExporter`].
#[derive(Default)]
pub struct ExportCounts {
    pub exports: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub stops: AtomicUsize,
    pub last_batch: Mutex<Vec<String>>,
}

impl ExportCounts {
    pub fn exports(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// Exporter that records calls and optionally takes its time.
pub struct CountingExporter {
    counts: Arc<ExportCounts>,
    delay: Duration,
}

impl CountingExporter {
    pub fn new(delay: Duration) -> (Self, Arc<ExportCounts>) {
        let counts = Arc::new(ExportCounts::default());
        (
            Self {
                counts: Arc::clone(&counts),
                delay,
            },
            counts,
        )
    }
}

#[async_trait::async_trait]
impl Exporter for CountingExporter {
    fn name(&self) -> &str {
        "counting"
    }

    async fn export_metrics(&mut self, metrics: &[Metric]) -> Result<()> {
        let now = self.counts.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counts.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        *self.counts.last_batch.lock() = metrics.iter().map(|m| m.name().to_string()).collect();

        self.counts.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.counts.exports.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) {
        self.counts.stops.fetch_add(1, Ordering::SeqCst);
    }
}
