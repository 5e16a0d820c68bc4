//! Translation between the in-memory metric model and the wire messages.
//!
//! Pure functions, no I/O. The only place the semantic/wire type offset is
//! applied is [`MetricType::wire_code`], called from [`metric_to_proto`].

use crate::core::{
    Bucket, Descriptor, Distribution, Exemplar, LabelKey, LabelValue, Metric, MetricType,
    PercentileValue, Point, ReporterError, Resource, Result, Snapshot, Summary, TimeSeries, Value,
};
use crate::proto::metrics::{
    distribution_value::{self, bucket_options},
    point, summary_value, DistributionValue, MetricDescriptor, SummaryValue,
};
use crate::proto::{self, ExportMetricsServiceRequest};
use prost::Message;
use prost_types::Timestamp;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wrap a set of metrics into one export request (the HTTP batch body).
pub fn metrics_to_request(metrics: &[Metric]) -> Result<ExportMetricsServiceRequest> {
    let metrics = metrics.iter().map(metric_to_proto).collect::<Result<Vec<_>>>()?;
    Ok(ExportMetricsServiceRequest {
        metrics,
        resource: None,
    })
}

/// Encode a batch request to protobuf bytes.
pub fn encode_request(metrics: &[Metric]) -> Result<Vec<u8>> {
    let request = metrics_to_request(metrics)?;
    let mut buf = Vec::with_capacity(request.encoded_len());
    request.encode(&mut buf)?;
    Ok(buf)
}

/// Encode a single metric to protobuf bytes (one broker message).
pub fn encode_metric(metric: &Metric) -> Result<Vec<u8>> {
    let pb = metric_to_proto(metric)?;
    let mut buf = Vec::with_capacity(pb.encoded_len());
    pb.encode(&mut buf)?;
    Ok(buf)
}

/// Convert one metric to its wire form.
///
/// Fails if the metric breaks the label-arity or single-variant invariants.
pub fn metric_to_proto(metric: &Metric) -> Result<proto::Metric> {
    metric.validate()?;

    Ok(proto::Metric {
        metric_descriptor: Some(descriptor_to_proto(&metric.descriptor)),
        timeseries: metric.time_series.iter().map(series_to_proto).collect(),
        resource: metric.resource.as_ref().map(resource_to_proto),
    })
}

fn descriptor_to_proto(descriptor: &Descriptor) -> MetricDescriptor {
    MetricDescriptor {
        name: descriptor.name.clone(),
        description: descriptor.description.clone(),
        unit: descriptor.unit.clone(),
        r#type: descriptor.metric_type.wire_code(),
        label_keys: descriptor
            .label_keys
            .iter()
            .map(|k| proto::metrics::LabelKey {
                key: k.key.clone(),
                description: k.description.clone(),
            })
            .collect(),
    }
}

fn resource_to_proto(resource: &Resource) -> proto::Resource {
    proto::Resource {
        r#type: resource.resource_type.clone(),
        labels: resource.labels.clone(),
    }
}

fn series_to_proto(series: &TimeSeries) -> proto::metrics::TimeSeries {
    proto::metrics::TimeSeries {
        start_timestamp: Some(Timestamp::from(series.start_time)),
        label_values: series
            .label_values
            .iter()
            .map(|lv| proto::metrics::LabelValue {
                value: lv.value.clone().unwrap_or_default(),
                has_value: lv.is_present(),
            })
            .collect(),
        points: series.points.iter().map(point_to_proto).collect(),
    }
}

fn point_to_proto(p: &Point) -> proto::metrics::Point {
    let value = match &p.value {
        Value::Int64(v) => point::Value::Int64Value(*v),
        Value::Float64(v) => point::Value::DoubleValue(*v),
        Value::Distribution(d) => point::Value::DistributionValue(distribution_to_proto(d)),
        Value::Summary(s) => point::Value::SummaryValue(summary_to_proto(s)),
    };

    proto::metrics::Point {
        timestamp: Some(Timestamp::from(p.time)),
        value: Some(value),
    }
}

fn distribution_to_proto(d: &Distribution) -> DistributionValue {
    DistributionValue {
        count: d.count,
        sum: d.sum,
        sum_of_squared_deviation: d.sum_of_squared_deviation,
        bucket_options: Some(distribution_value::BucketOptions {
            r#type: Some(bucket_options::Type::Explicit(bucket_options::Explicit {
                bounds: d.bucket_bounds.clone(),
            })),
        }),
        buckets: d
            .buckets
            .iter()
            .map(|b| distribution_value::Bucket {
                count: b.count,
                exemplar: b.exemplar.as_ref().map(|e| distribution_value::Exemplar {
                    value: e.value,
                    timestamp: Some(Timestamp::from(e.timestamp)),
                    attachments: e.attachments.clone(),
                }),
            })
            .collect(),
    }
}

fn summary_to_proto(s: &Summary) -> SummaryValue {
    SummaryValue {
        count: Some(s.count),
        sum: Some(s.sum),
        snapshot: s.snapshot.as_ref().map(|snap| {
            // Count and sum stay unset unless the snapshot actually has them.
            let (count, sum) = if snap.has_count_and_sum {
                (Some(snap.count), Some(snap.sum))
            } else {
                (None, None)
            };

            summary_value::Snapshot {
                count,
                sum,
                percentile_values: snap
                    .percentiles
                    .iter()
                    .map(|p| summary_value::snapshot::ValueAtPercentile {
                        percentile: p.percentile,
                        value: p.value,
                    })
                    .collect(),
            }
        }),
    }
}

/// Decode a broker message back into a metric.
pub fn decode_metric(bytes: &[u8]) -> Result<Metric> {
    let pb = proto::Metric::decode(bytes)?;
    proto_to_metric(&pb)
}

/// Convert a wire metric back to the in-memory model.
///
/// A point without a value is rejected as an unsupported value type.
pub fn proto_to_metric(pb: &proto::Metric) -> Result<Metric> {
    let descriptor = pb
        .metric_descriptor
        .as_ref()
        .ok_or_else(|| ReporterError::invalid_metric("<unnamed>", "missing descriptor"))?;

    let metric_type = MetricType::from_wire_code(descriptor.r#type).ok_or_else(|| {
        ReporterError::invalid_metric(
            descriptor.name.as_str(),
            format!("unknown wire type {}", descriptor.r#type),
        )
    })?;

    let time_series = pb
        .timeseries
        .iter()
        .map(|ts| series_from_proto(&descriptor.name, ts))
        .collect::<Result<Vec<_>>>()?;

    Ok(Metric {
        descriptor: Descriptor {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            unit: descriptor.unit.clone(),
            metric_type,
            label_keys: descriptor
                .label_keys
                .iter()
                .map(|k| LabelKey::new(k.key.as_str(), k.description.as_str()))
                .collect(),
        },
        time_series,
        resource: pb.resource.as_ref().map(|r| Resource {
            resource_type: r.r#type.clone(),
            labels: r.labels.clone(),
        }),
    })
}

fn series_from_proto(metric: &str, ts: &proto::metrics::TimeSeries) -> Result<TimeSeries> {
    Ok(TimeSeries {
        label_values: ts
            .label_values
            .iter()
            .map(|lv| {
                if lv.has_value {
                    LabelValue::new(lv.value.as_str())
                } else {
                    LabelValue::absent()
                }
            })
            .collect(),
        points: ts
            .points
            .iter()
            .map(|p| point_from_proto(metric, p))
            .collect::<Result<Vec<_>>>()?,
        start_time: time_from_proto(metric, ts.start_timestamp.as_ref())?,
    })
}

fn point_from_proto(metric: &str, p: &proto::metrics::Point) -> Result<Point> {
    let value = match &p.value {
        Some(point::Value::Int64Value(v)) => Value::Int64(*v),
        Some(point::Value::DoubleValue(v)) => Value::Float64(*v),
        Some(point::Value::DistributionValue(d)) => {
            Value::Distribution(distribution_from_proto(metric, d)?)
        },
        Some(point::Value::SummaryValue(s)) => Value::Summary(summary_from_proto(s)),
        None => {
            return Err(ReporterError::UnsupportedValueType(format!(
                "point in metric '{metric}' carries no value"
            )))
        },
    };

    Ok(Point {
        time: time_from_proto(metric, p.timestamp.as_ref())?,
        value,
    })
}

fn distribution_from_proto(metric: &str, d: &DistributionValue) -> Result<Distribution> {
    let bucket_bounds = match d.bucket_options.as_ref().and_then(|o| o.r#type.as_ref()) {
        Some(bucket_options::Type::Explicit(explicit)) => explicit.bounds.clone(),
        None => Vec::new(),
    };

    let buckets = d
        .buckets
        .iter()
        .map(|b| {
            let exemplar = match &b.exemplar {
                Some(e) => Some(Exemplar {
                    value: e.value,
                    timestamp: time_from_proto(metric, e.timestamp.as_ref())?,
                    attachments: e.attachments.clone(),
                }),
                None => None,
            };
            Ok(Bucket {
                count: b.count,
                exemplar,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Distribution {
        count: d.count,
        sum: d.sum,
        sum_of_squared_deviation: d.sum_of_squared_deviation,
        bucket_bounds,
        buckets,
    })
}

fn summary_from_proto(s: &SummaryValue) -> Summary {
    Summary {
        count: s.count.unwrap_or_default(),
        sum: s.sum.unwrap_or_default(),
        snapshot: s.snapshot.as_ref().map(|snap| {
            let has_count_and_sum = snap.count.is_some() && snap.sum.is_some();
            Snapshot {
                has_count_and_sum,
                count: snap.count.unwrap_or_default(),
                sum: snap.sum.unwrap_or_default(),
                percentiles: snap
                    .percentile_values
                    .iter()
                    .map(|p| PercentileValue {
                        percentile: p.percentile,
                        value: p.value,
                    })
                    .collect(),
            }
        }),
    }
}

fn time_from_proto(metric: &str, ts: Option<&Timestamp>) -> Result<SystemTime> {
    match ts {
        Some(ts) => SystemTime::try_from(ts.clone()).map_err(|e| {
            ReporterError::invalid_metric(metric, format!("invalid timestamp: {e}"))
        }),
        None => Ok(UNIX_EPOCH),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn at(secs: u64, nanos: u32) -> SystemTime {
        UNIX_EPOCH + Duration::new(secs, nanos)
    }

    fn reference_metric() -> Metric {
        let now = at(1_700_000_000, 123_456_789);
        Metric::new(
            Descriptor {
                name: "metric".to_string(),
                description: "desc".to_string(),
                unit: "ms".to_string(),
                metric_type: MetricType::CumulativeFloat64,
                label_keys: vec![LabelKey::new("Key", "key desc")],
            },
            vec![TimeSeries {
                label_values: vec![LabelValue::new("Val")],
                points: vec![Point::int64(now, 10)],
                start_time: now,
            }],
        )
    }

    fn single_point_metric(metric_type: MetricType, value: Value) -> Metric {
        let now = at(1_700_000_100, 5);
        Metric::new(
            Descriptor {
                name: "m".to_string(),
                description: String::new(),
                unit: "1".to_string(),
                metric_type,
                label_keys: vec![],
            },
            vec![TimeSeries {
                label_values: vec![],
                points: vec![Point { time: now, value }],
                start_time: at(1_700_000_000, 0),
            }],
        )
    }

    #[test]
    fn test_type_offset_applied_once() {
        let types = [
            MetricType::GaugeInt64,
            MetricType::GaugeFloat64,
            MetricType::GaugeDistribution,
            MetricType::CumulativeInt64,
            MetricType::CumulativeFloat64,
            MetricType::CumulativeDistribution,
            MetricType::Summary,
        ];

        for metric_type in types {
            let mut metric = reference_metric();
            metric.descriptor.metric_type = metric_type;
            let pb = metric_to_proto(&metric).unwrap();
            assert_eq!(
                pb.metric_descriptor.unwrap().r#type,
                metric_type.as_i32() + 1,
                "{metric_type:?}"
            );
        }

        let mut metric = reference_metric();
        metric.descriptor.metric_type = MetricType::CumulativeInt64;
        let descriptor = metric_to_proto(&metric).unwrap().metric_descriptor.unwrap();
        assert_eq!(descriptor.r#type, 4);
        assert_eq!(
            descriptor.r#type(),
            proto::metrics::metric_descriptor::Type::CumulativeInt64
        );
    }

    #[test]
    fn test_reference_metric_fields() {
        let metric = reference_metric();
        let pb = metric_to_proto(&metric).unwrap();

        let descriptor = pb.metric_descriptor.as_ref().unwrap();
        assert_eq!(descriptor.name, "metric");
        assert_eq!(descriptor.r#type, 5);
        assert_eq!(descriptor.label_keys[0].key, "Key");

        let series = &pb.timeseries[0];
        assert_eq!(series.start_timestamp.as_ref().unwrap().seconds, 1_700_000_000);
        assert_eq!(series.start_timestamp.as_ref().unwrap().nanos, 123_456_789);
        assert_eq!(series.label_values[0].value, "Val");
        assert!(series.label_values[0].has_value);
        assert_eq!(series.points[0].value, Some(point::Value::Int64Value(10)));
        assert!(pb.resource.is_none());
    }

    #[test]
    fn test_round_trip_int64() {
        let metric = reference_metric();
        let decoded = decode_metric(&encode_metric(&metric).unwrap()).unwrap();
        assert_eq!(decoded, metric);
    }

    #[test]
    fn test_round_trip_float64_with_resource_and_absent_label() {
        let mut metric = single_point_metric(MetricType::GaugeFloat64, Value::Float64(12.345));
        metric.descriptor.label_keys = vec![LabelKey::new("zone", "")];
        metric.time_series[0].label_values = vec![LabelValue::absent()];
        let metric = metric.with_resource(Some(
            Resource::new("host").with_label("host.hostname", "box-1"),
        ));

        let decoded = decode_metric(&encode_metric(&metric).unwrap()).unwrap();
        assert_eq!(decoded, metric);
    }

    #[test]
    fn test_round_trip_distribution() {
        let mut attachments = BTreeMap::new();
        attachments.insert("trace_id".to_string(), "abc".to_string());

        let distribution = Distribution {
            count: 3,
            sum: 12.0,
            sum_of_squared_deviation: 8.0,
            bucket_bounds: vec![1.0, 5.0],
            buckets: vec![
                Bucket::default(),
                Bucket {
                    count: 2,
                    exemplar: Some(Exemplar {
                        value: 2.5,
                        timestamp: at(1_700_000_050, 42),
                        attachments,
                    }),
                },
                Bucket {
                    count: 1,
                    exemplar: None,
                },
            ],
        };
        let metric = single_point_metric(
            MetricType::CumulativeDistribution,
            Value::Distribution(distribution),
        );

        let decoded = decode_metric(&encode_metric(&metric).unwrap()).unwrap();
        assert_eq!(decoded, metric);
    }

    #[test]
    fn test_round_trip_summary() {
        let summary = Summary {
            count: 10,
            sum: 55.0,
            snapshot: Some(Snapshot {
                has_count_and_sum: true,
                count: 4,
                sum: 20.0,
                percentiles: vec![
                    PercentileValue {
                        percentile: 50.0,
                        value: 5.0,
                    },
                    PercentileValue {
                        percentile: 99.0,
                        value: 9.5,
                    },
                ],
            }),
        };
        let metric = single_point_metric(MetricType::Summary, Value::Summary(summary));

        let decoded = decode_metric(&encode_metric(&metric).unwrap()).unwrap();
        assert_eq!(decoded, metric);
    }

    #[test]
    fn test_snapshot_without_count_and_sum_leaves_wrappers_unset() {
        let summary = Summary {
            count: 2,
            sum: 3.0,
            snapshot: Some(Snapshot {
                has_count_and_sum: false,
                count: 99,
                sum: 99.0,
                percentiles: vec![],
            }),
        };
        let metric = single_point_metric(MetricType::Summary, Value::Summary(summary));
        let pb = metric_to_proto(&metric).unwrap();

        match &pb.timeseries[0].points[0].value {
            Some(point::Value::SummaryValue(s)) => {
                assert_eq!(s.count, Some(2));
                assert_eq!(s.sum, Some(3.0));
                let snapshot = s.snapshot.as_ref().unwrap();
                assert_eq!(snapshot.count, None);
                assert_eq!(snapshot.sum, None);
            },
            other => panic!("expected summary value, got {other:?}"),
        }
    }

    #[test]
    fn test_point_without_value_is_unsupported() {
        let mut pb = metric_to_proto(&reference_metric()).unwrap();
        pb.timeseries[0].points[0].value = None;

        let err = proto_to_metric(&pb).unwrap_err();
        assert!(matches!(err, ReporterError::UnsupportedValueType(_)));
    }

    #[test]
    fn test_invalid_metric_rejected_before_encoding() {
        let mut metric = reference_metric();
        metric.time_series[0].label_values.clear();
        assert!(matches!(
            metric_to_proto(&metric),
            Err(ReporterError::InvalidMetric { .. })
        ));
    }

    #[test]
    fn test_batch_request() {
        let metrics = vec![reference_metric(), reference_metric()];
        let request = metrics_to_request(&metrics).unwrap();
        assert_eq!(request.metrics.len(), 2);

        let bytes = encode_request(&metrics).unwrap();
        let decoded = ExportMetricsServiceRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, request);
    }
}
