//! `opencensus.proto.metrics.v1`

use super::resource::Resource;
use prost_types::Timestamp;

/// A collection of data points describing one metric stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metric {
    /// Name, type and label keys of the stream.
    #[prost(message, optional, tag = "1")]
    pub metric_descriptor: Option<MetricDescriptor>,
    /// One entry per distinct combination of label values.
    #[prost(message, repeated, tag = "2")]
    pub timeseries: Vec<TimeSeries>,
    /// Origin of the metric. Overrides the batch resource when set.
    #[prost(message, optional, tag = "3")]
    pub resource: Option<Resource>,
}

/// Schema of a metric stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MetricDescriptor {
    /// Metric name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Human-readable description.
    #[prost(string, tag = "2")]
    pub description: String,
    /// UCUM unit string.
    #[prost(string, tag = "3")]
    pub unit: String,
    /// [`metric_descriptor::Type`] code.
    #[prost(enumeration = "metric_descriptor::Type", tag = "4")]
    pub r#type: i32,
    /// Label keys, positionally paired with every series' label values.
    #[prost(message, repeated, tag = "5")]
    pub label_keys: Vec<LabelKey>,
}

/// Nested types of [`MetricDescriptor`].
pub mod metric_descriptor {
    /// Wire metric type. `Unspecified` is reserved, which is why every value
    /// sits one above its semantic counterpart.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
        /// Reserved default.
        Unspecified = 0,
        /// Instantaneous integer value.
        GaugeInt64 = 1,
        /// Instantaneous floating point value.
        GaugeDouble = 2,
        /// Histogram over a recent window.
        GaugeDistribution = 3,
        /// Integer counter since the start timestamp.
        CumulativeInt64 = 4,
        /// Floating point counter since the start timestamp.
        CumulativeDouble = 5,
        /// Histogram since the start timestamp.
        CumulativeDistribution = 6,
        /// Precomputed percentiles.
        Summary = 7,
    }
}

/// Label key with its description.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LabelKey {
    /// Key name.
    #[prost(string, tag = "1")]
    pub key: String,
    /// Human-readable description.
    #[prost(string, tag = "2")]
    pub description: String,
}

/// Points sharing one set of label values.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TimeSeries {
    /// Start of the accumulation window for cumulative streams.
    #[prost(message, optional, tag = "1")]
    pub start_timestamp: Option<Timestamp>,
    /// Values for the descriptor's label keys, in the same order.
    #[prost(message, repeated, tag = "2")]
    pub label_values: Vec<LabelValue>,
    /// Data points in time order.
    #[prost(message, repeated, tag = "3")]
    pub points: Vec<Point>,
}

/// One label value.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LabelValue {
    /// The value. Meaningless unless `has_value` is set.
    #[prost(string, tag = "1")]
    pub value: String,
    /// Distinguishes an empty value from an absent one.
    #[prost(bool, tag = "2")]
    pub has_value: bool,
}

/// Timestamped measurement.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Point {
    /// Measurement time.
    #[prost(message, optional, tag = "1")]
    pub timestamp: Option<Timestamp>,
    /// The value. Exactly one variant is expected.
    #[prost(oneof = "point::Value", tags = "2, 3, 4, 5")]
    pub value: Option<point::Value>,
}

/// Nested types of [`Point`].
pub mod point {
    /// Value carried by a [`Point`](super::Point).
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        /// Integer gauge or counter value.
        #[prost(int64, tag = "2")]
        Int64Value(i64),
        /// Floating point gauge or counter value.
        #[prost(double, tag = "3")]
        DoubleValue(f64),
        /// Histogram.
        #[prost(message, tag = "4")]
        DistributionValue(super::DistributionValue),
        /// Precomputed percentiles.
        #[prost(message, tag = "5")]
        SummaryValue(super::SummaryValue),
    }
}

/// Histogram of recorded values.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DistributionValue {
    /// Number of values recorded. Equals the sum of the bucket counts.
    #[prost(int64, tag = "1")]
    pub count: i64,
    /// Sum of the recorded values.
    #[prost(double, tag = "2")]
    pub sum: f64,
    /// Sum of squared deviations from the mean.
    #[prost(double, tag = "3")]
    pub sum_of_squared_deviation: f64,
    /// Bucket boundaries.
    #[prost(message, optional, tag = "4")]
    pub bucket_options: Option<distribution_value::BucketOptions>,
    /// One more bucket than there are bounds.
    #[prost(message, repeated, tag = "5")]
    pub buckets: Vec<distribution_value::Bucket>,
}

/// Nested types of [`DistributionValue`].
pub mod distribution_value {
    use prost_types::Timestamp;
    use std::collections::BTreeMap;

    /// How bucket boundaries are described.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct BucketOptions {
        /// Boundary scheme.
        #[prost(oneof = "bucket_options::Type", tags = "1")]
        pub r#type: Option<bucket_options::Type>,
    }

    /// Nested types of [`BucketOptions`].
    pub mod bucket_options {
        /// Explicit, strictly increasing boundaries.
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Explicit {
            /// Upper bounds, exclusive.
            #[prost(double, repeated, tag = "1")]
            pub bounds: Vec<f64>,
        }

        /// Boundary scheme.
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Type {
            /// Explicit boundaries.
            #[prost(message, tag = "1")]
            Explicit(Explicit),
        }
    }

    /// One histogram bucket.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Bucket {
        /// Values that fell into this bucket.
        #[prost(int64, tag = "1")]
        pub count: i64,
        /// Sample value from this bucket.
        #[prost(message, optional, tag = "2")]
        pub exemplar: Option<Exemplar>,
    }

    /// Sample value with contextual attachments.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Exemplar {
        /// Recorded value.
        #[prost(double, tag = "1")]
        pub value: f64,
        /// Recording time.
        #[prost(message, optional, tag = "2")]
        pub timestamp: Option<Timestamp>,
        /// Context such as trace ids.
        #[prost(btree_map = "string, string", tag = "3")]
        pub attachments: BTreeMap<String, String>,
    }
}

/// Precomputed percentiles of a stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SummaryValue {
    /// Total number of values recorded.
    #[prost(message, optional, tag = "1")]
    pub count: Option<i64>,
    /// Total sum of values recorded.
    #[prost(message, optional, tag = "2")]
    pub sum: Option<f64>,
    /// Values over a recent window.
    #[prost(message, optional, tag = "3")]
    pub snapshot: Option<summary_value::Snapshot>,
}

/// Nested types of [`SummaryValue`].
pub mod summary_value {
    /// Percentiles over a recent window.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Snapshot {
        /// Values in the window. Unset when unknown.
        #[prost(message, optional, tag = "1")]
        pub count: Option<i64>,
        /// Sum over the window. Unset when unknown.
        #[prost(message, optional, tag = "2")]
        pub sum: Option<f64>,
        /// Percentile values, in the order they were computed.
        #[prost(message, repeated, tag = "3")]
        pub percentile_values: Vec<snapshot::ValueAtPercentile>,
    }

    /// Nested types of [`Snapshot`].
    pub mod snapshot {
        /// Value at one percentile.
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct ValueAtPercentile {
            /// Percentile in `(0, 100]`.
            #[prost(double, tag = "1")]
            pub percentile: f64,
            /// Value at that percentile.
            #[prost(double, tag = "2")]
            pub value: f64,
        }
    }
}
