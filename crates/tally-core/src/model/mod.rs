//! Metric model primitives.
//!
//! - `desc`: descriptor identity, label shape, and grammar validation
//! - `metric`: the `Metric` capability and the value records it writes
//! - `family`: gathered snapshot grouping
//! - `opts`: convenience builders for descriptors

pub mod desc;
pub mod family;
mod fingerprint;
pub mod metric;
pub mod opts;

pub use desc::{is_valid_label_name, is_valid_metric_name, Desc, RESERVED_LABEL_NAMES};
pub use family::MetricFamily;
pub use metric::{
    Bucket, ConstMetric, LabelPair, Metric, MetricRecord, MetricType, MetricValue, Quantile,
};
pub use opts::{build_fq_name, HistogramOpts, Opts, DEFAULT_BUCKETS};
