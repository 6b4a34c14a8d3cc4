//! The `Metric` capability and the records it writes.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{Result, TallyError};
use crate::model::desc::Desc;

/// One label name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LabelPair {
    pub name: String,
    pub value: String,
}

impl LabelPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Type tag carried by every gathered family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Untyped,
    Histogram,
    Summary,
}

impl MetricType {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Untyped => "untyped",
            MetricType::Histogram => "histogram",
            MetricType::Summary => "summary",
        }
    }
}

/// Cumulative histogram bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub upper_bound: f64,
    pub cumulative_count: u64,
}

/// Precomputed summary quantile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quantile {
    pub quantile: f64,
    pub value: f64,
}

/// Current value of one metric, written fresh on every collection pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetricValue {
    Counter {
        value: f64,
    },
    Gauge {
        value: f64,
    },
    Untyped {
        value: f64,
    },
    Histogram {
        sample_count: u64,
        sample_sum: f64,
        buckets: Vec<Bucket>,
    },
    Summary {
        sample_count: u64,
        sample_sum: f64,
        quantiles: Vec<Quantile>,
    },
}

impl MetricValue {
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Counter { .. } => MetricType::Counter,
            MetricValue::Gauge { .. } => MetricType::Gauge,
            MetricValue::Untyped { .. } => MetricType::Untyped,
            MetricValue::Histogram { .. } => MetricType::Histogram,
            MetricValue::Summary { .. } => MetricType::Summary,
        }
    }

    /// Scalar value for counter/gauge/untyped, `None` for distributions.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Counter { value }
            | MetricValue::Gauge { value }
            | MetricValue::Untyped { value } => Some(*value),
            _ => None,
        }
    }

    /// Scalar value record for the given type tag.
    pub fn scalar(metric_type: MetricType, value: f64) -> Option<Self> {
        match metric_type {
            MetricType::Counter => Some(MetricValue::Counter { value }),
            MetricType::Gauge => Some(MetricValue::Gauge { value }),
            MetricType::Untyped => Some(MetricValue::Untyped { value }),
            MetricType::Histogram | MetricType::Summary => None,
        }
    }
}

/// Output of `Metric::write`: labels (constant + variable, sorted by name),
/// value, and an optional timestamp in milliseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub labels: Vec<LabelPair>,
    pub value: MetricValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
}

impl MetricRecord {
    pub fn new(labels: Vec<LabelPair>, value: MetricValue) -> Self {
        Self {
            labels,
            value,
            timestamp_ms: None,
        }
    }

    pub fn with_timestamp_ms(mut self, ts: i64) -> Self {
        self.timestamp_ms = Some(ts);
        self
    }

    pub fn label_value(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|lp| lp.name == name)
            .map(|lp| lp.value.as_str())
    }
}

/// A single time-varying value plus the descriptor identifying it.
///
/// Implementations must return the same descriptor for their whole lifetime,
/// and `write` must be safe to call concurrently with itself and with updates
/// to the underlying value.
pub trait Metric: Send + Sync {
    fn desc(&self) -> &Arc<Desc>;

    /// Serialize the current value.
    fn write(&self) -> Result<MetricRecord>;
}

/// Fixed-value metric, built at collection time by custom collectors.
#[derive(Debug, Clone)]
pub struct ConstMetric {
    desc: Arc<Desc>,
    record: MetricRecord,
}

impl ConstMetric {
    /// Scalar metric. `label_values` fill the descriptor's variable labels in
    /// order.
    pub fn new(
        desc: Arc<Desc>,
        metric_type: MetricType,
        value: f64,
        label_values: &[&str],
    ) -> Result<Self> {
        let value = MetricValue::scalar(metric_type, value).ok_or_else(|| {
            TallyError::BadConfig(format!(
                "const metric {} must be scalar, got {}",
                desc.fq_name(),
                metric_type.as_str()
            ))
        })?;
        Self::with_value(desc, value, label_values)
    }

    /// Any value, including precomputed histograms and summaries.
    pub fn with_value(desc: Arc<Desc>, value: MetricValue, label_values: &[&str]) -> Result<Self> {
        if let Some(cause) = desc.err() {
            return Err(TallyError::DescriptorInvalid {
                desc: desc.to_string(),
                cause: cause.to_string(),
            });
        }
        let values: Vec<String> = label_values.iter().map(|s| s.to_string()).collect();
        let labels = desc
            .label_pairs(&values)
            .ok_or_else(|| TallyError::LabelCardinality {
                name: desc.fq_name().to_string(),
                expected: desc.variable_labels().len(),
                got: label_values.len(),
            })?;
        Ok(Self {
            desc,
            record: MetricRecord::new(labels, value),
        })
    }

    pub fn with_timestamp_ms(mut self, ts: i64) -> Self {
        self.record.timestamp_ms = Some(ts);
        self
    }
}

impl Metric for ConstMetric {
    fn desc(&self) -> &Arc<Desc> {
        &self.desc
    }

    fn write(&self) -> Result<MetricRecord> {
        Ok(self.record.clone())
    }
}
