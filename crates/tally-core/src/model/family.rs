//! Gathered snapshot of one metric family.

use serde::Serialize;

use super::metric::{MetricRecord, MetricType};

/// All current values sharing one fully-qualified name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub metrics: Vec<MetricRecord>,
}

impl MetricFamily {
    pub fn new(name: impl Into<String>, help: impl Into<String>, metric_type: MetricType) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            metric_type,
            metrics: Vec::new(),
        }
    }

    /// Order metrics by their label values (labels are already name-sorted).
    pub fn sort_metrics(&mut self) {
        self.metrics.sort_by(|a, b| {
            let av = a.labels.iter().map(|lp| lp.value.as_str());
            let bv = b.labels.iter().map(|lp| lp.value.as_str());
            av.cmp(bv)
        });
    }
}
