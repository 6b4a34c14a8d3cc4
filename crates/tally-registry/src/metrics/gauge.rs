use std::sync::Arc;

use tally_core::error::Result;
use tally_core::{Desc, LabelPair, Metric, MetricRecord, MetricValue, Opts};

use super::atomic::AtomicF64;
use super::resolve_labels;

/// Value that can go up and down.
#[derive(Debug)]
pub struct Gauge {
    desc: Arc<Desc>,
    labels: Result<Vec<LabelPair>>,
    value: AtomicF64,
}

impl Gauge {
    /// Unlabeled gauge. Register it through `into_collector()`.
    pub fn new(opts: Opts) -> Self {
        Self::with_desc(Arc::new(opts.desc(&[])), &[])
    }

    pub(crate) fn with_desc(desc: Arc<Desc>, label_values: &[String]) -> Self {
        let labels = resolve_labels(&desc, label_values);
        Self {
            desc,
            labels,
            value: AtomicF64::new(0.0),
        }
    }

    pub fn set(&self, v: f64) {
        self.value.set(v);
    }

    pub fn inc(&self) {
        self.value.add(1.0);
    }

    pub fn dec(&self) {
        self.value.add(-1.0);
    }

    pub fn add(&self, v: f64) {
        self.value.add(v);
    }

    pub fn sub(&self, v: f64) {
        self.value.add(-v);
    }

    pub fn get(&self) -> f64 {
        self.value.get()
    }
}

impl Metric for Gauge {
    fn desc(&self) -> &Arc<Desc> {
        &self.desc
    }

    fn write(&self) -> Result<MetricRecord> {
        Ok(MetricRecord::new(
            self.labels.clone()?,
            MetricValue::Gauge {
                value: self.value.get(),
            },
        ))
    }
}
