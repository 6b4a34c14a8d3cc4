use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tally_core::error::{Result, TallyError};
use tally_core::{Bucket, Desc, HistogramOpts, LabelPair, Metric, MetricRecord, MetricValue};

use super::atomic::AtomicF64;
use super::resolve_labels;

/// Check bucket upper bounds: non-empty, finite, strictly increasing.
/// A trailing `+Inf` is implicit and dropped.
pub(crate) fn validate_buckets(name: &str, mut buckets: Vec<f64>) -> Result<Vec<f64>> {
    if buckets.last() == Some(&f64::INFINITY) {
        buckets.pop();
    }
    if buckets.is_empty() {
        return Err(TallyError::BadConfig(format!(
            "histogram {name} needs at least one finite bucket"
        )));
    }
    if buckets.iter().any(|b| !b.is_finite()) {
        return Err(TallyError::BadConfig(format!(
            "histogram {name} buckets must be finite"
        )));
    }
    if buckets.windows(2).any(|w| w[0] >= w[1]) {
        return Err(TallyError::BadConfig(format!(
            "histogram {name} buckets must be strictly increasing"
        )));
    }
    Ok(buckets)
}

/// Cumulative-bucket histogram.
///
/// Every bucket whose bound is `>=` the observation is incremented on
/// `observe`, so `write` only loads counters. Count, sum and buckets are
/// separate atomics: a write racing an observation may see them one sample
/// apart.
#[derive(Debug)]
pub struct Histogram {
    desc: Arc<Desc>,
    labels: Result<Vec<LabelPair>>,
    upper_bounds: Arc<[f64]>,
    buckets: Vec<AtomicU64>,
    count: AtomicU64,
    sum: AtomicF64,
}

impl Histogram {
    /// Unlabeled histogram. Register it through `into_collector()`.
    pub fn new(opts: HistogramOpts) -> Result<Self> {
        let desc = Arc::new(opts.common.desc(&[]));
        let bounds = validate_buckets(desc.fq_name(), opts.buckets)?;
        Ok(Self::with_desc(desc, bounds.into(), &[]))
    }

    pub(crate) fn with_desc(
        desc: Arc<Desc>,
        upper_bounds: Arc<[f64]>,
        label_values: &[String],
    ) -> Self {
        let labels = resolve_labels(&desc, label_values);
        let buckets = upper_bounds.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            desc,
            labels,
            upper_bounds,
            buckets,
            count: AtomicU64::new(0),
            sum: AtomicF64::new(0.0),
        }
    }

    pub fn observe(&self, v: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.add(v);
        for (i, &b) in self.upper_bounds.iter().enumerate() {
            if v <= b {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Observe a duration in seconds.
    pub fn observe_duration(&self, d: Duration) {
        self.observe(d.as_secs_f64());
    }

    pub fn sample_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sample_sum(&self) -> f64 {
        self.sum.get()
    }
}

impl Metric for Histogram {
    fn desc(&self) -> &Arc<Desc> {
        &self.desc
    }

    fn write(&self) -> Result<MetricRecord> {
        let buckets = self
            .upper_bounds
            .iter()
            .zip(&self.buckets)
            .map(|(&upper_bound, c)| Bucket {
                upper_bound,
                cumulative_count: c.load(Ordering::Relaxed),
            })
            .collect();
        Ok(MetricRecord::new(
            self.labels.clone()?,
            MetricValue::Histogram {
                sample_count: self.count.load(Ordering::Relaxed),
                sample_sum: self.sum.get(),
                buckets,
            },
        ))
    }
}
