use std::fmt;
use std::sync::Arc;

use tally_core::error::{Result, TallyError};
use tally_core::{Desc, LabelPair, Metric, MetricRecord, MetricType, MetricValue};

use super::resolve_labels;

type Callback = Box<dyn Fn() -> f64 + Send + Sync>;

/// Metric whose value is computed by a closure at write time.
///
/// Only constant labels are supported; the descriptor must declare no
/// variable labels.
pub struct CallbackMetric {
    desc: Arc<Desc>,
    labels: Result<Vec<LabelPair>>,
    metric_type: MetricType,
    callback: Callback,
}

impl CallbackMetric {
    /// Untyped metric.
    pub fn new<F>(desc: Desc, callback: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self::typed(desc, MetricType::Untyped, callback)
    }

    pub fn gauge<F>(desc: Desc, callback: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self::typed(desc, MetricType::Gauge, callback)
    }

    pub fn counter<F>(desc: Desc, callback: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self::typed(desc, MetricType::Counter, callback)
    }

    fn typed<F>(desc: Desc, metric_type: MetricType, callback: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        let labels = resolve_labels(&desc, &[]);
        Self {
            desc: Arc::new(desc),
            labels,
            metric_type,
            callback: Box::new(callback),
        }
    }
}

impl fmt::Debug for CallbackMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackMetric")
            .field("desc", &self.desc)
            .field("metric_type", &self.metric_type)
            .finish_non_exhaustive()
    }
}

impl Metric for CallbackMetric {
    fn desc(&self) -> &Arc<Desc> {
        &self.desc
    }

    fn write(&self) -> Result<MetricRecord> {
        let labels = self.labels.clone()?;
        let value = MetricValue::scalar(self.metric_type, (self.callback)())
            .ok_or_else(|| TallyError::Internal("callback metric with non-scalar type".into()))?;
        Ok(MetricRecord::new(labels, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn reads_fresh_value_on_every_write() {
        let src = Arc::new(AtomicU64::new(1));
        let read = Arc::clone(&src);
        let m = CallbackMetric::new(
            Desc::new("open_files", "Open file handles.", &[], &[]),
            move || read.load(Ordering::Relaxed) as f64,
        );

        assert_eq!(m.write().unwrap().value, MetricValue::Untyped { value: 1.0 });
        src.store(42, Ordering::Relaxed);
        assert_eq!(m.write().unwrap().value, MetricValue::Untyped { value: 42.0 });
    }

    #[test]
    fn variable_labels_are_rejected_at_write() {
        let desc = Desc::new("temp_celsius", "Temp.", &["sensor"], &[]);
        let m = CallbackMetric::gauge(desc, || 21.0);
        assert_eq!(m.write().unwrap_err().kind().as_str(), "LABEL_CARDINALITY");
    }
}
