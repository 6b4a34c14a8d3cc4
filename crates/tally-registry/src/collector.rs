use std::ops::Deref;
use std::sync::Arc;

use tally_core::error::{Result, TallyError};
use tally_core::{Desc, Metric, MetricRecord};

/// Anything that can produce metrics on demand.
///
/// `describe` must return every descriptor the collector could ever emit
/// (a superset is fine; the registry tolerates emitting fewer). `collect`
/// runs synchronously, on the blocking pool, once per gather pass.
pub trait Collector: Send + Sync + 'static {
    fn describe(&self) -> Vec<Arc<Desc>>;

    fn collect(&self, sink: &mut MetricSink) -> Result<()>;

    /// Label used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// One metric value as read during a collection pass.
#[derive(Debug, Clone)]
pub struct CollectedMetric {
    pub desc: Arc<Desc>,
    pub record: MetricRecord,
}

/// Receives metrics from a collector. Values are written on `emit`, so the
/// record always reflects the metric at the time of the current pass.
#[derive(Debug, Default)]
pub struct MetricSink {
    metrics: Vec<CollectedMetric>,
    errors: Vec<TallyError>,
}

impl MetricSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the metric's current value. A failed write is kept as a
    /// collection error and does not stop the collector.
    pub fn emit(&mut self, metric: &dyn Metric) {
        match metric.write() {
            Ok(record) => self.metrics.push(CollectedMetric {
                desc: Arc::clone(metric.desc()),
                record,
            }),
            Err(e) => self.errors.push(e),
        }
    }

    pub fn emit_record(&mut self, desc: Arc<Desc>, record: MetricRecord) {
        self.metrics.push(CollectedMetric { desc, record });
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn metrics(&self) -> &[CollectedMetric] {
        &self.metrics
    }

    pub(crate) fn into_parts(self) -> (Vec<CollectedMetric>, Vec<TallyError>) {
        (self.metrics, self.errors)
    }
}

/// Turns a single metric into a collector of exactly that metric.
///
/// The adapter owns the metric, so both share one lifetime. It also
/// implements `Metric` and derefs to the wrapped value, so callers keep
/// instrumenting through it after registration.
#[derive(Debug)]
pub struct SelfCollector<M> {
    metric: M,
}

impl<M: Metric + 'static> SelfCollector<M> {
    pub fn new(metric: M) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }
}

impl<M> Deref for SelfCollector<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.metric
    }
}

impl<M: Metric + 'static> Metric for SelfCollector<M> {
    fn desc(&self) -> &Arc<Desc> {
        self.metric.desc()
    }

    fn write(&self) -> Result<MetricRecord> {
        self.metric.write()
    }
}

impl<M: Metric + 'static> Collector for SelfCollector<M> {
    fn describe(&self) -> Vec<Arc<Desc>> {
        vec![Arc::clone(self.metric.desc())]
    }

    fn collect(&self, sink: &mut MetricSink) -> Result<()> {
        sink.emit(&self.metric);
        Ok(())
    }

    fn name(&self) -> &str {
        self.metric.desc().fq_name()
    }
}

/// `metric.into_collector()` for any metric.
pub trait IntoCollector: Metric + Sized + 'static {
    fn into_collector(self) -> SelfCollector<Self> {
        SelfCollector::new(self)
    }
}

impl<M: Metric + Sized + 'static> IntoCollector for M {}
