use std::sync::Arc;

use tally_core::error::Result;
use tally_core::{Desc, LabelPair, Metric, MetricRecord, MetricValue, Opts};

use super::atomic::AtomicF64;
use super::resolve_labels;

/// Monotonically increasing value.
#[derive(Debug)]
pub struct Counter {
    desc: Arc<Desc>,
    labels: Result<Vec<LabelPair>>,
    value: AtomicF64,
}

impl Counter {
    /// Unlabeled counter. Register it through `into_collector()`.
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

    pub fn inc(&self) {
        self.value.add(1.0);
    }

    /// Add a non-negative delta. Negative deltas are dropped.
    pub fn add(&self, v: f64) {
        if v < 0.0 {
            tracing::warn!(
                name = %self.desc.fq_name(),
                delta = v,
                "counter cannot decrease, delta dropped"
            );
            return;
        }
        self.value.add(v);
    }

    pub fn get(&self) -> f64 {
        self.value.get()
    }
}

impl Metric for Counter {
    fn desc(&self) -> &Arc<Desc> {
        &self.desc
    }

    fn write(&self) -> Result<MetricRecord> {
        Ok(MetricRecord::new(
            self.labels.clone()?,
            MetricValue::Counter {
                value: self.value.get(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_ignores_negative_deltas() {
        let c = Counter::new(Opts::new("jobs_total", "Jobs processed."));
        c.inc();
        c.add(2.5);
        c.add(-10.0);
        assert_eq!(c.get(), 3.5);

        let rec = c.write().unwrap();
        assert_eq!(rec.value, MetricValue::Counter { value: 3.5 });
        assert!(rec.labels.is_empty());
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let c = Arc::new(Counter::new(Opts::new("hits_total", "Hits.")));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        c.inc();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.get(), 8000.0);
    }

    #[test]
    fn invalid_desc_fails_on_write() {
        let c = Counter::new(Opts::new("bad name", "Broken."));
        c.inc();
        let e = c.write().unwrap_err();
        assert_eq!(e.kind().as_str(), "DESCRIPTOR_INVALID");
    }
}
