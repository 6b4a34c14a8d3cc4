//! Test collectors shared by the registry integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use tally_core::error::{Result, TallyError};
use tally_core::model::ConstMetric;
use tally_core::{Desc, MetricType};
use tally_registry::{Collector, MetricSink};

/// Declares a fixed descriptor set and emits fixed values.
pub struct FixedCollector {
    pub descs: Vec<Arc<Desc>>,
    pub emit: Vec<ConstMetric>,
    pub fail: bool,
    pub panic: bool,
    pub delay: Option<Duration>,
}

impl FixedCollector {
    pub fn new(descs: Vec<Arc<Desc>>, emit: Vec<ConstMetric>) -> Self {
        Self {
            descs,
            emit,
            fail: false,
            panic: false,
            delay: None,
        }
    }

    /// One unlabeled gauge declaring and emitting `desc`.
    pub fn single(desc: Desc, value: f64) -> Self {
        let desc = Arc::new(desc);
        let emit = if desc.is_valid() {
            vec![ConstMetric::new(Arc::clone(&desc), MetricType::Gauge, value, &[]).unwrap()]
        } else {
            vec![]
        };
        Self::new(vec![desc], emit)
    }

    pub fn named(name: &str, value: f64) -> Self {
        Self::single(Desc::new(name, "Test metric.", &[], &[]), value)
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Emits values but declares nothing.
    pub fn unchecked(mut self) -> Self {
        self.descs.clear();
        self
    }

    pub fn arc(self) -> Arc<dyn Collector> {
        Arc::new(self)
    }
}

impl Collector for FixedCollector {
    fn describe(&self) -> Vec<Arc<Desc>> {
        self.descs.clone()
    }

    fn collect(&self, sink: &mut MetricSink) -> Result<()> {
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
        if self.panic {
            panic!("collector blew up");
        }
        if self.fail {
            return Err(TallyError::CollectionFailed("backend unreachable".into()));
        }
        for m in &self.emit {
            sink.emit(m);
        }
        Ok(())
    }
}
