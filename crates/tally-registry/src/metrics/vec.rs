//! Label-partitioned metrics.
//!
//! One descriptor with variable labels; one child metric per distinct set of
//! label values, created on first use. Children live in a `DashMap` so lookups
//! from many threads only contend per shard.

use std::sync::Arc;

use dashmap::DashMap;

use tally_core::error::{Result, TallyError};
use tally_core::{Desc, HistogramOpts, Metric, Opts};

use crate::collector::{Collector, MetricSink};

use super::histogram::validate_buckets;
use super::{Counter, Gauge, Histogram};

type NewChild<M> = Box<dyn Fn(Arc<Desc>, &[String]) -> M + Send + Sync>;

pub struct MetricVec<M> {
    desc: Arc<Desc>,
    children: DashMap<Vec<String>, Arc<M>>,
    new_child: NewChild<M>,
}

pub type CounterVec = MetricVec<Counter>;
pub type GaugeVec = MetricVec<Gauge>;
pub type HistogramVec = MetricVec<Histogram>;

impl<M: Metric + 'static> MetricVec<M> {
    fn from_parts(desc: Desc, new_child: NewChild<M>) -> Self {
        Self {
            desc: Arc::new(desc),
            children: DashMap::new(),
            new_child,
        }
    }

    fn key(&self, values: &[&str]) -> Result<Vec<String>> {
        if let Some(cause) = self.desc.err() {
            return Err(TallyError::DescriptorInvalid {
                desc: self.desc.to_string(),
                cause: cause.to_string(),
            });
        }
        let expected = self.desc.variable_labels().len();
        if values.len() != expected {
            return Err(TallyError::LabelCardinality {
                name: self.desc.fq_name().to_string(),
                expected,
                got: values.len(),
            });
        }
        Ok(values.iter().map(|v| v.to_string()).collect())
    }

    /// Child for `values` (in variable label order), created on first use.
    pub fn with_label_values(&self, values: &[&str]) -> Result<Arc<M>> {
        let key = self.key(values)?;
        if let Some(child) = self.children.get(&key) {
            return Ok(Arc::clone(child.value()));
        }
        let values = key.clone();
        let child = self
            .children
            .entry(key)
            .or_insert_with(|| Arc::new((self.new_child)(Arc::clone(&self.desc), &values)));
        Ok(Arc::clone(child.value()))
    }

    /// Drop one child. Returns whether it existed.
    pub fn remove_label_values(&self, values: &[&str]) -> bool {
        match self.key(values) {
            Ok(key) => self.children.remove(&key).is_some(),
            Err(_) => false,
        }
    }

    /// Drop every child.
    pub fn reset(&self) {
        self.children.clear();
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn desc(&self) -> &Arc<Desc> {
        &self.desc
    }
}

impl MetricVec<Counter> {
    pub fn new(opts: Opts, label_names: &[&str]) -> Self {
        Self::from_parts(
            opts.desc(label_names),
            Box::new(|desc: Arc<Desc>, values: &[String]| Counter::with_desc(desc, values)),
        )
    }
}

impl MetricVec<Gauge> {
    pub fn new(opts: Opts, label_names: &[&str]) -> Self {
        Self::from_parts(
            opts.desc(label_names),
            Box::new(|desc: Arc<Desc>, values: &[String]| Gauge::with_desc(desc, values)),
        )
    }
}

impl MetricVec<Histogram> {
    pub fn new(opts: HistogramOpts, label_names: &[&str]) -> Result<Self> {
        let desc = opts.common.desc(label_names);
        let bounds: Arc<[f64]> = validate_buckets(desc.fq_name(), opts.buckets)?.into();
        Ok(Self::from_parts(
            desc,
            Box::new(move |desc: Arc<Desc>, values: &[String]| {
                Histogram::with_desc(desc, Arc::clone(&bounds), values)
            }),
        ))
    }
}

impl<M: Metric + 'static> Collector for MetricVec<M> {
    fn describe(&self) -> Vec<Arc<Desc>> {
        vec![Arc::clone(&self.desc)]
    }

    fn collect(&self, sink: &mut MetricSink) -> Result<()> {
        for child in self.children.iter() {
            sink.emit(child.value().as_ref());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.desc.fq_name()
    }
}
