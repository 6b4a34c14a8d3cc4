//! Stock metric types.
//!
//! Values live in atomics so the instrumentation path never takes a lock.
//! Labeled variants keep their children in a `DashMap` keyed by label values.

mod atomic;
pub mod callback;
pub mod counter;
pub mod gauge;
pub mod histogram;
pub mod vec;

use tally_core::error::{Result, TallyError};
use tally_core::{Desc, LabelPair};

pub use callback::CallbackMetric;
pub use counter::Counter;
pub use gauge::Gauge;
pub use histogram::Histogram;
pub use vec::{CounterVec, GaugeVec, HistogramVec, MetricVec};

/// Resolve the full label set of one child up front so `write` only reads
/// atomics. A failure is kept and returned from every `write`.
fn resolve_labels(desc: &Desc, label_values: &[String]) -> Result<Vec<LabelPair>> {
    if let Some(cause) = desc.err() {
        return Err(TallyError::DescriptorInvalid {
            desc: desc.to_string(),
            cause: cause.to_string(),
        });
    }
    desc.label_pairs(label_values)
        .ok_or_else(|| TallyError::LabelCardinality {
            name: desc.fq_name().to_string(),
            expected: desc.variable_labels().len(),
            got: label_values.len(),
        })
}
