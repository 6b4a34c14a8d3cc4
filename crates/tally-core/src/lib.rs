//! tally core: metric descriptors, the metric protocol, snapshot model, and errors.
//!
//! This crate defines the contracts shared by the registry, custom collectors,
//! and exposition tooling. It intentionally carries no runtime dependencies so
//! instrumentation call sites can depend on it without pulling in an executor.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed descriptors never abort the caller; they carry their validation
//! error until registration surfaces it.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod model;

/// Shared result type.
pub use error::{ErrorKind, Result, TallyError};
pub use model::{
    build_fq_name, Bucket, ConstMetric, Desc, HistogramOpts, LabelPair, Metric, MetricFamily,
    MetricRecord, MetricType, MetricValue, Opts, Quantile,
};
