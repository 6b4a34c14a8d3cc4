//! Top-level facade crate for tally.
//!
//! Re-exports core types and the registry library so users can depend on a single crate.

pub mod core {
    pub use tally_core::*;
}

pub mod registry {
    pub use tally_registry::*;
}

pub use tally_core::{Desc, Metric, MetricFamily, Opts, Result, TallyError};
pub use tally_registry::{Collector, IntoCollector, Registry, SelfCollector};
