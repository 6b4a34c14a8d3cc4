//! tally registry library entry.
//!
//! This crate wires the collector protocol, the stock metric types, and the
//! registry that enforces descriptor consistency and drives the concurrent
//! gather pass. It is consumed by the demo binary (`main.rs`), the facade
//! crate, and integration tests.

pub mod collector;
pub mod config;
pub mod default;
pub mod expose;
pub mod metrics;
pub mod registry;

pub use collector::{CollectedMetric, Collector, IntoCollector, MetricSink, SelfCollector};
pub use default::{gather, global, must_register, register, unregister};
pub use registry::{Gathered, Gatherer, Registry};
