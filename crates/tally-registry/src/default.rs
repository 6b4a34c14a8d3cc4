//! Process-wide default registry.
//!
//! Convenience for applications that want one registry; every operation is
//! also available on an explicit `Registry` value.

use std::sync::{Arc, OnceLock};

use tally_core::error::Result;

use crate::collector::Collector;
use crate::registry::{Gathered, Registry};

static DEFAULT_REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The default registry, created with default config on first use.
pub fn global() -> &'static Registry {
    DEFAULT_REGISTRY.get_or_init(Registry::new)
}

pub fn register(collector: Arc<dyn Collector>) -> Result<()> {
    global().register(collector)
}

pub fn must_register<I>(collectors: I)
where
    I: IntoIterator<Item = Arc<dyn Collector>>,
{
    global().must_register(collectors)
}

pub fn unregister<C: Collector + ?Sized>(collector: &Arc<C>) -> bool {
    global().unregister(collector)
}

pub async fn gather() -> Gathered {
    global().gather().await
}
