//! Registry: owns registered collectors, enforces descriptor consistency
//! across all of them, and drives the gather pass.
//!
//! Register/unregister take the write lock briefly. Gather takes the read
//! lock only long enough to copy the tables, then runs collectors with no
//! lock held so slow user code never stalls registration.

mod gather;
mod state;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use tally_core::error::Result;

use crate::collector::Collector;
use crate::config::{RegistryConfig, RegistrySection};

pub use gather::Gathered;
use gather::Stalled;
use state::{collector_key, Registration, RegistryState};

/// Anything that can produce a gather result.
#[async_trait]
pub trait Gatherer: Send + Sync {
    async fn gather(&self) -> Gathered;
}

#[derive(Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
    stalled: Stalled,
    cfg: RegistrySection,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with explicit settings. Out-of-range values are rejected
    /// with `BadConfig` before any gather can see them.
    pub fn with_config(cfg: RegistrySection) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            state: RwLock::new(RegistryState::default()),
            stalled: Stalled::default(),
            cfg,
        })
    }

    pub fn from_config(cfg: &RegistryConfig) -> Result<Self> {
        cfg.validate()?;
        Self::with_config(cfg.registry.clone())
    }

    pub fn config(&self) -> &RegistrySection {
        &self.cfg
    }

    // Tables are only written after validation passes, so a poisoned lock
    // still guards consistent state.
    fn read_state(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a collector. All-or-nothing across its descriptor set.
    /// Registering the same instance again is a no-op.
    ///
    /// With `fail_fast_on_conflict`, duplicate/inconsistent descriptors panic.
    pub fn register(&self, collector: Arc<dyn Collector>) -> Result<()> {
        let described = collector.describe();
        let key = collector_key(&collector);
        let name = collector.name().to_string();

        let res = self.write_state().register(key, collector, described);
        match res {
            Ok(Registration::Added) => {
                tracing::debug!(collector = %name, "collector registered");
                Ok(())
            }
            Ok(Registration::AlreadyRegistered) => {
                tracing::debug!(collector = %name, "collector already registered");
                Ok(())
            }
            Ok(Registration::Unchecked) => {
                tracing::debug!(
                    collector = %name,
                    "collector registered without descriptors (unchecked)"
                );
                Ok(())
            }
            Err(e) => {
                if self.cfg.fail_fast_on_conflict && e.is_conflict() {
                    tracing::error!(
                        collector = %name,
                        error = %e,
                        "registration conflict (fail-fast)"
                    );
                    panic!("metric registration conflict: {e}");
                }
                tracing::warn!(
                    collector = %name,
                    code = e.kind().as_str(),
                    error = %e,
                    "registration rejected"
                );
                Err(e)
            }
        }
    }

    /// Register every collector, panicking on the first error.
    /// Meant for process start-up.
    pub fn must_register<I>(&self, collectors: I)
    where
        I: IntoIterator<Item = Arc<dyn Collector>>,
    {
        for c in collectors {
            if let Err(e) = self.register(c) {
                panic!("metric registration failed: {e}");
            }
        }
    }

    /// Remove a collector and every descriptor it owns.
    /// Returns `false` if it was not registered.
    pub fn unregister<C: Collector + ?Sized>(&self, collector: &Arc<C>) -> bool {
        let removed = self.write_state().unregister(collector_key(collector));
        if removed {
            tracing::debug!(collector = %collector.name(), "collector unregistered");
        }
        removed
    }

    /// Number of registered collectors.
    pub fn len(&self) -> usize {
        self.read_state().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Collect every registered collector concurrently. Never fails as a
    /// whole: failing or timed-out collectors are reported in `errors`.
    /// A collector whose previous run is still stuck past its deadline is not
    /// invoked again until that run returns.
    pub async fn gather(&self) -> Gathered {
        let snapshot = self.read_state().snapshot();
        gather::gather(snapshot, &self.cfg, &self.stalled).await
    }
}

#[async_trait]
impl Gatherer for Registry {
    async fn gather(&self) -> Gathered {
        Registry::gather(self).await
    }
}
