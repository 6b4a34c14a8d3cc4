use std::time::Duration;

use serde::Deserialize;
use tally_core::error::{Result, TallyError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    pub version: u32,

    #[serde(default)]
    pub registry: RegistrySection,
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(TallyError::UnsupportedVersion);
        }
        self.registry.validate()?;
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            version: 1,
            registry: RegistrySection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    /// Deadline for one whole gather pass.
    #[serde(default = "default_gather_timeout_ms")]
    pub gather_timeout_ms: u64,

    /// Collectors running at once during a gather pass.
    #[serde(default = "default_max_concurrent_collects")]
    pub max_concurrent_collects: usize,

    /// Panic on duplicate/inconsistent registration instead of returning the error.
    #[serde(default)]
    pub fail_fast_on_conflict: bool,
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            gather_timeout_ms: default_gather_timeout_ms(),
            max_concurrent_collects: default_max_concurrent_collects(),
            fail_fast_on_conflict: false,
        }
    }
}

impl RegistrySection {
    pub fn validate(&self) -> Result<()> {
        if !(10..=300_000).contains(&self.gather_timeout_ms) {
            return Err(TallyError::BadConfig(
                "registry.gather_timeout_ms must be between 10 and 300000".into(),
            ));
        }
        if !(1..=1024).contains(&self.max_concurrent_collects) {
            return Err(TallyError::BadConfig(
                "registry.max_concurrent_collects must be between 1 and 1024".into(),
            ));
        }
        Ok(())
    }

    pub fn gather_timeout(&self) -> Duration {
        Duration::from_millis(self.gather_timeout_ms)
    }
}

fn default_gather_timeout_ms() -> u64 {
    10_000
}
fn default_max_concurrent_collects() -> usize {
    16
}
