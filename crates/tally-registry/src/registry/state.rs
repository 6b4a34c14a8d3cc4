//! Registration tables.
//!
//! - `descs`: identity fingerprint -> (descriptor, owning collector)
//! - `names`: fully-qualified name -> (dimension fingerprint, refcount)
//! - `collectors`: collector key -> (collector, owned descriptor ids)
//! - `unchecked`: collectors that describe nothing
//!
//! Only mutated through `register`/`unregister` under the registry's write
//! lock. `register` validates everything before inserting anything.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tally_core::error::{Result, TallyError};
use tally_core::Desc;

use crate::collector::Collector;

/// Collector identity: address of its `Arc` allocation.
pub(crate) type CollectorKey = usize;

pub(crate) fn collector_key<C: ?Sized>(c: &Arc<C>) -> CollectorKey {
    Arc::as_ptr(c) as *const () as usize
}

#[derive(Clone)]
pub(crate) struct DescEntry {
    pub(crate) desc: Arc<Desc>,
    pub(crate) owner: CollectorKey,
}

struct NameEntry {
    dim_hash: u64,
    refs: usize,
}

struct CollectorEntry {
    collector: Arc<dyn Collector>,
    desc_ids: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Registration {
    Added,
    AlreadyRegistered,
    Unchecked,
}

/// One collector to run during a gather pass.
#[derive(Clone)]
pub(crate) struct CollectJob {
    pub(crate) key: CollectorKey,
    pub(crate) collector: Arc<dyn Collector>,
    pub(crate) checked: bool,
}

/// Point-in-time copy of the tables, taken under the read lock.
pub(crate) struct Snapshot {
    pub(crate) jobs: Vec<CollectJob>,
    pub(crate) descs: HashMap<u64, DescEntry>,
}

#[derive(Default)]
pub(crate) struct RegistryState {
    descs: HashMap<u64, DescEntry>,
    names: HashMap<String, NameEntry>,
    collectors: HashMap<CollectorKey, CollectorEntry>,
    unchecked: HashMap<CollectorKey, Arc<dyn Collector>>,
}

impl RegistryState {
    pub(crate) fn register(
        &mut self,
        key: CollectorKey,
        collector: Arc<dyn Collector>,
        described: Vec<Arc<Desc>>,
    ) -> Result<Registration> {
        for d in &described {
            if let Some(cause) = d.err() {
                return Err(TallyError::DescriptorInvalid {
                    desc: d.to_string(),
                    cause: cause.to_string(),
                });
            }
        }

        if described.is_empty() {
            if self.unchecked.contains_key(&key) {
                return Ok(Registration::AlreadyRegistered);
            }
            self.unchecked.insert(key, collector);
            return Ok(Registration::Unchecked);
        }

        // Collapse repeats and check the collector agrees with itself.
        let mut own: BTreeMap<u64, Arc<Desc>> = BTreeMap::new();
        let mut own_dims: HashMap<&str, u64> = HashMap::new();
        for d in &described {
            if let Some(prev) = own.get(&d.id()) {
                if prev.dim_hash() != d.dim_hash() {
                    return Err(TallyError::InconsistentDescriptor(format!(
                        "collector declares {d} twice with different help or label names"
                    )));
                }
                continue;
            }
            match own_dims.get(d.fq_name()) {
                Some(h) if *h != d.dim_hash() => {
                    return Err(TallyError::InconsistentDescriptor(format!(
                        "collector declares {d} unlike its other descriptors of that name"
                    )));
                }
                Some(_) => {}
                None => {
                    own_dims.insert(d.fq_name(), d.dim_hash());
                }
            }
            own.insert(d.id(), Arc::clone(d));
        }

        if let Some(existing) = self.collectors.get(&key) {
            let unchanged = existing.desc_ids.len() == own.len()
                && own.iter().all(|(id, d)| {
                    self.descs
                        .get(id)
                        .is_some_and(|e| e.owner == key && e.desc.is_consistent_with(d))
                });
            if unchanged {
                return Ok(Registration::AlreadyRegistered);
            }
            return Err(TallyError::InconsistentDescriptor(format!(
                "collector {} is already registered with a different descriptor set",
                collector.name()
            )));
        }

        for (id, d) in &own {
            if let Some(e) = self.descs.get(id) {
                if e.desc.dim_hash() != d.dim_hash() {
                    return Err(TallyError::InconsistentDescriptor(format!(
                        "{d} has the identity of registered {} but different help or label names",
                        e.desc
                    )));
                }
                return Err(TallyError::DuplicateDescriptor(format!(
                    "{d} is already registered by another collector"
                )));
            }
            if let Some(n) = self.names.get(d.fq_name()) {
                if n.dim_hash != d.dim_hash() {
                    return Err(TallyError::InconsistentDescriptor(format!(
                        "a registered descriptor named like {d} has different label names or help"
                    )));
                }
            }
        }

        for (id, d) in &own {
            self.descs.insert(
                *id,
                DescEntry {
                    desc: Arc::clone(d),
                    owner: key,
                },
            );
            self.names
                .entry(d.fq_name().to_string())
                .and_modify(|n| n.refs += 1)
                .or_insert(NameEntry {
                    dim_hash: d.dim_hash(),
                    refs: 1,
                });
        }
        self.collectors.insert(
            key,
            CollectorEntry {
                collector,
                desc_ids: own.keys().copied().collect(),
            },
        );
        Ok(Registration::Added)
    }

    /// Remove everything owned by `key`. Returns whether it was registered.
    pub(crate) fn unregister(&mut self, key: CollectorKey) -> bool {
        if self.unchecked.remove(&key).is_some() {
            return true;
        }
        let Some(entry) = self.collectors.remove(&key) else {
            return false;
        };
        for id in entry.desc_ids {
            let Some(e) = self.descs.remove(&id) else { continue };
            let name = e.desc.fq_name();
            let drop_name = match self.names.get_mut(name) {
                Some(n) => {
                    n.refs -= 1;
                    n.refs == 0
                }
                None => false,
            };
            if drop_name {
                self.names.remove(name);
            }
        }
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.collectors.len() + self.unchecked.len()
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let checked = self.collectors.iter().map(|(key, e)| CollectJob {
            key: *key,
            collector: Arc::clone(&e.collector),
            checked: true,
        });
        let unchecked = self.unchecked.iter().map(|(key, c)| CollectJob {
            key: *key,
            collector: Arc::clone(c),
            checked: false,
        });
        Snapshot {
            jobs: checked.chain(unchecked).collect(),
            descs: self.descs.clone(),
        }
    }
}
