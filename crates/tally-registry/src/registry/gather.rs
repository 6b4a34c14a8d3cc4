//! Gather pass: concurrent fan-out over collectors, then validation and
//! merging into families.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};

use tally_core::error::{Result, TallyError};
use tally_core::{LabelPair, MetricFamily};

use crate::collector::{CollectedMetric, MetricSink};
use crate::config::RegistrySection;

use super::state::{CollectJob, CollectorKey, DescEntry, Snapshot};

/// Result of one gather pass: every family that could be collected, plus the
/// non-fatal errors encountered on the way.
#[derive(Debug, Default, Serialize)]
pub struct Gathered {
    pub families: Vec<MetricFamily>,
    pub errors: Vec<TallyError>,
}

impl Gathered {
    pub fn family(&self, name: &str) -> Option<&MetricFamily> {
        self.families.iter().find(|f| f.name == name)
    }
}

fn job_label(job: &CollectJob) -> String {
    job.collector.name().to_string()
}

/// Abandoned runs still executing on the blocking pool, per collector.
pub(crate) type Stalled = Arc<DashMap<CollectorKey, usize>>;

const RUNNING: u8 = 0;
const DONE: u8 = 1;
const ABANDONED: u8 = 2;

fn release_stall(stalled: &Stalled, key: CollectorKey) {
    if let Some(mut n) = stalled.get_mut(&key) {
        *n = n.saturating_sub(1);
    }
    stalled.remove_if(&key, |_, n| *n == 0);
}

/// Ends one blocking run; drops the stall count if the pass gave up on it.
/// Runs on unwind too.
struct FinishGuard {
    state: Arc<AtomicU8>,
    stalled: Stalled,
    key: CollectorKey,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let ended = self
            .state
            .compare_exchange(RUNNING, DONE, Ordering::SeqCst, Ordering::SeqCst);
        if ended.is_err() {
            release_stall(&self.stalled, self.key);
        }
    }
}

/// Run one collector on the blocking pool. The deadline covers waiting for a
/// concurrency permit as well as the collection itself.
async fn run_job(
    job: &CollectJob,
    permits: Arc<Semaphore>,
    deadline: Instant,
    timeout_ms: u64,
    stalled: &Stalled,
) -> Result<MetricSink> {
    let state = Arc::new(AtomicU8::new(RUNNING));
    let spawned = Arc::new(AtomicBool::new(false));

    let collector = Arc::clone(&job.collector);
    let guard_state = Arc::clone(&state);
    let guard_stalled = Arc::clone(stalled);
    let key = job.key;
    let spawned_flag = Arc::clone(&spawned);
    let work = async move {
        let permit = permits
            .acquire_owned()
            .await
            .map_err(|_| TallyError::Internal("gather semaphore closed".into()))?;
        let handle = tokio::task::spawn_blocking(move || {
            let _guard = FinishGuard {
                state: guard_state,
                stalled: guard_stalled,
                key,
            };
            let _permit = permit;
            let mut sink = MetricSink::new();
            collector.collect(&mut sink).map(|_| sink)
        });
        spawned_flag.store(true, Ordering::SeqCst);
        match handle.await {
            Ok(res) => res,
            Err(e) => Err(TallyError::CollectionFailed(format!("collector panicked: {e}"))),
        }
    };

    match timeout_at(deadline, work).await {
        Ok(Ok(sink)) => Ok(sink),
        Ok(Err(TallyError::CollectionFailed(msg))) => Err(TallyError::CollectionFailed(format!(
            "{}: {msg}",
            job_label(job)
        ))),
        Ok(Err(e)) => Err(TallyError::CollectionFailed(format!("{}: {e}", job_label(job)))),
        Err(_) => {
            // the blocking task cannot be cancelled; count it until it returns
            if spawned.load(Ordering::SeqCst) {
                *stalled.entry(job.key).or_insert(0) += 1;
                let gave_up =
                    state.compare_exchange(RUNNING, ABANDONED, Ordering::SeqCst, Ordering::SeqCst);
                if gave_up.is_err() {
                    release_stall(stalled, job.key);
                }
            }
            Err(TallyError::CollectionTimeout {
                collector: job_label(job),
                timeout_ms,
            })
        }
    }
}

pub(crate) async fn gather(
    snapshot: Snapshot,
    cfg: &RegistrySection,
    stalled: &Stalled,
) -> Gathered {
    let timeout_ms = cfg.gather_timeout_ms;
    let deadline = Instant::now() + cfg.gather_timeout();
    let permits = Arc::new(Semaphore::new(cfg.max_concurrent_collects));

    let Snapshot { jobs, descs } = snapshot;

    let mut errors = Vec::new();
    let mut futs = FuturesUnordered::new();
    for job in jobs {
        if stalled.contains_key(&job.key) {
            errors.push(TallyError::CollectionStillRunning {
                collector: job_label(&job),
            });
            continue;
        }
        let permits = Arc::clone(&permits);
        futs.push(async move {
            let res = run_job(&job, permits, deadline, timeout_ms, stalled).await;
            (job, res)
        });
    }

    let mut merger = FamilyMerger::new(&descs);
    while let Some((job, res)) = futs.next().await {
        match res {
            Ok(sink) => {
                let (metrics, write_errors) = sink.into_parts();
                for e in write_errors {
                    errors.push(TallyError::CollectionFailed(format!(
                        "{}: {e}",
                        job_label(&job)
                    )));
                }
                for m in metrics {
                    if let Err(e) = merger.push(&job, m) {
                        errors.push(e);
                    }
                }
            }
            Err(e) => errors.push(e),
        }
    }

    for e in &errors {
        tracing::warn!(code = e.kind().as_str(), error = %e, "collection error");
    }

    let families = merger.finish();
    tracing::debug!(families = families.len(), errors = errors.len(), "gather complete");
    Gathered { families, errors }
}

/// Validates collected metrics against the registration snapshot and groups
/// them by name.
struct FamilyMerger<'a> {
    descs: &'a HashMap<u64, DescEntry>,
    families: HashMap<String, MetricFamily>,
    seen: HashSet<(String, Vec<LabelPair>)>,
}

impl<'a> FamilyMerger<'a> {
    fn new(descs: &'a HashMap<u64, DescEntry>) -> Self {
        Self {
            descs,
            families: HashMap::new(),
            seen: HashSet::new(),
        }
    }

    fn reject(job: &CollectJob, msg: String) -> TallyError {
        TallyError::CollectionFailed(format!("{}: {msg}", job_label(job)))
    }

    fn push(&mut self, job: &CollectJob, m: CollectedMetric) -> Result<()> {
        let CollectedMetric { desc, record } = m;

        if let Some(cause) = desc.err() {
            return Err(Self::reject(
                job,
                format!("collected metric has invalid descriptor {desc}: {cause}"),
            ));
        }

        if job.checked {
            let declared = self
                .descs
                .get(&desc.id())
                .is_some_and(|e| e.owner == job.key && e.desc.is_consistent_with(&desc));
            if !declared {
                return Err(Self::reject(
                    job,
                    format!("collected metric {desc} was not declared by its collector"),
                ));
            }
        }

        // label shape: every constant label with its value, plus each variable label once
        let label_count = desc.const_labels().len() + desc.variable_labels().len();
        let shape_ok = record.labels.len() == label_count
            && desc
                .const_labels()
                .iter()
                .all(|c| record.labels.iter().any(|lp| lp == c))
            && desc
                .variable_labels()
                .iter()
                .all(|v| record.labels.iter().any(|lp| &lp.name == v));
        if !shape_ok {
            return Err(Self::reject(
                job,
                format!("collected metric labels do not match descriptor {desc}"),
            ));
        }

        let metric_type = record.value.metric_type();
        if let Some(fam) = self.families.get(desc.fq_name()) {
            if fam.metric_type != metric_type {
                return Err(Self::reject(
                    job,
                    format!(
                        "collected metric {} has type {} but family has type {}",
                        desc.fq_name(),
                        metric_type.as_str(),
                        fam.metric_type.as_str()
                    ),
                ));
            }
            if fam.help != desc.help() {
                return Err(Self::reject(
                    job,
                    format!("collected metric {desc} has help inconsistent with its family"),
                ));
            }
        }

        let mut labels = record.labels.clone();
        labels.sort();
        if !self.seen.insert((desc.fq_name().to_string(), labels)) {
            return Err(Self::reject(
                job,
                format!(
                    "collected metric {} was collected before with the same label values",
                    desc.fq_name()
                ),
            ));
        }

        self.families
            .entry(desc.fq_name().to_string())
            .or_insert_with(|| MetricFamily::new(desc.fq_name(), desc.help(), metric_type))
            .metrics
            .push(record);
        Ok(())
    }

    /// Families sorted by name, metrics sorted by label values.
    fn finish(self) -> Vec<MetricFamily> {
        let mut out: Vec<MetricFamily> = self.families.into_values().collect();
        for f in &mut out {
            f.sort_metrics();
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}
