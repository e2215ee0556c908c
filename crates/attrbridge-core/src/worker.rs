// ── Polling worker ──
//
// Owns the refresh task that keeps variable values in sync with the source.
// Cycles run on a fixed delay: the next cycle starts one interval after the
// previous one finished. On-demand cycles share a lock with the task, so
// cycles never overlap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::availability::AvailabilityTracker;
use crate::config::RecoveryPolicy;
use crate::model::NodeId;
use crate::source::AttributeSource;
use crate::store::NamespaceTree;
use crate::types::{TypeFactory, TypeFactoryRegistry};

// ── Bindings and reports ────────────────────────────────────────────

/// One poll target: a source attribute and the node mirroring it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AttributeBinding {
    pub entity: String,
    pub attribute: String,
    pub node: NodeId,
}

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// 1-based cycle number since the worker was created.
    pub cycle: u64,
    /// Bindings fetched this cycle.
    pub polled: usize,
    /// Polled bindings whose value changed.
    pub changed: usize,
    /// Bindings skipped because their node is Unavailable.
    pub skipped: usize,
    /// Polled bindings whose fetch or conversion failed.
    pub failed: usize,
    /// Nodes moved to Unavailable this cycle.
    pub newly_unavailable: usize,
    /// Unavailable nodes restored by a recovery probe this cycle.
    pub recovered: usize,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

enum PollOutcome {
    Unchanged,
    Changed,
    Failed,
    BecameUnavailable,
}

// ── PollingWorker ───────────────────────────────────────────────────

/// Periodic, cancelable refresh of all bindings.
///
/// Cheaply cloneable via `Arc<WorkerInner>`. The refresh task holds a clone,
/// so the worker lives until [`stop`](Self::stop) is called.
pub struct PollingWorker<S: AttributeSource> {
    inner: Arc<WorkerInner<S>>,
}

impl<S: AttributeSource> Clone for PollingWorker<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct WorkerInner<S> {
    source: Arc<S>,
    tree: Arc<NamespaceTree>,
    registry: Arc<TypeFactoryRegistry>,
    availability: Arc<AvailabilityTracker>,
    bindings: DashSet<AttributeBinding>,
    interval_ms: AtomicU64,
    recovery: RecoveryPolicy,
    cycles: AtomicU64,
    cycle_lock: tokio::sync::Mutex<()>,
    reports: watch::Sender<Option<Arc<CycleReport>>>,
    run: Mutex<Option<RunHandle>>,
}

struct RunHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl<S: AttributeSource> PollingWorker<S> {
    pub fn new(
        source: Arc<S>,
        tree: Arc<NamespaceTree>,
        registry: Arc<TypeFactoryRegistry>,
        availability: Arc<AvailabilityTracker>,
        interval: Duration,
        recovery: RecoveryPolicy,
    ) -> Self {
        let (reports, _) = watch::channel(None);
        Self {
            inner: Arc::new(WorkerInner {
                source,
                tree,
                registry,
                availability,
                bindings: DashSet::new(),
                interval_ms: AtomicU64::new(to_millis(interval)),
                recovery,
                cycles: AtomicU64::new(0),
                cycle_lock: tokio::sync::Mutex::new(()),
                reports,
                run: Mutex::new(None),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start the refresh task. The first cycle runs immediately. No-op if
    /// already running. Must be called within a Tokio runtime.
    pub fn start(&self) {
        let mut run = self.inner.run.lock().unwrap_or_else(PoisonError::into_inner);
        if run.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(refresh_task(self.clone(), cancel.clone()));
        *run = Some(RunHandle { cancel, handle });
        info!(
            interval_ms = self.inner.interval_ms.load(Ordering::Relaxed),
            bindings = self.inner.bindings.len(),
            "polling worker started"
        );
    }

    /// Stop the refresh task, interrupting an in-flight cycle. Idempotent.
    pub fn stop(&self) {
        let taken = self
            .inner
            .run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(run) = taken {
            run.cancel.cancel();
            run.handle.abort();
            info!("polling worker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Change the delay between cycles. A running worker is restarted so the
    /// new interval applies immediately.
    pub fn set_interval(&self, interval: Duration) {
        let was_running = self.is_running();
        self.stop();
        self.inner
            .interval_ms
            .store(to_millis(interval), Ordering::Relaxed);
        debug!(interval_ms = to_millis(interval), "refresh interval changed");
        if was_running {
            self.start();
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.inner.interval_ms.load(Ordering::Relaxed))
    }

    pub fn recovery(&self) -> RecoveryPolicy {
        self.inner.recovery
    }

    // ── Bindings ─────────────────────────────────────────────────────

    /// Returns `false` if the binding was already present.
    pub fn add_binding(&self, binding: AttributeBinding) -> bool {
        self.inner.bindings.insert(binding)
    }

    pub fn remove_binding(&self, binding: &AttributeBinding) -> bool {
        self.inner.bindings.remove(binding).is_some()
    }

    /// Drop every binding whose node is `node` or lies beneath it.
    pub fn remove_bindings_under(&self, node: &NodeId) -> usize {
        let prefix = format!("{}/", node.identifier);
        let before = self.inner.bindings.len();
        self.inner.bindings.retain(|b| {
            !(b.node.namespace_index == node.namespace_index
                && (b.node.identifier == node.identifier
                    || b.node.identifier.starts_with(&prefix)))
        });
        before - self.inner.bindings.len()
    }

    pub fn binding_count(&self) -> usize {
        self.inner.bindings.len()
    }

    /// Bindings sorted by node id.
    pub fn bindings(&self) -> Vec<AttributeBinding> {
        let mut out: Vec<AttributeBinding> =
            self.inner.bindings.iter().map(|b| b.clone()).collect();
        out.sort_by(|a, b| a.node.cmp(&b.node));
        out
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn unavailable_count(&self) -> usize {
        self.inner.availability.unavailable_count()
    }

    /// Unavailable node ids, sorted.
    pub fn unavailable_node_ids(&self) -> Vec<NodeId> {
        self.inner.availability.unavailable_ids()
    }

    pub fn cycle_count(&self) -> u64 {
        self.inner.cycles.load(Ordering::Relaxed)
    }

    pub fn last_cycle(&self) -> Option<Arc<CycleReport>> {
        self.inner.reports.borrow().clone()
    }

    /// Subscribe to cycle reports. The receiver sees `None` until the first
    /// cycle completes.
    pub fn subscribe_cycles(&self) -> watch::Receiver<Option<Arc<CycleReport>>> {
        self.inner.reports.subscribe()
    }

    // ── Refresh cycle ────────────────────────────────────────────────

    /// Run one refresh cycle now.
    ///
    /// Bindings whose node is Unavailable are skipped, unless this cycle is a
    /// recovery probe. A failure on one binding never ends the cycle early.
    /// At most one cycle runs at a time; a call made while the refresh task
    /// is mid-cycle waits for that cycle to finish before starting its own.
    pub async fn run_cycle(&self) -> Arc<CycleReport> {
        let _running = self.inner.cycle_lock.lock().await;
        let cycle = self.inner.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let started_at = Utc::now();
        let clock = Instant::now();
        let probe = match self.inner.recovery {
            RecoveryPolicy::Probe { every_cycles } if every_cycles > 0 => {
                cycle % u64::from(every_cycles) == 0
            }
            _ => false,
        };

        let mut report = CycleReport {
            cycle,
            polled: 0,
            changed: 0,
            skipped: 0,
            failed: 0,
            newly_unavailable: 0,
            recovered: 0,
            started_at,
            elapsed: Duration::ZERO,
        };

        for binding in self.bindings() {
            if self.inner.availability.is_unavailable(&binding.node) {
                if probe && self.probe(&binding).await {
                    report.recovered += 1;
                } else {
                    report.skipped += 1;
                }
                continue;
            }

            report.polled += 1;
            match self.poll(&binding).await {
                PollOutcome::Unchanged => {}
                PollOutcome::Changed => report.changed += 1,
                PollOutcome::Failed => report.failed += 1,
                PollOutcome::BecameUnavailable => {
                    report.failed += 1;
                    report.newly_unavailable += 1;
                }
            }
        }

        report.elapsed = clock.elapsed();
        debug!(
            cycle,
            polled = report.polled,
            changed = report.changed,
            skipped = report.skipped,
            failed = report.failed,
            recovered = report.recovered,
            elapsed_ms = to_millis(report.elapsed),
            "refresh cycle complete"
        );

        let report = Arc::new(report);
        self.inner.reports.send_replace(Some(Arc::clone(&report)));
        report
    }

    fn factory_for(&self, node: &NodeId) -> Option<Arc<dyn TypeFactory>> {
        let source_type = self
            .inner
            .tree
            .with_node(node, |n| n.as_variable().map(|v| v.attribute.source_type.clone()))
            .flatten()?;
        self.inner.registry.get(&source_type).cloned()
    }

    async fn poll(&self, binding: &AttributeBinding) -> PollOutcome {
        let Some(factory) = self.factory_for(&binding.node) else {
            warn!(node = %binding.node, "bound node missing or has no factory");
            return PollOutcome::Failed;
        };

        let raw = match self
            .inner
            .source
            .get_value(&binding.entity, &binding.attribute)
            .await
        {
            Ok(raw) => raw,
            Err(e) if e.is_permanent() => {
                warn!(
                    node = %binding.node,
                    entity = %binding.entity,
                    attribute = %binding.attribute,
                    error = %e,
                    "attribute gone, marking node unavailable"
                );
                self.inner.tree.degrade_variable(&binding.node);
                self.inner.availability.mark_unavailable(&binding.node);
                return PollOutcome::BecameUnavailable;
            }
            Err(e) => {
                warn!(
                    node = %binding.node,
                    entity = %binding.entity,
                    attribute = %binding.attribute,
                    error = %e,
                    "attribute fetch failed"
                );
                return PollOutcome::Failed;
            }
        };

        let value = match factory.coerce(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    node = %binding.node,
                    entity = %binding.entity,
                    attribute = %binding.attribute,
                    error = %e,
                    "polled value has wrong type"
                );
                return PollOutcome::Failed;
            }
        };

        match self
            .inner
            .tree
            .apply_polled_value(&binding.node, value, factory.as_ref())
        {
            Some(true) => {
                trace!(node = %binding.node, "value changed");
                PollOutcome::Changed
            }
            Some(false) => PollOutcome::Unchanged,
            None => PollOutcome::Failed,
        }
    }

    /// Fetch an Unavailable node once; restore it if the source answers with
    /// a value of the declared type.
    async fn probe(&self, binding: &AttributeBinding) -> bool {
        let Some(factory) = self.factory_for(&binding.node) else {
            return false;
        };
        let Ok(raw) = self
            .inner
            .source
            .get_value(&binding.entity, &binding.attribute)
            .await
        else {
            trace!(node = %binding.node, "probe failed, node stays unavailable");
            return false;
        };
        let Ok(value) = factory.coerce(&raw) else {
            return false;
        };

        self.inner.tree.restore_variable(&binding.node, value);
        self.inner.availability.mark_available(&binding.node);
        info!(node = %binding.node, "node recovered");
        true
    }
}

fn to_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1)
}

// ── Background task ─────────────────────────────────────────────────

async fn refresh_task<S: AttributeSource>(worker: PollingWorker<S>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = worker.run_cycle() => {}
        }

        let delay = worker.interval();
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }
    debug!("refresh task exited");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{AccessLevel, AttributeRef, DataType, Node, Variable, Variant};
    use crate::source::{MemorySource, SourceError};
    use serde_json::json;

    const CACHE: &str = "app:type=Cache,name=main";

    struct Fixture {
        source: Arc<MemorySource>,
        tree: Arc<NamespaceTree>,
        availability: Arc<AvailabilityTracker>,
        worker: PollingWorker<MemorySource>,
    }

    fn fixture(recovery: RecoveryPolicy) -> Fixture {
        let source = Arc::new(MemorySource::new());
        let tree = Arc::new(NamespaceTree::new(2, "attributes", None));
        let availability = Arc::new(AvailabilityTracker::new());
        let worker = PollingWorker::new(
            Arc::clone(&source),
            Arc::clone(&tree),
            Arc::new(TypeFactoryRegistry::with_defaults()),
            Arc::clone(&availability),
            Duration::from_millis(50),
            recovery,
        );
        Fixture {
            source,
            tree,
            availability,
            worker,
        }
    }

    impl Fixture {
        fn bind(&self, attribute: &str, value: serde_json::Value) -> NodeId {
            self.source.define_writable(CACHE, attribute, "int", value);
            let folder = self.tree.ensure_folder_path("app/Cache/main").unwrap();
            let id = folder.child(attribute);
            let var = Variable::new(
                AttributeRef {
                    entity: CACHE.into(),
                    attribute: attribute.into(),
                    source_type: "int".into(),
                },
                DataType::Int32,
                AccessLevel::ReadWrite,
            );
            self.tree
                .add_child(&folder, Node::variable(id.clone(), attribute, var));
            self.worker.add_binding(AttributeBinding {
                entity: CACHE.into(),
                attribute: attribute.into(),
                node: id.clone(),
            });
            id
        }

        fn value(&self, id: &NodeId) -> Option<Variant> {
            self.tree.read_value(id).unwrap().value
        }
    }

    #[tokio::test]
    async fn cycle_applies_changes_only() {
        let fx = fixture(RecoveryPolicy::Manual);
        let id = fx.bind("size", json!(10));

        let first = fx.worker.run_cycle().await;
        assert_eq!((first.polled, first.changed), (1, 1));
        assert_eq!(fx.value(&id), Some(Variant::Int32(10)));

        let second = fx.worker.run_cycle().await;
        assert_eq!((second.polled, second.changed), (1, 0));

        fx.source.set(CACHE, "size", json!(12));
        let third = fx.worker.run_cycle().await;
        assert_eq!(third.changed, 1);
        assert_eq!(third.cycle, 3);
        assert_eq!(fx.value(&id), Some(Variant::Int32(12)));
        assert_eq!(fx.worker.last_cycle().unwrap().cycle, 3);
    }

    #[tokio::test]
    async fn transient_failure_is_skipped_and_retried() {
        let fx = fixture(RecoveryPolicy::Manual);
        let bad = fx.bind("bad", json!(1));
        let good = fx.bind("good", json!(2));
        fx.source
            .fail_reads(CACHE, "bad", SourceError::transient("timeout"));

        let report = fx.worker.run_cycle().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.changed, 1);
        assert_eq!(fx.value(&good), Some(Variant::Int32(2)));
        assert!(!fx.availability.is_unavailable(&bad));

        fx.worker.run_cycle().await;
        assert_eq!(fx.source.read_count(CACHE, "bad"), 2);
    }

    #[tokio::test]
    async fn permanent_failure_is_sticky_under_manual_recovery() {
        let fx = fixture(RecoveryPolicy::Manual);
        let id = fx.bind("size", json!(10));
        fx.source
            .fail_reads(CACHE, "size", SourceError::permanent("removed"));

        let report = fx.worker.run_cycle().await;
        assert_eq!(report.newly_unavailable, 1);
        assert_eq!(fx.worker.unavailable_node_ids(), vec![id.clone()]);

        fx.source.clear_failures(CACHE, "size");
        for _ in 0..3 {
            let report = fx.worker.run_cycle().await;
            assert_eq!(report.skipped, 1);
        }
        assert_eq!(fx.source.read_count(CACHE, "size"), 1);
        assert_eq!(fx.worker.unavailable_count(), 1);
    }

    #[tokio::test]
    async fn probe_recovery_restores_node() {
        let fx = fixture(RecoveryPolicy::Probe { every_cycles: 2 });
        let id = fx.bind("size", json!(10));
        fx.source
            .fail_reads(CACHE, "size", SourceError::permanent("removed"));
        fx.worker.run_cycle().await;
        assert!(fx.availability.is_unavailable(&id));

        fx.source.clear_failures(CACHE, "size");
        fx.source.set(CACHE, "size", json!(33));
        let report = fx.worker.run_cycle().await;
        assert_eq!(report.recovered, 1);
        assert!(!fx.availability.is_unavailable(&id));
        assert_eq!(fx.value(&id), Some(Variant::Int32(33)));

        let node = fx.tree.get_node(&id).unwrap();
        assert_eq!(node.as_variable().unwrap().data_type, DataType::Int32);
    }

    #[tokio::test]
    async fn bindings_are_a_set() {
        let fx = fixture(RecoveryPolicy::Manual);
        let id = fx.bind("size", json!(10));
        let binding = AttributeBinding {
            entity: CACHE.into(),
            attribute: "size".into(),
            node: id.clone(),
        };
        assert!(!fx.worker.add_binding(binding.clone()));
        assert_eq!(fx.worker.binding_count(), 1);
        assert_eq!(fx.worker.remove_bindings_under(&NodeId::new(2, "app/Cache")), 1);
        assert!(!fx.worker.remove_binding(&binding));
    }

    #[tokio::test(start_paused = true)]
    async fn started_worker_polls_until_stopped() {
        let fx = fixture(RecoveryPolicy::Manual);
        let id = fx.bind("size", json!(10));
        let mut cycles = fx.worker.subscribe_cycles();

        fx.worker.start();
        fx.worker.start();
        assert!(fx.worker.is_running());

        cycles.changed().await.unwrap();
        assert_eq!(fx.value(&id), Some(Variant::Int32(10)));

        fx.source.set(CACHE, "size", json!(11));
        cycles.changed().await.unwrap();
        assert_eq!(fx.value(&id), Some(Variant::Int32(11)));

        fx.worker.stop();
        fx.worker.stop();
        assert!(!fx.worker.is_running());

        let seen = fx.worker.cycle_count();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fx.worker.cycle_count(), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn set_interval_restarts_running_worker() {
        let fx = fixture(RecoveryPolicy::Manual);
        fx.bind("size", json!(10));

        fx.worker.set_interval(Duration::from_secs(5));
        assert!(!fx.worker.is_running());
        assert_eq!(fx.worker.interval(), Duration::from_secs(5));

        fx.worker.start();
        fx.worker.set_interval(Duration::from_millis(20));
        assert!(fx.worker.is_running());
        assert_eq!(fx.worker.interval(), Duration::from_millis(20));
        fx.worker.stop();
    }
}
