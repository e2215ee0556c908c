// ── Namespace facade ──
//
// Builds the node tree from a source and exposes the protocol-facing
// operations: batched reads and writes, reference browsing, availability
// administration, and control of the polling worker.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::availability::{AvailabilityListener, AvailabilityTracker, ListenerId};
use crate::config::NamespaceConfig;
use crate::error::CoreError;
use crate::model::{AttributeRef, DataValue, Node, NodeId, ObjectName, Reference, StatusCode, Variant};
use crate::source::{AttributeDescriptor, AttributeSource};
use crate::store::NamespaceTree;
use crate::types::{BuildContext, TypeFactoryRegistry};
use crate::worker::{AttributeBinding, CycleReport, PollingWorker};

/// Counters describing a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceStats {
    pub nodes: usize,
    pub variables: usize,
    pub bindings: usize,
    pub unavailable: usize,
    pub cycles: u64,
    pub writes: u64,
    pub write_back_failures: u64,
}

/// A source mirrored as a node tree.
///
/// Cheaply cloneable via `Arc<NamespaceInner>`.
pub struct Namespace<S: AttributeSource> {
    inner: Arc<NamespaceInner<S>>,
}

impl<S: AttributeSource> Clone for Namespace<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct NamespaceInner<S: AttributeSource> {
    config: NamespaceConfig,
    source: Arc<S>,
    registry: Arc<TypeFactoryRegistry>,
    tree: Arc<NamespaceTree>,
    availability: Arc<AvailabilityTracker>,
    worker: PollingWorker<S>,
    unsupported: BTreeSet<String>,
    writes: AtomicU64,
    write_back_failures: AtomicU64,
}

impl<S: AttributeSource> Namespace<S> {
    // ── Construction ─────────────────────────────────────────────────

    /// Enumerate `source` and build the tree. Does NOT start polling --
    /// call [`start`](Self::start) for that.
    ///
    /// Only enumeration failure or an invalid config is fatal. Entities with
    /// malformed names are skipped, attributes of unregistered types are
    /// excluded and summarized once, and per-attribute fetch failures
    /// degrade the affected node.
    pub async fn build(
        config: NamespaceConfig,
        source: Arc<S>,
        registry: Arc<TypeFactoryRegistry>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let descriptors = source.enumerate().await.map_err(CoreError::Enumeration)?;
        debug!(attributes = descriptors.len(), "source enumerated");

        let tree = Arc::new(NamespaceTree::new(
            config.namespace_index,
            &config.root_name,
            Some(config.root_description.clone()),
        ));
        let availability = Arc::new(AvailabilityTracker::new());
        let worker = PollingWorker::new(
            Arc::clone(&source),
            Arc::clone(&tree),
            Arc::clone(&registry),
            Arc::clone(&availability),
            config.refresh_interval,
            config.recovery,
        );

        let mut by_entity: BTreeMap<String, Vec<AttributeDescriptor>> = BTreeMap::new();
        for descriptor in descriptors {
            by_entity
                .entry(descriptor.entity.clone())
                .or_default()
                .push(descriptor);
        }

        let ctx = BuildContext {
            namespace_index: config.namespace_index,
            source: source.as_ref(),
            availability: availability.as_ref(),
        };
        let mut unsupported = BTreeSet::new();

        for (entity, attributes) in by_entity {
            let path = match ObjectName::parse(&entity).and_then(|name| {
                if config.filter.accepts(&name.domain) {
                    name.tree_path().map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(path)) => path,
                Ok(None) => {
                    trace!(entity = %entity, "entity filtered out");
                    continue;
                }
                Err(e) => {
                    warn!(entity = %entity, error = %e, "skipping malformed entity");
                    continue;
                }
            };

            let mut supported = Vec::with_capacity(attributes.len());
            for descriptor in attributes {
                if !descriptor.readable {
                    trace!(entity = %entity, attribute = %descriptor.name, "skipping unreadable attribute");
                } else if registry.is_supported(&descriptor.type_name) {
                    supported.push(descriptor);
                } else {
                    unsupported.insert(descriptor.type_name);
                }
            }
            if supported.is_empty() {
                continue;
            }

            let Some(folder) = tree.ensure_folder_path(&path) else {
                warn!(entity = %entity, path = %path, "folder path collides with a variable, entity skipped");
                continue;
            };
            for descriptor in supported {
                if tree.contains(&folder.child(&descriptor.name)) {
                    warn!(entity = %entity, attribute = %descriptor.name, "node id already in use, attribute skipped");
                    continue;
                }
                let node = match registry.build(&ctx, &path, &descriptor).await {
                    Ok(node) => node,
                    Err(e) => {
                        warn!(entity = %entity, attribute = %descriptor.name, error = %e, "node build failed");
                        continue;
                    }
                };
                let id = node.id.clone();
                if !tree.add_child(&folder, node) {
                    continue;
                }
                worker.add_binding(AttributeBinding {
                    entity: descriptor.entity,
                    attribute: descriptor.name,
                    node: id,
                });
            }
        }

        if !unsupported.is_empty() {
            info!(types = ?unsupported, "attributes of unsupported types were excluded");
        }
        info!(
            nodes = tree.len(),
            bindings = worker.binding_count(),
            unavailable = availability.unavailable_count(),
            "namespace built"
        );

        Ok(Self {
            inner: Arc::new(NamespaceInner {
                config,
                source,
                registry,
                tree,
                availability,
                worker,
                unsupported,
                writes: AtomicU64::new(0),
                write_back_failures: AtomicU64::new(0),
            }),
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &NamespaceConfig {
        &self.inner.config
    }

    pub fn tree(&self) -> &Arc<NamespaceTree> {
        &self.inner.tree
    }

    pub fn registry(&self) -> &Arc<TypeFactoryRegistry> {
        &self.inner.registry
    }

    pub fn worker(&self) -> &PollingWorker<S> {
        &self.inner.worker
    }

    pub fn root_id(&self) -> &NodeId {
        self.inner.tree.root_id()
    }

    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        self.inner.tree.get_node(id)
    }

    /// Source type names that were seen during build but have no factory,
    /// sorted.
    pub fn unsupported_types(&self) -> Vec<String> {
        self.inner.unsupported.iter().cloned().collect()
    }

    pub fn stats(&self) -> NamespaceStats {
        NamespaceStats {
            nodes: self.inner.tree.len(),
            variables: self.inner.tree.variable_count(),
            bindings: self.inner.worker.binding_count(),
            unavailable: self.inner.availability.unavailable_count(),
            cycles: self.inner.worker.cycle_count(),
            writes: self.inner.writes.load(Ordering::Relaxed),
            write_back_failures: self.inner.write_back_failures.load(Ordering::Relaxed),
        }
    }

    // ── Protocol operations ──────────────────────────────────────────

    /// Read each id independently, preserving order.
    pub fn read(&self, ids: &[NodeId]) -> Vec<Result<DataValue, StatusCode>> {
        ids.iter().map(|id| self.inner.tree.read_value(id)).collect()
    }

    /// Write each value independently, preserving order.
    ///
    /// An accepted write is stored, then mirrored to the source before the
    /// next entry is processed. A failed mirror is logged and counted but
    /// neither reverts the stored value nor changes the entry's status.
    pub async fn write(&self, writes: Vec<(NodeId, Variant)>) -> Vec<StatusCode> {
        let mut statuses = Vec::with_capacity(writes.len());
        for (id, value) in writes {
            let json = value.to_json();
            match self.inner.tree.write_variable(&id, value) {
                Ok(target) => {
                    self.inner.writes.fetch_add(1, Ordering::Relaxed);
                    self.write_back(&id, &target, json).await;
                    statuses.push(StatusCode::Good);
                }
                Err(status) => {
                    debug!(node = %id, %status, "write rejected");
                    statuses.push(status);
                }
            }
        }
        statuses
    }

    async fn write_back(&self, id: &NodeId, target: &AttributeRef, value: serde_json::Value) {
        trace!(node = %id, entity = %target.entity, attribute = %target.attribute, "writing back");
        if let Err(e) = self
            .inner
            .source
            .set_value(&target.entity, &target.attribute, value)
            .await
        {
            self.inner.write_back_failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                node = %id,
                entity = %target.entity,
                attribute = %target.attribute,
                error = %e,
                "write-back to source failed"
            );
        }
    }

    /// Outbound references of a node.
    pub fn get_references(&self, id: &NodeId) -> Result<Vec<Reference>, StatusCode> {
        self.inner
            .tree
            .references(id)
            .ok_or(StatusCode::BadNodeIdUnknown)
    }

    /// Depth-first listing of the whole tree.
    pub fn browse(&self) -> Vec<(usize, Node)> {
        self.inner.tree.walk()
    }

    /// Remove a node, everything below it, and the bindings that fed them.
    pub fn remove_node(&self, id: &NodeId) -> Option<Node> {
        let removed = self.inner.tree.remove_node(id)?;
        let unbound = self.inner.worker.remove_bindings_under(id);
        for unavailable in self.inner.availability.unavailable_ids() {
            if !self.inner.tree.contains(&unavailable) {
                self.inner.availability.mark_available(&unavailable);
            }
        }
        debug!(node = %id, unbound, "node removed");
        Some(removed)
    }

    // ── Availability ─────────────────────────────────────────────────

    /// Administrative recovery: restore the node's declared type and access
    /// and make it eligible for polling again. Returns `true` on a
    /// transition.
    pub fn mark_available(&self, id: &NodeId) -> bool {
        if !self.inner.availability.is_unavailable(id) {
            return false;
        }
        self.inner.tree.restore_variable(id, None);
        self.inner.availability.mark_available(id)
    }

    pub fn is_unavailable(&self, id: &NodeId) -> bool {
        self.inner.availability.is_unavailable(id)
    }

    pub fn unavailable_count(&self) -> usize {
        self.inner.availability.unavailable_count()
    }

    pub fn unavailable_ids(&self) -> Vec<NodeId> {
        self.inner.availability.unavailable_ids()
    }

    pub fn add_listener(&self, listener: Arc<dyn AvailabilityListener>) -> ListenerId {
        self.inner.availability.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.availability.remove_listener(id)
    }

    // ── Polling ──────────────────────────────────────────────────────

    pub fn start(&self) {
        self.inner.worker.start();
    }

    pub fn stop(&self) {
        self.inner.worker.stop();
    }

    pub fn set_refresh_interval(&self, interval: Duration) {
        self.inner.worker.set_interval(interval);
    }

    /// Run one refresh cycle on the calling task.
    pub async fn refresh_now(&self) -> Arc<CycleReport> {
        self.inner.worker.run_cycle().await
    }

    pub fn subscribe_cycles(&self) -> watch::Receiver<Option<Arc<CycleReport>>> {
        self.inner.worker.subscribe_cycles()
    }
}
