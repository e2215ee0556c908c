// ── Namespace node tree ──
//
// Concurrent node map plus a distinguished root folder. Every node other
// than the root is reachable from it through `Organizes` references, which
// are added in the same call that inserts the node.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::model::{Node, NodeClass, NodeId, Reference};

/// Strip one leading slash and collapse empty segments.
pub fn normalize_path(path: &str) -> String {
    path.strip_prefix('/')
        .unwrap_or(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// The node map backing a namespace.
///
/// Mutations bump a revision counter observable via
/// [`subscribe_changes`](Self::subscribe_changes). Shard guards are never
/// held across calls into other nodes, so concurrent builders and pollers
/// cannot deadlock on each other.
pub struct NamespaceTree {
    namespace_index: u16,
    root: NodeId,
    pub(super) nodes: DashMap<NodeId, Node>,
    revision: watch::Sender<u64>,
}

impl NamespaceTree {
    /// Create a tree containing only the root folder.
    pub fn new(namespace_index: u16, root_name: &str, root_description: Option<String>) -> Self {
        let root = NodeId::new(namespace_index, root_name);
        let nodes = DashMap::new();
        nodes.insert(
            root.clone(),
            Node::folder(root.clone(), root_name).with_description(root_description),
        );
        let (revision, _) = watch::channel(0u64);
        Self {
            namespace_index,
            root,
            nodes,
            revision,
        }
    }

    pub fn namespace_index(&self) -> u16 {
        self.namespace_index
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    // ── Construction ────────────────────────────────────────────────

    /// Return the folder for `path`, creating each missing ancestor.
    ///
    /// Segment ids are cumulative (`a`, `a/b`, `a/b/c`). Existing folders are
    /// reused, so `a/b/c` followed by `a/b/d` only creates `a/b/d`. An empty
    /// path resolves to the root. Returns `None`, leaving later segments
    /// uncreated, if a segment's id already belongs to a variable.
    pub fn ensure_folder_path(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root.clone();
        let mut cumulative = String::new();

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !cumulative.is_empty() {
                cumulative.push('/');
            }
            cumulative.push_str(segment);
            let id = NodeId::new(self.namespace_index, cumulative.as_str());

            match self.nodes.entry(id.clone()) {
                Entry::Occupied(existing) => {
                    if !existing.get().is_folder() {
                        warn!(node = %id, path, "id already taken by a variable, folder not created");
                        return None;
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(Node::folder(id.clone(), segment));
                    trace!(node = %id, "created folder");
                }
            }

            if id != current {
                self.link(&current, &id, NodeClass::Object);
            }
            current = id;
        }
        Some(current)
    }

    /// Insert `node` and reference it from `parent`. Returns `false`, leaving
    /// the tree untouched, if `parent` does not exist or a node with the same
    /// id is already present.
    pub fn add_child(&self, parent: &NodeId, node: Node) -> bool {
        if !self.nodes.contains_key(parent) {
            debug!(parent = %parent, node = %node.id, "parent missing, node not added");
            return false;
        }
        let id = node.id.clone();
        let class = node.node_class();
        match self.nodes.entry(id.clone()) {
            Entry::Occupied(_) => {
                warn!(parent = %parent, node = %id, "id already in use, node not added");
                return false;
            }
            Entry::Vacant(slot) => {
                slot.insert(node);
            }
        }
        self.link(parent, &id, class);
        true
    }

    /// Insert or replace a node. Returns the previous node with that id.
    ///
    /// References are not touched; the caller is responsible for keeping
    /// the node reachable.
    pub fn add_node(&self, node: Node) -> Option<Node> {
        let previous = self.nodes.insert(node.id.clone(), node);
        self.bump();
        previous
    }

    /// Remove a node and everything below it, plus any references pointing
    /// at it. The root cannot be removed. Returns the removed node.
    pub fn remove_node(&self, id: &NodeId) -> Option<Node> {
        if *id == self.root {
            return None;
        }
        let (_, removed) = self.nodes.remove(id)?;

        let mut pending: Vec<NodeId> = removed.references.iter().map(|r| r.target.clone()).collect();
        while let Some(next) = pending.pop() {
            if let Some((_, child)) = self.nodes.remove(&next) {
                pending.extend(child.references.into_iter().map(|r| r.target));
            }
        }

        for mut entry in self.nodes.iter_mut() {
            entry.references.retain(|r| r.target != *id);
        }
        self.bump();
        Some(removed)
    }

    fn link(&self, parent: &NodeId, child: &NodeId, class: NodeClass) {
        let added = self
            .nodes
            .get_mut(parent)
            .is_some_and(|mut node| node.add_reference(child.clone(), class));
        if added {
            self.bump();
        }
    }

    // ── Lookup ──────────────────────────────────────────────────────

    /// Snapshot of a node.
    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        self.nodes.get(id).map(|n| n.value().clone())
    }

    /// Run `f` against a node without cloning it.
    pub fn with_node<R>(&self, id: &NodeId, f: impl FnOnce(&Node) -> R) -> Option<R> {
        self.nodes.get(id).map(|n| f(n.value()))
    }

    /// Mutate a node in place. Bumps the revision when the node exists.
    pub fn update<R>(&self, id: &NodeId, f: impl FnOnce(&mut Node) -> R) -> Option<R> {
        let result = self.nodes.get_mut(id).map(|mut n| f(n.value_mut()))?;
        self.bump();
        Some(result)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn variable_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_folder()).count()
    }

    pub fn references(&self, id: &NodeId) -> Option<Vec<Reference>> {
        self.with_node(id, |n| n.references.clone())
    }

    /// Depth-first walk from the root, children in reference order.
    /// Yields `(depth, node)` with the root at depth 0.
    pub fn walk(&self) -> Vec<(usize, Node)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(0usize, self.root.clone())];
        while let Some((depth, id)) = stack.pop() {
            let Some(node) = self.get_node(&id) else {
                continue;
            };
            stack.extend(
                node.references
                    .iter()
                    .rev()
                    .map(|r| (depth + 1, r.target.clone())),
            );
            out.push((depth, node));
        }
        out
    }

    // ── Change notification ─────────────────────────────────────────

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub(crate) fn bump(&self) {
        self.revision.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{AccessLevel, AttributeRef, DataType, Variable};
    use pretty_assertions::assert_eq;

    fn tree() -> NamespaceTree {
        NamespaceTree::new(2, "attributes", Some("root".into()))
    }

    fn ids(refs: &[Reference]) -> Vec<&str> {
        refs.iter().map(|r| r.target.identifier.as_str()).collect()
    }

    #[test]
    fn ensure_folder_path_is_idempotent() {
        let tree = tree();
        let first = tree.ensure_folder_path("a/b/c").unwrap();
        let len = tree.len();
        let rev = tree.revision();

        let second = tree.ensure_folder_path("a/b/c").unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.len(), len);
        assert_eq!(tree.revision(), rev);
        assert_eq!(tree.references(&NodeId::new(2, "a/b")).unwrap().len(), 1);
    }

    #[test]
    fn overlapping_prefixes_share_folders() {
        let tree = tree();
        tree.ensure_folder_path("a/b/c").unwrap();
        let before = tree.len();
        let d = tree.ensure_folder_path("/a/b/d").unwrap();

        assert_eq!(d.identifier, "a/b/d");
        assert_eq!(tree.len(), before + 1);
        assert_eq!(ids(&tree.references(&NodeId::new(2, "a/b")).unwrap()), ["a/b/c", "a/b/d"]);
        assert_eq!(ids(&tree.references(tree.root_id()).unwrap()), ["a"]);
    }

    #[test]
    fn empty_segments_are_skipped() {
        let tree = tree();
        let id = tree.ensure_folder_path("//a///b/").unwrap();
        assert_eq!(id.identifier, "a/b");
        assert_eq!(tree.ensure_folder_path("").unwrap(), *tree.root_id());
        assert_eq!(tree.ensure_folder_path("/").unwrap(), *tree.root_id());
        assert_eq!(normalize_path("//a///b/"), "a/b");
    }

    #[test]
    fn add_child_requires_parent() {
        let tree = tree();
        let orphan = Node::folder(NodeId::new(2, "x/y"), "y");
        assert!(!tree.add_child(&NodeId::new(2, "x"), orphan));
        assert!(!tree.contains(&NodeId::new(2, "x/y")));

        let folder = tree.ensure_folder_path("x").unwrap();
        let var = Variable::new(
            AttributeRef {
                entity: "x:type=y".into(),
                attribute: "v".into(),
                source_type: "int".into(),
            },
            DataType::Int32,
            AccessLevel::ReadOnly,
        );
        assert!(tree.add_child(&folder, Node::variable(folder.child("v"), "v", var)));
        let refs = tree.references(&folder).unwrap();
        assert_eq!(refs[0].target_class, NodeClass::Variable);
        assert_eq!(tree.variable_count(), 1);
    }

    fn int_variable(parent: &NodeId, name: &str) -> Node {
        let var = Variable::new(
            AttributeRef {
                entity: "a:type=b".into(),
                attribute: name.into(),
                source_type: "int".into(),
            },
            DataType::Int32,
            AccessLevel::ReadOnly,
        );
        Node::variable(parent.child(name), name, var)
    }

    #[test]
    fn variable_cannot_replace_folder() {
        let tree = tree();
        tree.ensure_folder_path("a/b/c").unwrap();
        let parent = tree.ensure_folder_path("a/b").unwrap();
        let len = tree.len();

        assert!(!tree.add_child(&parent, int_variable(&parent, "c")));
        assert!(tree.get_node(&NodeId::new(2, "a/b/c")).unwrap().is_folder());
        assert_eq!(tree.len(), len);
        assert_eq!(tree.walk().len(), tree.len());
    }

    #[test]
    fn folder_path_refuses_to_pass_through_variable() {
        let tree = tree();
        let parent = tree.ensure_folder_path("a/b").unwrap();
        assert!(tree.add_child(&parent, int_variable(&parent, "c")));

        assert_eq!(tree.ensure_folder_path("a/b/c/d"), None);
        assert!(!tree.contains(&NodeId::new(2, "a/b/c/d")));
        assert!(!tree.get_node(&NodeId::new(2, "a/b/c")).unwrap().is_folder());
        assert_eq!(tree.walk().len(), tree.len());
    }

    #[test]
    fn remove_node_drops_subtree_and_inbound_reference() {
        let tree = tree();
        tree.ensure_folder_path("a/b/c").unwrap();
        tree.ensure_folder_path("a/x").unwrap();

        let removed = tree.remove_node(&NodeId::new(2, "a/b")).unwrap();
        assert_eq!(removed.browse_name, "b");
        assert!(!tree.contains(&NodeId::new(2, "a/b/c")));
        assert_eq!(ids(&tree.references(&NodeId::new(2, "a")).unwrap()), ["a/x"]);
        assert!(tree.remove_node(tree.root_id()).is_none());
    }

    #[test]
    fn walk_is_depth_first_in_reference_order() {
        let tree = tree();
        tree.ensure_folder_path("a/b").unwrap();
        tree.ensure_folder_path("a/c").unwrap();
        tree.ensure_folder_path("d").unwrap();

        let walked: Vec<(usize, String)> = tree
            .walk()
            .into_iter()
            .map(|(depth, n)| (depth, n.id.identifier))
            .collect();
        assert_eq!(
            walked,
            vec![
                (0, "attributes".to_owned()),
                (1, "a".to_owned()),
                (2, "a/b".to_owned()),
                (2, "a/c".to_owned()),
                (1, "d".to_owned()),
            ]
        );
    }

    #[test]
    fn root_named_segment_does_not_self_reference() {
        let tree = tree();
        let id = tree.ensure_folder_path("attributes/x").unwrap();
        assert_eq!(id.identifier, "attributes/x");
        assert!(
            tree.references(tree.root_id())
                .unwrap()
                .iter()
                .all(|r| r.target != *tree.root_id())
        );
    }
}
