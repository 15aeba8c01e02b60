//! Hierarchical change trees and predicate-based pruning.
//!
//! Nodes live in an index-addressed arena, so re-parenting during
//! filtering never touches raw pointers. Filtering takes ownership of the
//! arena and returns the pruned result; unaffected nodes keep their ids.

use serde::{Deserialize, Serialize};

/// How a node differs between the compared source and target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
    Unchanged,
}

/// Arena index of one diff node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

/// One node of a hierarchical change tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDiff {
    /// External identifier of the changed component or grouping.
    pub key: String,
    pub label: String,
    pub change: ChangeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeDiff {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child ids in insertion order; promoted children appear after the
    /// original siblings.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Index-addressed store of diff nodes. Removed nodes leave empty slots so
/// surviving ids stay valid across filtering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffArena {
    nodes: Vec<Option<NodeDiff>>,
}

impl DiffArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parentless node.
    pub fn add_root(
        &mut self,
        key: impl Into<String>,
        label: impl Into<String>,
        change: ChangeKind,
    ) -> NodeId {
        self.push(None, key.into(), label.into(), change)
    }

    /// Add a node below `parent`, appending it to the parent's children.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        key: impl Into<String>,
        label: impl Into<String>,
        change: ChangeKind,
    ) -> NodeId {
        let id = self.push(Some(parent), key.into(), label.into(), change);
        if let Some(Some(parent_node)) = self.nodes.get_mut(parent.0) {
            parent_node.children.push(id);
        }
        id
    }

    fn push(
        &mut self,
        parent: Option<NodeId>,
        key: String,
        label: String,
        change: ChangeKind,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(NodeDiff {
            key,
            label,
            change,
            parent,
            children: Vec::new(),
        }));
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeDiff> {
        self.nodes.get(id.0).and_then(|slot| slot.as_ref())
    }

    /// Ids of all surviving nodes in insertion order.
    pub fn live_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    /// Ids of all surviving root nodes in insertion order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|n| (i, n)))
            .filter(|(_, n)| n.is_root())
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of all leaves reachable from `id`, depth-first.
    pub fn leaf_keys(&self, id: NodeId) -> Vec<String> {
        let mut leaves = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get(current) {
                if node.is_leaf() {
                    leaves.push(node.key.clone());
                } else {
                    for child in node.children().iter().rev() {
                        stack.push(*child);
                    }
                }
            }
        }
        leaves
    }

    fn detach_from_parent(&mut self, parent: NodeId, child: NodeId) {
        if let Some(Some(parent_node)) = self.nodes.get_mut(parent.0) {
            parent_node.children.retain(|c| *c != child);
        }
    }
}

/// Remove every non-root node matching the predicate, re-parenting its
/// children onto its former parent.
///
/// Single pass over the arena in insertion order; promoted children keep
/// their slots and are themselves visited later in the same pass. Root
/// nodes are never removed, even when the predicate matches them. The
/// multiset of leaf records reachable from any surviving ancestor is
/// unchanged: only matching intermediate grouping nodes disappear.
pub fn filter<P>(arena: DiffArena, predicate: P) -> DiffArena
where
    P: Fn(&NodeDiff) -> bool,
{
    filter_with(arena, predicate, |_| {})
}

/// Like [`filter`], with a post-processing hook applied to the surviving
/// arena before it is returned.
pub fn filter_with<P, H>(mut arena: DiffArena, predicate: P, post_process: H) -> DiffArena
where
    P: Fn(&NodeDiff) -> bool,
    H: FnOnce(&mut DiffArena),
{
    for index in 0..arena.nodes.len() {
        let (parent, children) = match &arena.nodes[index] {
            Some(node) if predicate(node) => match node.parent {
                // Roots are immune to filtering.
                None => continue,
                Some(parent) => (parent, node.children.clone()),
            },
            _ => continue,
        };

        let removed = NodeId(index);
        arena.detach_from_parent(parent, removed);
        for child in children {
            if let Some(Some(child_node)) = arena.nodes.get_mut(child.0) {
                child_node.parent = Some(parent);
            }
            if let Some(Some(parent_node)) = arena.nodes.get_mut(parent.0) {
                parent_node.children.push(child);
            }
        }
        arena.nodes[index] = None;
    }

    post_process(&mut arena);
    arena
}

/// A pruned change tree together with the identifiers it was produced
/// from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareResult {
    /// Branch path or version id the comparison reads from.
    pub source: String,
    /// Branch path or version id the comparison reads to.
    pub target: String,
    pub arena: DiffArena,
}

impl CompareResult {
    pub fn new(source: impl Into<String>, target: impl Into<String>, arena: DiffArena) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            arena,
        }
    }

    /// Consume this result and produce a new one with matching nodes
    /// pruned.
    pub fn filtered<P>(self, predicate: P) -> CompareResult
    where
        P: Fn(&NodeDiff) -> bool,
    {
        CompareResult {
            source: self.source,
            target: self.target,
            arena: filter(self.arena, predicate),
        }
    }

    pub fn roots(&self) -> Vec<NodeId> {
        self.arena.roots()
    }
}
