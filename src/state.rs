//! Timeline snapshots.
//!
//! A `State` records what changes at one offset: nodes and buffers that start
//! or stop, the transitions that place nodes, and parameter settings. Its tree
//! is either a private copy or deferred to the nearest earlier state that has
//! one. Sparse states (no lifecycle changes, no transitions) defer.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::node::{BufferId, BusId, NodeId, Params};
use crate::offset::Offset;
use crate::transition::TransitionMap;
use crate::tree::NodeTree;

/// Whether a state holds its own tree or reads through to an ancestor.
#[derive(Debug, Clone)]
pub enum TreeSlot {
    Private(Arc<NodeTree>),
    Deferred,
}

#[derive(Debug, Clone)]
pub struct State {
    offset: Offset,
    tree: TreeSlot,
    pub(crate) transitions: TransitionMap,
    pub(crate) start_nodes: BTreeSet<NodeId>,
    pub(crate) stop_nodes: BTreeSet<NodeId>,
    pub(crate) start_buffers: BTreeSet<BufferId>,
    pub(crate) stop_buffers: BTreeSet<BufferId>,
    pub(crate) settings: BTreeMap<NodeId, Params>,
    /// Control bus values written at this offset.
    pub(crate) bus_settings: BTreeMap<BusId, Vec<f64>>,
}

impl State {
    /// The state before time zero: a tree holding only the root.
    pub(crate) fn baseline() -> Self {
        State {
            offset: Offset::BEFORE_ZERO,
            tree: TreeSlot::Private(Arc::new(NodeTree::new())),
            transitions: TransitionMap::new(),
            start_nodes: BTreeSet::new(),
            stop_nodes: BTreeSet::new(),
            start_buffers: BTreeSet::new(),
            stop_buffers: BTreeSet::new(),
            settings: BTreeMap::new(),
            bus_settings: BTreeMap::new(),
        }
    }

    /// Copy this state to `offset`. Cloning onto the same offset refines the
    /// instant and keeps every local change; a clone at a new offset starts
    /// empty and reads its tree through to its ancestors.
    pub(crate) fn clone_at(&self, offset: Offset) -> Self {
        if offset == self.offset {
            return self.clone();
        }
        State {
            offset,
            tree: TreeSlot::Deferred,
            transitions: TransitionMap::new(),
            start_nodes: BTreeSet::new(),
            stop_nodes: BTreeSet::new(),
            start_buffers: BTreeSet::new(),
            stop_buffers: BTreeSet::new(),
            settings: BTreeMap::new(),
            bus_settings: BTreeMap::new(),
        }
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    /// No lifecycle changes and no transitions at this offset.
    pub fn is_sparse(&self) -> bool {
        self.transitions.is_empty()
            && self.start_nodes.is_empty()
            && self.stop_nodes.is_empty()
            && self.start_buffers.is_empty()
            && self.stop_buffers.is_empty()
    }

    pub fn has_private_tree(&self) -> bool {
        matches!(self.tree, TreeSlot::Private(_))
    }

    pub(crate) fn private_tree(&self) -> Option<&Arc<NodeTree>> {
        match &self.tree {
            TreeSlot::Private(tree) => Some(tree),
            TreeSlot::Deferred => None,
        }
    }

    pub(crate) fn set_tree(&mut self, tree: Arc<NodeTree>) {
        self.tree = TreeSlot::Private(tree);
    }

    /// Take a private (shared until written) copy of the ancestor's tree.
    pub(crate) fn desparsify(&mut self, ancestor: &Arc<NodeTree>) {
        if let TreeSlot::Deferred = self.tree {
            self.tree = TreeSlot::Private(Arc::clone(ancestor));
        }
    }

    /// Drop the private copy once nothing local remains.
    pub(crate) fn sparsify(&mut self) {
        if self.is_sparse() && !self.offset.is_before_zero() {
            self.tree = TreeSlot::Deferred;
        }
    }

    pub fn transitions(&self) -> &TransitionMap {
        &self.transitions
    }

    pub fn start_nodes(&self) -> &BTreeSet<NodeId> {
        &self.start_nodes
    }

    pub fn stop_nodes(&self) -> &BTreeSet<NodeId> {
        &self.stop_nodes
    }

    pub fn start_buffers(&self) -> &BTreeSet<BufferId> {
        &self.start_buffers
    }

    pub fn stop_buffers(&self) -> &BTreeSet<BufferId> {
        &self.stop_buffers
    }

    pub fn settings(&self) -> &BTreeMap<NodeId, Params> {
        &self.settings
    }

    pub fn bus_settings(&self) -> &BTreeMap<BusId, Vec<f64>> {
        &self.bus_settings
    }
}

// ── Reporting ───────────────────────────────────────────────

/// Debug view of one state: tree shape plus what starts and stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateReport {
    pub offset: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hierarchy: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Lifecycle::is_empty")]
    pub lifecycle: Lifecycle,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub start: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

impl Lifecycle {
    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.stop.is_empty()
    }
}

impl State {
    /// Build a report against the tree this state resolves to, walking it in
    /// preorder from the root. `label` names each node.
    pub fn report(&self, tree: &NodeTree, label: impl Fn(NodeId) -> String) -> StateReport {
        let mut hierarchy: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (parent, child) in tree.iter_pairs(NodeId::ROOT) {
            hierarchy.entry(label(parent)).or_default().push(label(child));
        }
        let mut start: Vec<String> = self.start_nodes.iter().map(|n| label(*n)).collect();
        let mut stop: Vec<String> = self.stop_nodes.iter().map(|n| label(*n)).collect();
        start.sort();
        stop.sort();
        StateReport {
            offset: self.offset.seconds(),
            hierarchy,
            lifecycle: Lifecycle { start, stop },
        }
    }
}
