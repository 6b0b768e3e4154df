//! Node tree mappings and traversal.
//!
//! A `NodeTree` is the pair of lookup tables a snapshot carries: parent to
//! ordered children, and child to parent. Child order is execution order.
//! Only non-empty child lists are stored so two trees with the same shape
//! always compare equal.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::SessionError;
use crate::node::{AddAction, NodeId};
use crate::transition::Action;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeTree {
    children: BTreeMap<NodeId, Vec<NodeId>>,
    parents: BTreeMap<NodeId, NodeId>,
}

impl NodeTree {
    /// A tree holding only the root.
    pub fn new() -> Self {
        NodeTree::default()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node == NodeId::ROOT || self.parents.contains_key(&node)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.children.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parents.get(&node).copied()
    }

    pub fn children_map(&self) -> &BTreeMap<NodeId, Vec<NodeId>> {
        &self.children
    }

    pub fn parents_map(&self) -> &BTreeMap<NodeId, NodeId> {
        &self.parents
    }

    /// True if `node` sits somewhere below `ancestor`.
    pub fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// Preorder walk over every node reachable from `root`, `root` first.
    pub fn iter_nodes(&self, root: NodeId) -> Nodes<'_> {
        Nodes {
            tree: self,
            stack: vec![root],
            seen: BTreeSet::new(),
        }
    }

    /// Preorder walk over `(parent, child)` edges below `root`.
    pub fn iter_pairs(&self, root: NodeId) -> Pairs<'_> {
        let stack: Vec<(NodeId, NodeId)> =
            self.children(root).iter().rev().map(|&c| (root, c)).collect();
        Pairs {
            tree: self,
            stack,
            seen: BTreeSet::from([root]),
        }
    }

    /// Unlink `node` from its parent. Its own children stay attached to it.
    pub fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parents.remove(&node) else {
            return;
        };
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|&c| c != node);
            if siblings.is_empty() {
                self.children.remove(&parent);
            }
        }
    }

    /// Link a detached `node` relative to `anchor` using one of the engine's
    /// anchored primitives.
    pub fn attach(&mut self, node: NodeId, anchor: NodeId, action: Action) -> Result<(), SessionError> {
        if !self.contains(anchor) {
            return Err(SessionError::UnknownNode { node: anchor });
        }
        if node == anchor || self.is_descendant(anchor, node) {
            return Err(SessionError::InvalidPlacement {
                node,
                anchor,
                reason: "a node cannot be placed inside itself",
            });
        }
        match action {
            Action::AttachAtHeadOf => self.insert_child(anchor, 0, node),
            Action::AttachBefore | Action::AttachAfter => {
                let parent = self.parent(anchor).ok_or(SessionError::InvalidPlacement {
                    node,
                    anchor,
                    reason: "the root has no siblings",
                })?;
                let index = self
                    .children(parent)
                    .iter()
                    .position(|&c| c == anchor)
                    .ok_or(SessionError::UnknownNode { node: anchor })?;
                let index = if action == Action::AttachAfter { index + 1 } else { index };
                self.insert_child(parent, index, node);
            }
        }
        Ok(())
    }

    /// Move (or insert) `node` relative to `target` with a caller-level add
    /// action. Rejects edits that would break the single rooted tree.
    pub fn place(&mut self, node: NodeId, target: NodeId, add_action: AddAction) -> Result<(), SessionError> {
        if node == NodeId::ROOT {
            return Err(SessionError::InvalidPlacement {
                node,
                anchor: target,
                reason: "the root cannot move",
            });
        }
        if node == target || self.is_descendant(target, node) {
            return Err(SessionError::InvalidPlacement {
                node,
                anchor: target,
                reason: "a node cannot be placed inside itself",
            });
        }
        if !self.contains(target) {
            return Err(SessionError::UnknownNode { node: target });
        }
        if target == NodeId::ROOT && matches!(add_action, AddAction::AddBefore | AddAction::AddAfter) {
            return Err(SessionError::InvalidPlacement {
                node,
                anchor: target,
                reason: "the root has no siblings",
            });
        }
        self.detach(node);
        match add_action {
            AddAction::AddToHead => self.attach(node, target, Action::AttachAtHeadOf),
            AddAction::AddToTail => {
                let index = self.children(target).len();
                self.insert_child(target, index, node);
                Ok(())
            }
            AddAction::AddBefore => self.attach(node, target, Action::AttachBefore),
            AddAction::AddAfter => self.attach(node, target, Action::AttachAfter),
        }
    }

    /// Remove `node` and everything below it. Descendants are not promoted.
    pub fn free(&mut self, node: NodeId) {
        self.detach(node);
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(children) = self.children.remove(&current) {
                for child in children {
                    self.parents.remove(&child);
                    stack.push(child);
                }
            }
        }
    }

    fn insert_child(&mut self, parent: NodeId, index: usize, node: NodeId) {
        let children = self.children.entry(parent).or_default();
        let index = index.min(children.len());
        children.insert(index, node);
        self.parents.insert(node, parent);
    }
}

impl fmt::Display for NodeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (parent, children)) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{parent}: [")?;
            for (j, child) in children.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{child}")?;
            }
            write!(f, "]")?;
        }
        write!(f, "}}")
    }
}

// ── Traversal ───────────────────────────────────────────────

pub struct Nodes<'a> {
    tree: &'a NodeTree,
    stack: Vec<NodeId>,
    seen: BTreeSet<NodeId>,
}

impl Iterator for Nodes<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        while let Some(node) = self.stack.pop() {
            if !self.seen.insert(node) {
                continue;
            }
            self.stack.extend(self.tree.children(node).iter().rev());
            return Some(node);
        }
        None
    }
}

pub struct Pairs<'a> {
    tree: &'a NodeTree,
    stack: Vec<(NodeId, NodeId)>,
    seen: BTreeSet<NodeId>,
}

impl Iterator for Pairs<'_> {
    type Item = (NodeId, NodeId);

    fn next(&mut self) -> Option<(NodeId, NodeId)> {
        while let Some((parent, child)) = self.stack.pop() {
            if !self.seen.insert(child) {
                continue;
            }
            self.stack
                .extend(self.tree.children(child).iter().rev().map(|&c| (child, c)));
            return Some((parent, child));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: u32) -> NodeId {
        NodeId(i)
    }

    /// root -> [1 -> [3, 4], 2]
    fn sample() -> NodeTree {
        let mut tree = NodeTree::new();
        tree.place(n(1), NodeId::ROOT, AddAction::AddToTail).unwrap();
        tree.place(n(2), NodeId::ROOT, AddAction::AddToTail).unwrap();
        tree.place(n(3), n(1), AddAction::AddToHead).unwrap();
        tree.place(n(4), n(3), AddAction::AddAfter).unwrap();
        tree
    }

    #[test]
    fn preorder_nodes() {
        let nodes: Vec<_> = sample().iter_nodes(NodeId::ROOT).collect();
        assert_eq!(nodes, vec![n(0), n(1), n(3), n(4), n(2)]);
    }

    #[test]
    fn preorder_pairs() {
        let pairs: Vec<_> = sample().iter_pairs(NodeId::ROOT).collect();
        assert_eq!(
            pairs,
            vec![(n(0), n(1)), (n(1), n(3)), (n(1), n(4)), (n(0), n(2))]
        );
    }

    #[test]
    fn attach_before_and_after() {
        let mut tree = sample();
        tree.attach(n(5), n(2), Action::AttachBefore).unwrap();
        tree.attach(n(6), n(2), Action::AttachAfter).unwrap();
        assert_eq!(tree.children(NodeId::ROOT), &[n(1), n(5), n(2), n(6)]);
        assert_eq!(tree.parent(n(6)), Some(NodeId::ROOT));
    }

    #[test]
    fn attach_beside_root_is_rejected() {
        let mut tree = NodeTree::new();
        let err = tree.attach(n(1), NodeId::ROOT, Action::AttachAfter).unwrap_err();
        assert!(matches!(err, SessionError::InvalidPlacement { .. }));
    }

    #[test]
    fn attach_to_missing_anchor() {
        let mut tree = NodeTree::new();
        let err = tree.attach(n(1), n(9), Action::AttachAtHeadOf).unwrap_err();
        assert_eq!(err, SessionError::UnknownNode { node: n(9) });
    }

    #[test]
    fn place_into_own_subtree_is_rejected() {
        let mut tree = sample();
        let before = tree.clone();
        let err = tree.place(n(1), n(3), AddAction::AddToHead).unwrap_err();
        assert!(matches!(err, SessionError::InvalidPlacement { .. }));
        assert_eq!(tree, before);
    }

    #[test]
    fn detach_normalizes_empty_lists() {
        let mut tree = NodeTree::new();
        tree.place(n(1), NodeId::ROOT, AddAction::AddToHead).unwrap();
        tree.detach(n(1));
        assert_eq!(tree, NodeTree::new());
    }

    #[test]
    fn free_drops_whole_subtree() {
        let mut tree = sample();
        tree.free(n(1));
        assert_eq!(tree.children(NodeId::ROOT), &[n(2)]);
        assert!(!tree.contains(n(1)));
        assert!(!tree.contains(n(3)));
        assert!(!tree.contains(n(4)));
        assert!(tree.children(n(1)).is_empty());
    }

    #[test]
    fn display_lists_children() {
        assert_eq!(
            sample().to_string(),
            "{node-0: [node-1, node-2], node-1: [node-3, node-4]}"
        );
    }
}
