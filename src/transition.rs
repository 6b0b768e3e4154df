//! Node transitions and the tree diff.
//!
//! The rendering engine only understands "attach this node relative to an
//! existing anchor". `rebuild_transitions` reduces an arbitrary change between
//! two snapshot trees to an ordered list of such anchored attaches, found one
//! correction at a time until the replayed tree matches the target.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::node::NodeId;
use crate::tree::NodeTree;

/// Round ceiling before a diff is declared divergent. Targets with more
/// nodes than this get one round per node.
pub const MAX_ROUNDS: usize = 100;

/// Anchored attach primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    AttachAtHeadOf,
    AttachBefore,
    AttachAfter,
}

/// Places `source` relative to `anchor`. Removals are never transitions;
/// they live in a snapshot's stop set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub source: NodeId,
    pub anchor: NodeId,
    pub action: Action,
}

impl Transition {
    pub fn new(source: NodeId, anchor: NodeId, action: Action) -> Self {
        Transition { source, anchor, action }
    }

    /// Detach the source and re-link it next to (or under) the anchor.
    pub fn apply_to(&self, tree: &mut NodeTree) -> Result<(), SessionError> {
        if !tree.contains(self.anchor) {
            return Err(SessionError::UnknownNode { node: self.anchor });
        }
        tree.detach(self.source);
        tree.attach(self.source, self.anchor, self.action)
    }
}

// ── Transition Map ──────────────────────────────────────────

/// Transitions keyed by source node, in recording order. Re-recording a
/// source replaces its transition in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionMap {
    entries: Vec<Transition>,
}

impl TransitionMap {
    pub fn new() -> Self {
        TransitionMap::default()
    }

    pub fn insert(&mut self, transition: Transition) {
        match self.entries.iter_mut().find(|t| t.source == transition.source) {
            Some(slot) => *slot = transition,
            None => self.entries.push(transition),
        }
    }

    pub fn get(&self, source: NodeId) -> Option<&Transition> {
        self.entries.iter().find(|t| t.source == source)
    }

    pub fn contains(&self, source: NodeId) -> bool {
        self.get(source).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[Transition] {
        &self.entries
    }

    /// Keep only the transitions `keep` accepts, in their recorded order.
    pub fn retain(&mut self, keep: impl FnMut(&Transition) -> bool) {
        self.entries.retain(keep);
    }
}

impl FromIterator<Transition> for TransitionMap {
    fn from_iter<I: IntoIterator<Item = Transition>>(iter: I) -> Self {
        let mut map = TransitionMap::new();
        for t in iter {
            map.insert(t);
        }
        map
    }
}

// ── Apply ───────────────────────────────────────────────────

/// Replay `transitions` in order on a copy of `base`, then free every node in
/// `stop_nodes` together with whatever is still below it. `base` is untouched.
pub fn apply_transitions(
    base: &NodeTree,
    transitions: &TransitionMap,
    stop_nodes: &BTreeSet<NodeId>,
) -> Result<NodeTree, SessionError> {
    let mut tree = base.clone();
    for transition in transitions.iter() {
        transition.apply_to(&mut tree)?;
    }
    for &node in stop_nodes {
        tree.free(node);
    }
    Ok(tree)
}

// ── Diff ────────────────────────────────────────────────────

/// Why a diff gave up.
#[derive(Debug, Clone, PartialEq)]
pub struct Divergence {
    pub rounds: usize,
}

/// Compute the ordered transitions that turn `current` (after freeing
/// `stop_nodes`) into exactly `target`.
///
/// Every round fixes the first slot, in the target's preorder, that the
/// working tree gets wrong. Fixed slots stay fixed, so each target node is
/// corrected at most once and the rounds never exceed the target's size.
pub fn rebuild_transitions(
    root: NodeId,
    current: &NodeTree,
    target: &NodeTree,
    stop_nodes: &BTreeSet<NodeId>,
) -> Result<TransitionMap, Divergence> {
    let ceiling = MAX_ROUNDS.max(target.parents_map().len());
    let mut transitions = TransitionMap::new();
    let mut working = apply_transitions(current, &transitions, stop_nodes)
        .map_err(|_| Divergence { rounds: 0 })?;
    let mut rounds = 0;
    while working.children_map() != target.children_map() {
        if rounds == ceiling {
            warn!(rounds, "transition diff hit the round ceiling");
            return Err(Divergence { rounds });
        }
        let Some(transition) = find_first_inconsistency(root, &working, target, stop_nodes) else {
            warn!(rounds, "trees differ but no anchored correction exists");
            return Err(Divergence { rounds });
        };
        if transitions.get(transition.source) == Some(&transition) {
            warn!(rounds, ?transition, "correction made no progress");
            return Err(Divergence { rounds });
        }
        debug!(round = rounds, ?transition, "recorded correction");
        transitions.insert(transition);
        rounds += 1;
        working = apply_transitions(current, &transitions, stop_nodes).map_err(|e| {
            warn!(rounds, error = %e, "correction could not be replayed");
            Divergence { rounds }
        })?;
    }
    Ok(transitions)
}

/// Walk `target` in preorder and return the single correction for the first
/// slot the working tree disagrees on.
///
/// Each parent is compared against only those working children that the
/// target also places under it. Nodes bound for another parent are moved
/// when that parent is reached, and stopped nodes are freed after replay.
/// Every parent reached this way already sits where the target wants it, so
/// anchors are never inside the node being placed.
fn find_first_inconsistency(
    root: NodeId,
    working: &NodeTree,
    target: &NodeTree,
    stop_nodes: &BTreeSet<NodeId>,
) -> Option<Transition> {
    for parent in target.iter_nodes(root) {
        let wanted = target.children(parent);
        let current: Vec<NodeId> = working
            .children(parent)
            .iter()
            .copied()
            .filter(|c| !stop_nodes.contains(c) && target.parent(*c) == Some(parent))
            .collect();
        if current.as_slice() == wanted {
            continue;
        }
        for (i, &child) in wanted.iter().enumerate() {
            if current.get(i) == Some(&child) {
                continue;
            }
            // Nodes new to the tree follow their already-matched predecessor;
            // nodes that exist elsewhere go in front of whatever holds their slot.
            let (anchor, action) = if current.is_empty() {
                (parent, Action::AttachAtHeadOf)
            } else if i > 0 && (current.len() <= i || !working.contains(child)) {
                (current[i - 1], Action::AttachAfter)
            } else {
                (current[i], Action::AttachBefore)
            };
            return Some(Transition::new(child, anchor, action));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::AddAction;
    use proptest::prelude::*;

    const R: NodeId = NodeId::ROOT;

    fn n(i: u32) -> NodeId {
        NodeId(i)
    }

    fn flat(children: &[u32]) -> NodeTree {
        let mut tree = NodeTree::new();
        for &c in children {
            tree.place(n(c), R, AddAction::AddToTail).unwrap();
        }
        tree
    }

    fn no_stops() -> BTreeSet<NodeId> {
        BTreeSet::new()
    }

    fn assert_reconstructs(a: &NodeTree, b: &NodeTree, stops: &BTreeSet<NodeId>) -> TransitionMap {
        let transitions = rebuild_transitions(R, a, b, stops).unwrap();
        let replayed = apply_transitions(a, &transitions, stops).unwrap();
        assert_eq!(replayed.children_map(), b.children_map());
        transitions
    }

    #[test]
    fn insert_between_siblings() {
        let a = flat(&[1, 2]);
        let b = flat(&[1, 3, 2]);
        let transitions = assert_reconstructs(&a, &b, &no_stops());
        assert_eq!(
            transitions.as_slice(),
            &[Transition::new(n(3), n(1), Action::AttachAfter)]
        );
    }

    #[test]
    fn removal_is_carried_by_stop_set() {
        let a = flat(&[1, 2]);
        let b = flat(&[1]);
        let stops = BTreeSet::from([n(2)]);
        let transitions = assert_reconstructs(&a, &b, &stops);
        assert!(transitions.is_empty());
    }

    #[test]
    fn identical_trees_need_nothing() {
        let a = flat(&[1, 2, 3]);
        assert!(rebuild_transitions(R, &a, &a, &no_stops()).unwrap().is_empty());
    }

    #[test]
    fn first_child_uses_head_of_parent() {
        let a = NodeTree::new();
        let b = flat(&[7]);
        let transitions = assert_reconstructs(&a, &b, &no_stops());
        assert_eq!(
            transitions.as_slice(),
            &[Transition::new(n(7), R, Action::AttachAtHeadOf)]
        );
    }

    #[test]
    fn append_uses_after_last_sibling() {
        let a = flat(&[1]);
        let b = flat(&[1, 2, 3]);
        let transitions = assert_reconstructs(&a, &b, &no_stops());
        assert_eq!(
            transitions.as_slice(),
            &[
                Transition::new(n(2), n(1), Action::AttachAfter),
                Transition::new(n(3), n(2), Action::AttachAfter),
            ]
        );
    }

    #[test]
    fn reverse_order() {
        let a = flat(&[1, 2, 3, 4]);
        let b = flat(&[4, 3, 2, 1]);
        let transitions = assert_reconstructs(&a, &b, &no_stops());
        assert_eq!(transitions.len(), 3);
        assert_eq!(transitions.as_slice()[0], Transition::new(n(4), n(1), Action::AttachBefore));
    }

    #[test]
    fn move_into_new_group() {
        // root [1, 2] -> root [3 [2], 1]
        let a = flat(&[1, 2]);
        let mut b = flat(&[3, 1]);
        b.place(n(2), n(3), AddAction::AddToHead).unwrap();
        let transitions = assert_reconstructs(&a, &b, &no_stops());
        assert_eq!(
            transitions.as_slice(),
            &[
                Transition::new(n(3), n(1), Action::AttachBefore),
                Transition::new(n(2), n(3), Action::AttachAtHeadOf),
            ]
        );
    }

    #[test]
    fn swap_nesting() {
        // root [1 [2]] -> root [2 [1]]
        let mut a = flat(&[1]);
        a.place(n(2), n(1), AddAction::AddToHead).unwrap();
        let mut b = flat(&[2]);
        b.place(n(1), n(2), AddAction::AddToHead).unwrap();
        assert_reconstructs(&a, &b, &no_stops());
    }

    #[test]
    fn lift_out_of_stopped_group() {
        // root [1 [2, 3]]; 1 stops, 3 survives at the root.
        let mut a = flat(&[1]);
        a.place(n(2), n(1), AddAction::AddToTail).unwrap();
        a.place(n(3), n(1), AddAction::AddToTail).unwrap();
        let b = flat(&[3]);
        let stops = BTreeSet::from([n(1)]);
        let transitions = assert_reconstructs(&a, &b, &stops);
        assert_eq!(
            transitions.as_slice(),
            &[Transition::new(n(3), R, Action::AttachAtHeadOf)]
        );
    }

    #[test]
    fn nested_move_out_of_the_way_first() {
        // root [1 [2 [3]], 4] -> root [1, 4 [3 [2]]]
        let mut a = flat(&[1, 4]);
        a.place(n(2), n(1), AddAction::AddToHead).unwrap();
        a.place(n(3), n(2), AddAction::AddToHead).unwrap();
        let mut b = flat(&[1, 4]);
        b.place(n(3), n(4), AddAction::AddToHead).unwrap();
        b.place(n(2), n(3), AddAction::AddToHead).unwrap();
        let transitions = assert_reconstructs(&a, &b, &no_stops());
        assert_eq!(
            transitions.as_slice(),
            &[
                Transition::new(n(3), n(4), Action::AttachAtHeadOf),
                Transition::new(n(2), n(3), Action::AttachAtHeadOf),
            ]
        );
    }

    #[test]
    fn deep_chain_reversal() {
        // root [1 [2 [3 [4]]]] -> root [4 [3 [2 [1]]]]
        let chain = |order: [u32; 4]| {
            let mut tree = flat(&[order[0]]);
            for w in order.windows(2) {
                tree.place(n(w[1]), n(w[0]), AddAction::AddToHead).unwrap();
            }
            tree
        };
        let a = chain([1, 2, 3, 4]);
        let b = chain([4, 3, 2, 1]);
        let transitions = assert_reconstructs(&a, &b, &no_stops());
        assert_eq!(transitions.len(), 4);
    }

    #[test]
    fn orphaned_child_cannot_converge() {
        // Target drops node 2 without stopping it.
        let a = flat(&[1, 2]);
        let b = flat(&[1]);
        let err = rebuild_transitions(R, &a, &b, &no_stops()).unwrap_err();
        assert_eq!(err.rounds, 0);
    }

    #[test]
    fn rerecording_replaces_in_place() {
        let mut map = TransitionMap::new();
        map.insert(Transition::new(n(1), R, Action::AttachAtHeadOf));
        map.insert(Transition::new(n(2), n(1), Action::AttachAfter));
        map.insert(Transition::new(n(1), n(2), Action::AttachBefore));
        assert_eq!(map.len(), 2);
        assert_eq!(map.as_slice()[0], Transition::new(n(1), n(2), Action::AttachBefore));
    }

    #[test]
    fn apply_leaves_base_untouched() {
        let base = flat(&[1, 2]);
        let transitions: TransitionMap =
            [Transition::new(n(2), n(1), Action::AttachBefore)].into_iter().collect();
        let out = apply_transitions(&base, &transitions, &BTreeSet::from([n(1)])).unwrap();
        assert_eq!(out.children(R), &[n(2)]);
        assert_eq!(base.children(R), &[n(1), n(2)]);
    }

    #[test]
    fn apply_rejects_missing_anchor() {
        let transitions: TransitionMap =
            [Transition::new(n(2), n(9), Action::AttachAfter)].into_iter().collect();
        let err = apply_transitions(&flat(&[1]), &transitions, &no_stops()).unwrap_err();
        assert_eq!(err, SessionError::UnknownNode { node: n(9) });
    }

    /// A permutation of `0..len` plus a stop mask and a count of new nodes.
    fn flat_case() -> impl Strategy<Value = (Vec<u32>, Vec<u32>, Vec<bool>, u32)> {
        (1usize..24).prop_flat_map(|len| {
            let ids: Vec<u32> = (1..=len as u32).collect();
            (
                Just(ids.clone()),
                Just(ids).prop_shuffle(),
                proptest::collection::vec(any::<bool>(), len),
                0u32..6,
            )
        })
    }

    /// Node `order[k]` hangs under the root or an earlier node of `order`.
    fn nested(order: &[u32], picks: &[(usize, bool)]) -> NodeTree {
        let mut tree = NodeTree::new();
        for (k, (&node, &(pick, head))) in order.iter().zip(picks).enumerate() {
            let slot = pick % (k + 1);
            let parent = if slot == 0 { R } else { n(order[slot - 1]) };
            let action = if head { AddAction::AddToHead } else { AddAction::AddToTail };
            tree.place(n(node), parent, action).unwrap();
        }
        tree
    }

    type NestedCase = (Vec<(usize, bool)>, Vec<bool>, Vec<u32>, Vec<(usize, bool)>);

    /// Shape of A, a stop mask over A, and the order and shape of B. B holds
    /// every surviving node of A plus a few new ones.
    fn nested_case() -> impl Strategy<Value = NestedCase> {
        (1usize..16, 0usize..5).prop_flat_map(|(len, fresh)| {
            let nodes: Vec<u32> = (1..=len as u32).chain(100..100 + fresh as u32).collect();
            (
                proptest::collection::vec((0usize..64, any::<bool>()), len),
                proptest::collection::vec(any::<bool>(), len),
                Just(nodes).prop_shuffle(),
                proptest::collection::vec((0usize..64, any::<bool>()), len + fresh),
            )
        })
    }

    proptest! {
        #[test]
        fn nested_diffs_reconstruct((a_picks, stopped, order, b_picks) in nested_case()) {
            let before: Vec<u32> = (1..=a_picks.len() as u32).collect();
            let stops: BTreeSet<NodeId> = before
                .iter()
                .zip(&stopped)
                .filter(|(_, s)| **s)
                .map(|(&id, _)| n(id))
                .collect();
            let after: Vec<u32> = order.into_iter().filter(|id| !stops.contains(&n(*id))).collect();
            let a = nested(&before, &a_picks);
            let b = nested(&after, &b_picks);
            let first = rebuild_transitions(R, &a, &b, &stops).unwrap();
            let replayed = apply_transitions(&a, &first, &stops).unwrap();
            prop_assert_eq!(replayed.children_map(), b.children_map());
            prop_assert!(first.len() <= after.len());
            let second = rebuild_transitions(R, &a, &b, &stops).unwrap();
            prop_assert_eq!(first, second);
            prop_assert!(rebuild_transitions(R, &b, &b, &BTreeSet::new()).unwrap().is_empty());
        }

        #[test]
        fn flat_diffs_reconstruct((before, shuffled, stopped, fresh) in flat_case()) {
            let stops: BTreeSet<NodeId> = before
                .iter()
                .zip(&stopped)
                .filter(|(_, s)| **s)
                .map(|(&id, _)| n(id))
                .collect();
            let mut after: Vec<u32> = shuffled
                .into_iter()
                .filter(|id| !stops.contains(&n(*id)))
                .collect();
            for k in 0..fresh {
                let at = (k as usize * 7) % (after.len() + 1);
                after.insert(at, 100 + k);
            }
            let a = flat(&before);
            let b = flat(&after);
            let first = rebuild_transitions(R, &a, &b, &stops).unwrap();
            let replayed = apply_transitions(&a, &first, &stops).unwrap();
            prop_assert_eq!(replayed.children_map(), b.children_map());
            let second = rebuild_transitions(R, &a, &b, &stops).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn self_diff_is_empty(before in proptest::collection::vec(1u32..50, 0..20)) {
            let mut ids = before;
            ids.sort();
            ids.dedup();
            let a = flat(&ids);
            prop_assert!(rebuild_transitions(R, &a, &a, &BTreeSet::new()).unwrap().is_empty());
        }
    }
}
