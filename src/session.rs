//! The session timeline.
//!
//! A `Session` owns every node and buffer handle plus a strictly increasing
//! run of states keyed by offset. The first state sits before time zero and
//! holds the bare root; the second sits at zero. Authoring calls pick an
//! offset, materialize a state there if needed, edit it, and replay the trees
//! of every later state.
//!
//! Every public mutation is all-or-nothing: it runs against a draft and only
//! replaces `self` once it succeeds.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::SessionError;
use crate::node::{
    AddAction, BufferId, BufferSpec, BusGroup, BusId, NodeId, NodeKind, ParamValue, Params, Rate, SynthDef,
};
use crate::offset::Offset;
use crate::state::{State, StateReport};
use crate::transition::{Divergence, Transition, TransitionMap, apply_transitions, rebuild_transitions};
use crate::tree::NodeTree;

#[derive(Debug, Clone)]
pub struct Session {
    nodes: Vec<NodeKind>,
    buffers: Vec<BufferSpec>,
    buses: Vec<BusGroup>,
    input_count: u32,
    output_count: u32,
    states: Vec<State>,
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

impl Session {
    /// A session rendered with no input and two output channels.
    pub fn new() -> Self {
        Session::with_bus_counts(0, 2)
    }

    /// A session whose hardware buses are `output_count` outputs followed by
    /// `input_count` inputs. Private audio buses are numbered after them.
    pub fn with_bus_counts(input_count: u32, output_count: u32) -> Self {
        let baseline = State::baseline();
        let zero = baseline.clone_at(Offset::ZERO);
        Session {
            nodes: vec![NodeKind::Root],
            buffers: Vec::new(),
            buses: Vec::new(),
            input_count,
            output_count,
            states: vec![baseline, zero],
        }
    }

    pub fn input_count(&self) -> u32 {
        self.input_count
    }

    pub fn output_count(&self) -> u32 {
        self.output_count
    }

    /// Bus groups in allocation order.
    pub fn buses(&self) -> &[BusGroup] {
        &self.buses
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    // ── Lookup ──────────────────────────────────────────────

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn offsets(&self) -> Vec<Offset> {
        self.states.iter().map(State::offset).collect()
    }

    pub fn node_kind(&self, node: NodeId) -> Result<&NodeKind, SessionError> {
        self.nodes.get(node.index()).ok_or(SessionError::UnknownNode { node })
    }

    pub fn buffer_spec(&self, buffer: BufferId) -> Result<&BufferSpec, SessionError> {
        self.buffers
            .get(buffer.index())
            .ok_or(SessionError::UnknownBuffer { buffer })
    }

    pub fn bus_group(&self, bus: BusId) -> Result<&BusGroup, SessionError> {
        self.buses.get(bus.index()).ok_or(SessionError::UnknownBus { bus })
    }

    /// The state stored exactly at `offset`, if any.
    pub fn find_state(&self, offset: Offset) -> Option<&State> {
        self.search(offset).ok().map(|i| &self.states[i])
    }

    /// Nearest state strictly before `offset`.
    pub fn nearest_before(&self, offset: Offset) -> Option<&State> {
        let index = match self.search(offset) {
            Ok(i) | Err(i) => i,
        };
        index.checked_sub(1).map(|i| &self.states[i])
    }

    /// Nearest state strictly after `offset`.
    pub fn nearest_after(&self, offset: Offset) -> Option<&State> {
        let index = match self.search(offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        };
        self.states.get(index)
    }

    /// The state at `offset`, cloned from its predecessor if it does not
    /// exist yet.
    pub fn at(&mut self, offset: f64) -> Result<&State, SessionError> {
        let offset = Offset::new(offset)?;
        let index = self.index_at(offset);
        Ok(&self.states[index])
    }

    /// The node tree in effect at `offset`.
    pub fn tree_at(&self, offset: Offset) -> &NodeTree {
        let index = match self.search(offset) {
            Ok(i) => i,
            // The sentinel sorts first, so every offset has a predecessor.
            Err(i) => i.saturating_sub(1),
        };
        self.resolved_tree(index)
    }

    fn search(&self, offset: Offset) -> Result<usize, usize> {
        self.states.binary_search_by(|s| s.offset().cmp(&offset))
    }

    fn index_at(&mut self, offset: Offset) -> usize {
        match self.search(offset) {
            Ok(i) => i,
            Err(i) => {
                let state = self.states[i - 1].clone_at(offset);
                trace!(%offset, "materialized state");
                self.states.insert(i, state);
                i
            }
        }
    }

    /// Tree of the nearest state at or before `index` holding a private copy.
    fn resolved_tree(&self, index: usize) -> &Arc<NodeTree> {
        self.states[..=index]
            .iter()
            .rev()
            .find_map(State::private_tree)
            .unwrap_or_else(|| unreachable!("the baseline state always owns a tree"))
    }

    /// Tree in effect just before the state at `index`.
    fn tree_before(&self, index: usize) -> &Arc<NodeTree> {
        self.resolved_tree(index.saturating_sub(1))
    }

    fn label(&self, node: NodeId) -> String {
        match self.nodes.get(node.index()) {
            Some(NodeKind::Root) => "root".to_string(),
            Some(NodeKind::Group) => format!("group-{}", node.0),
            Some(NodeKind::Synth { .. }) => format!("synth-{}", node.0),
            None => node.to_string(),
        }
    }

    // ── Authoring ───────────────────────────────────────────

    /// Start a group at `offset`, placed relative to `target`.
    pub fn add_group(
        &mut self,
        target: NodeId,
        add_action: AddAction,
        offset: f64,
        duration: Option<f64>,
    ) -> Result<NodeId, SessionError> {
        self.transact(|s| s.start_node(NodeKind::Group, target, add_action, offset, duration))
    }

    /// Start a synth of `definition` at `offset` with parameter overrides.
    pub fn add_synth(
        &mut self,
        definition: SynthDef,
        params: Params,
        target: NodeId,
        add_action: AddAction,
        offset: f64,
        duration: Option<f64>,
    ) -> Result<NodeId, SessionError> {
        self.transact(|s| {
            s.check_params(Some(&definition), &params)?;
            let kind = NodeKind::Synth { definition, params };
            s.start_node(kind, target, add_action, offset, duration)
        })
    }

    /// Move a live node relative to `target` from `offset` on.
    pub fn move_node(
        &mut self,
        node: NodeId,
        target: NodeId,
        add_action: AddAction,
        offset: f64,
    ) -> Result<(), SessionError> {
        self.transact(|s| {
            let offset = Offset::new(offset)?;
            s.node_kind(node)?;
            s.check_target(target, add_action)?;
            let index = s.index_at(offset);
            if !s.resolved_tree(index).contains(node) {
                return Err(SessionError::UnknownNode { node });
            }
            s.edit_tree(index, |tree| tree.place(node, target, add_action))?;
            debug!(%node, %target, ?add_action, %offset, "moved node");
            Ok(())
        })
    }

    /// End a node (and everything still below it) at `offset`.
    pub fn stop_node(&mut self, node: NodeId, offset: f64) -> Result<(), SessionError> {
        self.transact(|s| s.stop_node_at(node, Offset::new(offset)?))
    }

    /// Record parameter changes for a live node at `offset`.
    pub fn set_parameters(&mut self, node: NodeId, params: Params, offset: f64) -> Result<(), SessionError> {
        self.transact(|s| {
            let offset = Offset::new(offset)?;
            let definition = match s.node_kind(node)? {
                NodeKind::Synth { definition, .. } => Some(definition.clone()),
                _ => None,
            };
            s.check_params(definition.as_ref(), &params)?;
            let index = s.index_at(offset);
            if node == NodeId::ROOT || !s.resolved_tree(index).contains(node) {
                return Err(SessionError::UnknownNode { node });
            }
            s.states[index].settings.entry(node).or_default().extend(params);
            Ok(())
        })
    }

    /// Allocate a buffer at `offset`.
    pub fn add_buffer(
        &mut self,
        spec: BufferSpec,
        offset: f64,
        duration: Option<f64>,
    ) -> Result<BufferId, SessionError> {
        self.transact(|s| {
            let offset = Offset::new(offset)?;
            let buffer = BufferId(s.buffers.len() as u32);
            s.buffers.push(spec);
            let index = s.index_at(offset);
            s.desparsify(index);
            s.states[index].start_buffers.insert(buffer);
            if let Some(duration) = duration {
                s.stop_buffer_at(buffer, offset.after(duration)?)?;
            }
            debug!(%buffer, %offset, "added buffer");
            Ok(buffer)
        })
    }

    /// Free a buffer at `offset`.
    pub fn stop_buffer(&mut self, buffer: BufferId, offset: f64) -> Result<(), SessionError> {
        self.transact(|s| s.stop_buffer_at(buffer, Offset::new(offset)?))
    }

    /// Allocate a block of buses for the whole session.
    pub fn add_bus(&mut self, group: BusGroup) -> Result<BusId, SessionError> {
        if group.channel_count == 0 {
            return Err(SessionError::InvalidChannelCount { channel_count: 0 });
        }
        let bus = BusId(self.buses.len() as u32);
        self.buses.push(group);
        debug!(%bus, rate = %group.rate, channels = group.channel_count, "added bus");
        Ok(bus)
    }

    /// Write `values` into a control bus block, starting at its first
    /// channel, at `offset`.
    pub fn set_control_bus(&mut self, bus: BusId, values: Vec<f64>, offset: f64) -> Result<(), SessionError> {
        self.transact(|s| {
            let offset = Offset::new(offset)?;
            let group = *s.bus_group(bus)?;
            if group.rate != Rate::Control {
                return Err(SessionError::BusRate {
                    bus,
                    expected: Rate::Control,
                });
            }
            if values.is_empty() || values.len() > group.channel_count as usize {
                return Err(SessionError::InvalidChannelCount {
                    channel_count: values.len(),
                });
            }
            let index = s.index_at(offset);
            s.states[index].bus_settings.insert(bus, values);
            Ok(())
        })
    }

    /// Transitions that carry the tree at `from` to the tree at `to`. Nodes
    /// stopped anywhere in `(from, to]` are freed along the way.
    pub fn transitions_between(&self, from: Offset, to: Offset) -> Result<TransitionMap, SessionError> {
        if to < from {
            return Err(SessionError::InvalidOffset { offset: to.seconds() });
        }
        let current = self.tree_at(from);
        let target = self.tree_at(to);
        let stop_nodes: BTreeSet<NodeId> = self
            .states
            .iter()
            .filter(|s| s.offset() > from && s.offset() <= to)
            .flat_map(|s| s.stop_nodes.iter().copied())
            .collect();
        rebuild_transitions(NodeId::ROOT, current, target, &stop_nodes)
            .map_err(|d| divergence(from, to, current, target, d))
    }

    // ── Reporting ───────────────────────────────────────────

    /// One report per state, skipping the state before time zero.
    pub fn report(&self) -> Vec<StateReport> {
        (1..self.states.len()).map(|i| self.report_index(i)).collect()
    }

    pub fn state_report(&self, offset: Offset) -> Option<StateReport> {
        self.search(offset).ok().map(|i| self.report_index(i))
    }

    fn report_index(&self, index: usize) -> StateReport {
        self.states[index].report(self.resolved_tree(index), |n| self.label(n))
    }

    // ── Internals ───────────────────────────────────────────

    fn transact<T>(
        &mut self,
        edit: impl FnOnce(&mut Session) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut draft = self.clone();
        let out = edit(&mut draft)?;
        *self = draft;
        Ok(out)
    }

    fn start_node(
        &mut self,
        kind: NodeKind,
        target: NodeId,
        add_action: AddAction,
        offset: f64,
        duration: Option<f64>,
    ) -> Result<NodeId, SessionError> {
        let offset = Offset::new(offset)?;
        self.check_target(target, add_action)?;
        let node = NodeId(self.nodes.len() as u32);
        self.nodes.push(kind);
        let index = self.index_at(offset);
        self.desparsify(index);
        self.states[index].start_nodes.insert(node);
        self.edit_tree(index, |tree| tree.place(node, target, add_action))?;
        if let Some(duration) = duration {
            self.stop_node_at(node, offset.after(duration)?)?;
        }
        debug!(node = %self.label(node), %target, ?add_action, %offset, "started node");
        Ok(node)
    }

    fn stop_node_at(&mut self, node: NodeId, offset: Offset) -> Result<(), SessionError> {
        self.node_kind(node)?;
        if node == NodeId::ROOT {
            return Err(SessionError::InvalidPlacement {
                node,
                anchor: node,
                reason: "the root cannot stop",
            });
        }
        let index = self.index_at(offset);
        if self.states[index].stop_nodes.contains(&node) {
            return Ok(());
        }
        if self.states[index].start_nodes.contains(&node) {
            return Err(SessionError::InvalidOffset { offset: offset.seconds() });
        }
        let tree = Arc::clone(self.resolved_tree(index));
        if !tree.contains(node) {
            return Err(SessionError::UnknownNode { node });
        }
        let doomed: BTreeSet<NodeId> = tree.iter_nodes(node).collect();
        for later in &self.states[index + 1..] {
            let anchored = |t: &&Transition| doomed.contains(&t.anchor) && !doomed.contains(&t.source);
            if let Some(t) = later.transitions.iter().find(anchored) {
                return Err(SessionError::UnknownNode { node: t.anchor });
            }
        }
        for later in &mut self.states[index + 1..] {
            later.stop_nodes.retain(|n| !doomed.contains(n));
            later.settings.retain(|n, _| !doomed.contains(n));
            later.transitions.retain(|t| !doomed.contains(&t.source));
        }
        self.desparsify(index);
        self.states[index].stop_nodes.extend(doomed.iter().copied());
        debug!(node = %self.label(node), %offset, cascaded = doomed.len() - 1, "stopped node");
        self.rechain(index)
    }

    fn stop_buffer_at(&mut self, buffer: BufferId, offset: Offset) -> Result<(), SessionError> {
        self.buffer_spec(buffer)?;
        let start = self
            .states
            .iter()
            .find(|s| s.start_buffers.contains(&buffer))
            .map(State::offset)
            .ok_or(SessionError::UnknownBuffer { buffer })?;
        if offset <= start {
            return Err(SessionError::InvalidOffset { offset: offset.seconds() });
        }
        for state in &mut self.states {
            state.stop_buffers.remove(&buffer);
        }
        let index = self.index_at(offset);
        self.desparsify(index);
        self.states[index].stop_buffers.insert(buffer);
        // Buffers leave the tree alone; states emptied above may drop their copy.
        self.rechain(1)
    }

    fn check_target(&self, target: NodeId, add_action: AddAction) -> Result<(), SessionError> {
        let kind = self.node_kind(target)?;
        let into = matches!(add_action, AddAction::AddToHead | AddAction::AddToTail);
        if into && !kind.is_container() {
            return Err(SessionError::InvalidPlacement {
                node: target,
                anchor: target,
                reason: "synths cannot hold children",
            });
        }
        Ok(())
    }

    /// Handles must exist, and synth controls must be declared by the
    /// definition. Groups pass any name down to their children.
    fn check_params(&self, definition: Option<&SynthDef>, params: &Params) -> Result<(), SessionError> {
        for (name, value) in params {
            match value {
                ParamValue::Number(_) => {}
                ParamValue::Buffer(buffer) => {
                    self.buffer_spec(*buffer)?;
                }
                ParamValue::Bus(bus) => {
                    self.bus_group(*bus)?;
                }
            }
            if let Some(definition) = definition {
                if !definition.declares(name) {
                    return Err(SessionError::UnknownParameter {
                        definition: definition.name.clone(),
                        name: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn desparsify(&mut self, index: usize) {
        if !self.states[index].has_private_tree() {
            let ancestor = Arc::clone(self.tree_before(index));
            self.states[index].desparsify(&ancestor);
        }
    }

    /// Apply `edit` to the tree at `index`, then re-derive that state's
    /// transitions from its predecessor and replay everything after it.
    fn edit_tree(
        &mut self,
        index: usize,
        edit: impl FnOnce(&mut NodeTree) -> Result<(), SessionError>,
    ) -> Result<(), SessionError> {
        self.desparsify(index);
        let previous = Arc::clone(self.tree_before(index));
        let mut desired = NodeTree::clone(self.resolved_tree(index));
        edit(&mut desired)?;
        let state = &self.states[index];
        let transitions = rebuild_transitions(NodeId::ROOT, &previous, &desired, &state.stop_nodes)
            .map_err(|d| {
                let from = self.states[index - 1].offset();
                divergence(from, state.offset(), &previous, &desired, d)
            })?;
        self.states[index].transitions = transitions;
        self.rechain(index)
    }

    /// Recompute the private tree of every state from `from` onward.
    fn rechain(&mut self, from: usize) -> Result<(), SessionError> {
        for index in from.max(1)..self.states.len() {
            if self.states[index].is_sparse() {
                self.states[index].sparsify();
                continue;
            }
            let base = Arc::clone(self.tree_before(index));
            let state = &self.states[index];
            let tree = apply_transitions(&base, &state.transitions, &state.stop_nodes)?;
            trace!(offset = %state.offset(), "replayed state");
            self.states[index].set_tree(Arc::new(tree));
        }
        Ok(())
    }
}

fn divergence(from: Offset, to: Offset, current: &NodeTree, target: &NodeTree, d: Divergence) -> SessionError {
    SessionError::StructuralInconsistency {
        from,
        to,
        rounds: d.rounds,
        current: current.to_string(),
        target: target.to_string(),
    }
}
