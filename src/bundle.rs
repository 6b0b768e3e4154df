//! Command bundle assembly.
//!
//! Walks a session's states in offset order and turns each one into a
//! time-stamped bundle of abstract engine commands. Within a bundle the
//! order is fixed: buffer and bus setup, structural commands from the
//! state's transitions, bus mappings and parameter sets, then frees. Wire encoding belongs to the
//! command encoder; here bundles are framed as length-prefixed JSON so the
//! byte stream (and its digest) is stable for an unchanged session.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::SessionError;
use crate::node::{BufferId, BufferSpec, BusId, NodeId, NodeKind, ParamValue, Params, Rate};
use crate::offset::Offset;
use crate::session::Session;
use crate::state::State;
use crate::transition::{Action, TransitionMap, apply_transitions};
use crate::tree::NodeTree;

/// First id handed to session nodes. Lower ids are left to the engine.
pub const FIRST_NODE_ID: i32 = 1000;

// ── Commands ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    BufferAllocate {
        buffer_id: i32,
        frame_count: u32,
        channel_count: u32,
    },
    BufferAllocateRead {
        buffer_id: i32,
        path: String,
        starting_frame: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_count: Option<u32>,
    },
    GroupNew {
        node_id: i32,
        add_action: Action,
        target_node_id: i32,
    },
    SynthNew {
        node_id: i32,
        synthdef: String,
        add_action: Action,
        target_node_id: i32,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        controls: BTreeMap<String, f64>,
    },
    /// Re-anchor an existing node.
    NodeOrder {
        add_action: Action,
        target_node_id: i32,
        node_ids: Vec<i32>,
    },
    /// Write consecutive control bus values starting at `bus_id`.
    ControlBusSet { bus_id: i32, values: Vec<f64> },
    /// Read the named controls from audio buses.
    NodeMapToAudioBus {
        node_id: i32,
        controls: BTreeMap<String, i32>,
    },
    /// Read the named controls from control buses.
    NodeMapToControlBus {
        node_id: i32,
        controls: BTreeMap<String, i32>,
    },
    NodeSet {
        node_id: i32,
        controls: BTreeMap<String, f64>,
    },
    NodeFree { node_ids: Vec<i32> },
    BufferFree { buffer_id: i32 },
    /// Terminal marker that only pads the render out to its end time.
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub timestamp: f64,
    pub commands: Vec<Command>,
}

// ── Id Mapping ──────────────────────────────────────────────

/// Engine-level integer ids for every node, buffer and bus in a session.
///
/// The root group is 0. Nodes count up from `FIRST_NODE_ID` and buffers from
/// 0, both in order of first start (offset order, then handle order). Bus
/// blocks are handed out in allocation order: control buses from 0, audio
/// buses after the session's output and input channels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdMapping {
    nodes: BTreeMap<NodeId, i32>,
    buffers: BTreeMap<BufferId, i32>,
    buses: BTreeMap<BusId, (i32, Rate)>,
}

/// A parameter set split by how the engine receives it.
#[derive(Debug, Default)]
struct Controls {
    values: BTreeMap<String, f64>,
    audio: BTreeMap<String, i32>,
    control: BTreeMap<String, i32>,
}

impl IdMapping {
    pub fn build(session: &Session) -> Self {
        let mut mapping = IdMapping::default();
        mapping.nodes.insert(NodeId::ROOT, 0);
        let mut next_audio = (session.input_count() + session.output_count()) as i32;
        let mut next_control = 0;
        for (index, group) in session.buses().iter().enumerate() {
            let next = match group.rate {
                Rate::Audio => &mut next_audio,
                Rate::Control => &mut next_control,
            };
            mapping.buses.insert(BusId(index as u32), (*next, group.rate));
            *next += group.channel_count as i32;
        }
        let mut next_node = FIRST_NODE_ID;
        let mut next_buffer = 0;
        for state in session.states() {
            for &node in state.start_nodes() {
                mapping.nodes.entry(node).or_insert_with(|| {
                    next_node += 1;
                    next_node - 1
                });
            }
            for &buffer in state.start_buffers() {
                mapping.buffers.entry(buffer).or_insert_with(|| {
                    next_buffer += 1;
                    next_buffer - 1
                });
            }
        }
        mapping
    }

    pub fn node(&self, node: NodeId) -> Result<i32, SessionError> {
        self.nodes.get(&node).copied().ok_or(SessionError::UnknownNode { node })
    }

    pub fn buffer(&self, buffer: BufferId) -> Result<i32, SessionError> {
        self.buffers
            .get(&buffer)
            .copied()
            .ok_or(SessionError::UnknownBuffer { buffer })
    }

    /// First bus id of a block.
    pub fn bus(&self, bus: BusId) -> Result<i32, SessionError> {
        self.buses
            .get(&bus)
            .map(|&(id, _)| id)
            .ok_or(SessionError::UnknownBus { bus })
    }

    fn controls(&self, params: &Params) -> Result<Controls, SessionError> {
        let mut controls = Controls::default();
        for (name, value) in params {
            let name = name.clone();
            match *value {
                ParamValue::Number(v) => {
                    controls.values.insert(name, v);
                }
                ParamValue::Buffer(b) => {
                    controls.values.insert(name, f64::from(self.buffer(b)?));
                }
                ParamValue::Bus(bus) => {
                    let &(id, rate) = self.buses.get(&bus).ok_or(SessionError::UnknownBus { bus })?;
                    match rate {
                        Rate::Audio => controls.audio.insert(name, id),
                        Rate::Control => controls.control.insert(name, id),
                    };
                }
            }
        }
        Ok(controls)
    }
}

// ── Assembly ────────────────────────────────────────────────

/// Every non-empty bundle of the session, no terminal marker.
pub fn assemble(session: &Session) -> Result<Vec<Bundle>, SessionError> {
    assemble_range(session, Offset::ZERO, None)
}

/// Bundles for states with `start <= offset <= stop`. When `stop` lies past
/// the last state a terminal bundle is appended at `stop`. A `stop` before
/// `start` is `InvalidOffset`.
pub fn assemble_range(
    session: &Session,
    start: Offset,
    stop: Option<Offset>,
) -> Result<Vec<Bundle>, SessionError> {
    if let Some(stop) = stop.filter(|&stop| stop < start) {
        return Err(SessionError::InvalidOffset {
            offset: stop.seconds(),
        });
    }
    let ids = IdMapping::build(session);
    let mut bundles = Vec::new();
    let mut previous: &NodeTree = session.tree_at(Offset::BEFORE_ZERO);
    for state in session.states().iter().skip(1) {
        let offset = state.offset();
        let before = previous;
        previous = session.tree_at(offset);
        if offset < start || stop.is_some_and(|stop| offset > stop) {
            continue;
        }
        let commands = state_commands(session, &ids, state, before)?;
        if commands.is_empty() {
            continue;
        }
        debug!(%offset, commands = commands.len(), "assembled bundle");
        bundles.push(Bundle {
            timestamp: offset.seconds(),
            commands,
        });
    }
    if let (Some(stop), Some(last)) = (stop, session.states().last()) {
        if stop > last.offset() {
            bundles.push(Bundle {
                timestamp: stop.seconds(),
                commands: vec![Command::Nothing],
            });
        }
    }
    Ok(bundles)
}

fn state_commands(
    session: &Session,
    ids: &IdMapping,
    state: &State,
    before: &NodeTree,
) -> Result<Vec<Command>, SessionError> {
    let mut commands = Vec::new();

    for &buffer in state.start_buffers() {
        let buffer_id = ids.buffer(buffer)?;
        commands.push(match session.buffer_spec(buffer)? {
            BufferSpec::Alloc {
                frame_count,
                channel_count,
            } => Command::BufferAllocate {
                buffer_id,
                frame_count: *frame_count,
                channel_count: *channel_count,
            },
            BufferSpec::Read {
                path,
                starting_frame,
                frame_count,
            } => Command::BufferAllocateRead {
                buffer_id,
                path: path.clone(),
                starting_frame: *starting_frame,
                frame_count: *frame_count,
            },
        });
    }
    for (&bus, values) in state.bus_settings() {
        commands.push(Command::ControlBusSet {
            bus_id: ids.bus(bus)?,
            values: values.clone(),
        });
    }

    let mut mapped = Vec::new();
    for transition in state.transitions().iter() {
        let node_id = ids.node(transition.source)?;
        let target_node_id = ids.node(transition.anchor)?;
        let add_action = transition.action;
        if !state.start_nodes().contains(&transition.source) {
            commands.push(Command::NodeOrder {
                add_action,
                target_node_id,
                node_ids: vec![node_id],
            });
            continue;
        }
        commands.push(match session.node_kind(transition.source)? {
            NodeKind::Synth { definition, params } => {
                let controls = ids.controls(params)?;
                let command = Command::SynthNew {
                    node_id,
                    synthdef: definition.name.clone(),
                    add_action,
                    target_node_id,
                    controls: controls.values,
                };
                mapped.push((node_id, controls.audio, controls.control));
                command
            }
            _ => Command::GroupNew {
                node_id,
                add_action,
                target_node_id,
            },
        });
    }

    for (node_id, audio, control) in mapped {
        push_mappings(&mut commands, node_id, audio, control);
    }
    for (&node, params) in state.settings() {
        let node_id = ids.node(node)?;
        let controls = ids.controls(params)?;
        push_mappings(&mut commands, node_id, controls.audio, controls.control);
        if !controls.values.is_empty() {
            commands.push(Command::NodeSet {
                node_id,
                controls: controls.values,
            });
        }
    }

    let freed = topmost_stops(before, state.transitions(), state.stop_nodes())?;
    if !freed.is_empty() {
        let node_ids = freed
            .into_iter()
            .map(|n| ids.node(n))
            .collect::<Result<Vec<_>, _>>()?;
        commands.push(Command::NodeFree { node_ids });
    }
    for &buffer in state.stop_buffers() {
        commands.push(Command::BufferFree {
            buffer_id: ids.buffer(buffer)?,
        });
    }

    Ok(commands)
}

fn push_mappings(
    commands: &mut Vec<Command>,
    node_id: i32,
    audio: BTreeMap<String, i32>,
    control: BTreeMap<String, i32>,
) {
    if !audio.is_empty() {
        commands.push(Command::NodeMapToAudioBus {
            node_id,
            controls: audio,
        });
    }
    if !control.is_empty() {
        commands.push(Command::NodeMapToControlBus {
            node_id,
            controls: control,
        });
    }
}

/// Stopped nodes with no stopped ancestor, in tree order. Freeing a group
/// frees its subtree, so only these need a free command.
fn topmost_stops(
    before: &NodeTree,
    transitions: &TransitionMap,
    stop_nodes: &BTreeSet<NodeId>,
) -> Result<Vec<NodeId>, SessionError> {
    if stop_nodes.is_empty() {
        return Ok(Vec::new());
    }
    let placed = apply_transitions(before, transitions, &BTreeSet::new())?;
    let topmost = placed
        .iter_nodes(NodeId::ROOT)
        .filter(|n| stop_nodes.contains(n))
        .filter(|n| !stop_nodes.iter().any(|s| placed.is_descendant(*n, *s)))
        .collect();
    Ok(topmost)
}

// ── Serialization ───────────────────────────────────────────

/// Frame each bundle as a big-endian `u32` length followed by its JSON.
pub fn encode(bundles: &[Bundle]) -> Result<Vec<u8>, SessionError> {
    let mut out = Vec::new();
    for bundle in bundles {
        let body = serde_json::to_vec(bundle).map_err(|e| SessionError::Encode {
            message: e.to_string(),
        })?;
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
    }
    Ok(out)
}

/// Lowercase hex SHA-256 of an encoded stream.
pub fn digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

impl Session {
    pub fn to_bundles(&self) -> Result<Vec<Bundle>, SessionError> {
        assemble(self)
    }

    pub fn to_bundles_in(&self, start: f64, stop: f64) -> Result<Vec<Bundle>, SessionError> {
        assemble_range(self, Offset::new(start)?, Some(Offset::new(stop)?))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SessionError> {
        encode(&self.to_bundles()?)
    }

    pub fn to_bytes_in(&self, start: f64, stop: f64) -> Result<Vec<u8>, SessionError> {
        encode(&self.to_bundles_in(start, stop)?)
    }

    /// Content hash of the full serialized timeline.
    pub fn digest(&self) -> Result<String, SessionError> {
        Ok(digest(&self.to_bytes()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{AddAction, BusGroup, SynthDef};

    fn sine() -> SynthDef {
        SynthDef::new("sine")
            .with_parameter("frequency", 440.0)
            .with_parameter("buffer", 0.0)
    }

    fn commands_at(bundles: &[Bundle], timestamp: f64) -> &[Command] {
        &bundles
            .iter()
            .find(|b| b.timestamp == timestamp)
            .unwrap_or_else(|| panic!("no bundle at {timestamp}"))
            .commands
    }

    #[test]
    fn group_then_synth_inside() {
        let mut session = Session::new();
        let g = session.add_group(NodeId::ROOT, AddAction::AddToHead, 0.0, None).unwrap();
        let params = Params::from([("frequency".to_string(), ParamValue::Number(220.0))]);
        session
            .add_synth(sine(), params, g, AddAction::AddToTail, 0.0, Some(1.0))
            .unwrap();
        let bundles = session.to_bundles().unwrap();
        assert_eq!(bundles.len(), 2);
        assert_eq!(
            commands_at(&bundles, 0.0),
            &[
                Command::GroupNew {
                    node_id: 1000,
                    add_action: Action::AttachAtHeadOf,
                    target_node_id: 0,
                },
                Command::SynthNew {
                    node_id: 1001,
                    synthdef: "sine".to_string(),
                    add_action: Action::AttachAtHeadOf,
                    target_node_id: 1000,
                    controls: BTreeMap::from([("frequency".to_string(), 220.0)]),
                },
            ]
        );
        assert_eq!(
            commands_at(&bundles, 1.0),
            &[Command::NodeFree { node_ids: vec![1001] }]
        );
    }

    #[test]
    fn command_phases_keep_their_order() {
        let mut session = Session::new();
        let buf = session
            .add_buffer(
                BufferSpec::Alloc {
                    frame_count: 256,
                    channel_count: 1,
                },
                0.0,
                Some(3.0),
            )
            .unwrap();
        let a = session.add_group(NodeId::ROOT, AddAction::AddToTail, 0.0, None).unwrap();
        let s = session
            .add_synth(sine(), Params::new(), NodeId::ROOT, AddAction::AddToTail, 0.0, Some(3.0))
            .unwrap();
        let late = session
            .add_buffer(
                BufferSpec::Read {
                    path: "kick.wav".to_string(),
                    starting_frame: 0,
                    frame_count: None,
                },
                2.0,
                Some(1.0),
            )
            .unwrap();
        assert_eq!((buf, late), (BufferId(0), BufferId(1)));
        session.move_node(s, a, AddAction::AddBefore, 2.0).unwrap();
        let params = Params::from([("buffer".to_string(), ParamValue::Buffer(late))]);
        session.set_parameters(s, params, 2.0).unwrap();
        session.stop_node(a, 2.0).unwrap();

        let bundles = session.to_bundles().unwrap();
        assert_eq!(
            commands_at(&bundles, 2.0),
            &[
                Command::BufferAllocateRead {
                    buffer_id: 1,
                    path: "kick.wav".to_string(),
                    starting_frame: 0,
                    frame_count: None,
                },
                Command::NodeOrder {
                    add_action: Action::AttachBefore,
                    target_node_id: 1000,
                    node_ids: vec![1001],
                },
                Command::NodeSet {
                    node_id: 1001,
                    controls: BTreeMap::from([("buffer".to_string(), 1.0)]),
                },
                Command::NodeFree { node_ids: vec![1000] },
            ]
        );
        assert_eq!(
            commands_at(&bundles, 3.0),
            &[
                Command::NodeFree { node_ids: vec![1001] },
                Command::BufferFree { buffer_id: 0 },
                Command::BufferFree { buffer_id: 1 },
            ]
        );
    }

    #[test]
    fn only_topmost_stops_are_freed() {
        let mut session = Session::new();
        let g = session.add_group(NodeId::ROOT, AddAction::AddToHead, 0.0, None).unwrap();
        session
            .add_synth(sine(), Params::new(), g, AddAction::AddToHead, 0.0, None)
            .unwrap();
        session.stop_node(g, 1.0).unwrap();
        let bundles = session.to_bundles().unwrap();
        assert_eq!(
            commands_at(&bundles, 1.0),
            &[Command::NodeFree { node_ids: vec![1000] }]
        );
    }

    #[test]
    fn range_filters_and_terminates() {
        let mut session = Session::new();
        session.add_group(NodeId::ROOT, AddAction::AddToHead, 0.0, Some(1.0)).unwrap();
        session.add_group(NodeId::ROOT, AddAction::AddToHead, 2.0, Some(1.0)).unwrap();
        let bundles = session.to_bundles_in(1.0, 10.0).unwrap();
        let stamps: Vec<f64> = bundles.iter().map(|b| b.timestamp).collect();
        assert_eq!(stamps, vec![1.0, 2.0, 3.0, 10.0]);
        assert_eq!(bundles.last().unwrap().commands, vec![Command::Nothing]);

        let inside = session.to_bundles_in(0.0, 3.0).unwrap();
        assert!(inside.iter().all(|b| b.commands != vec![Command::Nothing]));
        assert!(session.to_bundles().unwrap().iter().all(|b| b.commands != vec![Command::Nothing]));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let mut session = Session::new();
        session.add_group(NodeId::ROOT, AddAction::AddToHead, 0.0, Some(1.0)).unwrap();
        assert!(matches!(
            session.to_bundles_in(3.0, 1.0),
            Err(SessionError::InvalidOffset { offset }) if offset == 1.0
        ));
        assert!(session.to_bytes_in(3.0, 1.0).is_err());
        assert_eq!(session.to_bundles_in(1.0, 1.0).unwrap().len(), 1);
    }

    #[test]
    fn bus_ids_follow_hardware_channels() {
        let mut session = Session::with_bus_counts(2, 2);
        let a = session.add_bus(BusGroup::audio(2)).unwrap();
        let c = session.add_bus(BusGroup::control(1)).unwrap();
        let b = session.add_bus(BusGroup::audio(1)).unwrap();
        let d = session.add_bus(BusGroup::control(3)).unwrap();
        let ids = IdMapping::build(&session);
        assert_eq!(ids.bus(a).unwrap(), 4);
        assert_eq!(ids.bus(b).unwrap(), 6);
        assert_eq!(ids.bus(c).unwrap(), 0);
        assert_eq!(ids.bus(d).unwrap(), 1);
        assert!(matches!(
            ids.bus(BusId(9)),
            Err(SessionError::UnknownBus { .. })
        ));
    }

    #[test]
    fn bus_parameters_become_mappings() {
        let mut session = Session::new();
        let audio = session.add_bus(BusGroup::audio(2)).unwrap();
        let control = session.add_bus(BusGroup::control(1)).unwrap();
        session.set_control_bus(control, vec![0.5], 0.0).unwrap();
        let def = SynthDef::new("filter")
            .with_parameter("in", 0.0)
            .with_parameter("cutoff", 1000.0)
            .with_parameter("q", 1.0);
        let params = Params::from([
            ("in".to_string(), ParamValue::Bus(audio)),
            ("cutoff".to_string(), ParamValue::Bus(control)),
            ("q".to_string(), ParamValue::Number(2.0)),
        ]);
        let s = session
            .add_synth(def, params, NodeId::ROOT, AddAction::AddToHead, 0.0, None)
            .unwrap();
        session
            .set_parameters(s, Params::from([("in".to_string(), ParamValue::Number(0.0))]), 1.0)
            .unwrap();
        session
            .set_parameters(s, Params::from([("cutoff".to_string(), ParamValue::Bus(control))]), 2.0)
            .unwrap();

        let bundles = session.to_bundles().unwrap();
        assert_eq!(
            commands_at(&bundles, 0.0),
            &[
                Command::ControlBusSet {
                    bus_id: 0,
                    values: vec![0.5],
                },
                Command::SynthNew {
                    node_id: 1000,
                    synthdef: "filter".to_string(),
                    add_action: Action::AttachAtHeadOf,
                    target_node_id: 0,
                    controls: BTreeMap::from([("q".to_string(), 2.0)]),
                },
                Command::NodeMapToAudioBus {
                    node_id: 1000,
                    controls: BTreeMap::from([("in".to_string(), 2)]),
                },
                Command::NodeMapToControlBus {
                    node_id: 1000,
                    controls: BTreeMap::from([("cutoff".to_string(), 0)]),
                },
            ]
        );
        assert_eq!(
            commands_at(&bundles, 1.0),
            &[Command::NodeSet {
                node_id: 1000,
                controls: BTreeMap::from([("in".to_string(), 0.0)]),
            }]
        );
        assert_eq!(
            commands_at(&bundles, 2.0),
            &[Command::NodeMapToControlBus {
                node_id: 1000,
                controls: BTreeMap::from([("cutoff".to_string(), 0)]),
            }]
        );
    }

    #[test]
    fn stop_before_later_edits_leaves_no_orphan_commands() {
        let mut session = Session::new();
        let a = session.add_group(NodeId::ROOT, AddAction::AddToTail, 0.0, None).unwrap();
        let b = session
            .add_synth(sine(), Params::new(), NodeId::ROOT, AddAction::AddToTail, 0.0, None)
            .unwrap();
        session.move_node(b, a, AddAction::AddBefore, 3.0).unwrap();
        let params = Params::from([("frequency".to_string(), ParamValue::Number(880.0))]);
        session.set_parameters(b, params, 4.0).unwrap();
        session.stop_node(b, 1.0).unwrap();

        let bundles = session.to_bundles().unwrap();
        let freed_at = bundles
            .iter()
            .filter(|b| b.commands.iter().any(|c| matches!(c, Command::NodeFree { .. })))
            .map(|b| b.timestamp)
            .collect::<Vec<_>>();
        assert_eq!(freed_at, vec![1.0]);
        assert!(bundles.iter().all(|b| b.timestamp <= 1.0));
    }

    #[test]
    fn timestamps_strictly_increase() {
        let mut session = Session::new();
        for t in [4.0, 1.0, 2.5, 0.0] {
            session.add_group(NodeId::ROOT, AddAction::AddToTail, t, Some(0.5)).unwrap();
        }
        let bundles = session.to_bundles().unwrap();
        assert!(bundles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn serialization_is_stable() {
        let build = || {
            let mut session = Session::new();
            let g = session.add_group(NodeId::ROOT, AddAction::AddToHead, 0.0, Some(4.0)).unwrap();
            session
                .add_synth(sine(), Params::new(), g, AddAction::AddToHead, 1.0, Some(2.0))
                .unwrap();
            session
        };
        let session = build();
        let first = session.to_bytes().unwrap();
        let second = session.to_bytes().unwrap();
        assert_eq!(first, second);
        assert_eq!(session.digest().unwrap(), build().digest().unwrap());
        assert_eq!(session.digest().unwrap().len(), 64);

        let len = u32::from_be_bytes([first[0], first[1], first[2], first[3]]) as usize;
        let bundle: Bundle = serde_json::from_slice(&first[4..4 + len]).unwrap();
        assert_eq!(bundle.timestamp, 0.0);
    }

    #[test]
    fn digest_of_empty_stream() {
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(Session::new().to_bytes().unwrap().is_empty());
    }

    #[test]
    fn command_json_shape() {
        let cmd = Command::NodeFree { node_ids: vec![1000, 1002] };
        assert_eq!(
            serde_json::to_string(&cmd).unwrap(),
            r#"{"command":"node_free","node_ids":[1000,1002]}"#
        );
        assert_eq!(
            serde_json::to_string(&Command::Nothing).unwrap(),
            r#"{"command":"nothing"}"#
        );
    }
}
