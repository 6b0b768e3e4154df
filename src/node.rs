//! Identity model for session entities.
//!
//! Nodes, buffers and buses are opaque handles. A node's place in the tree
//! lives in each snapshot's mappings, never on the node itself, so the same
//! handle can sit in different positions (or nowhere) at different offsets.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── Handles ─────────────────────────────────────────────────

/// Opaque handle for a group or synth. `NodeId::ROOT` is the root group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Opaque handle for a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BufferId(pub(crate) u32);

impl BufferId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer-{}", self.0)
    }
}

/// Opaque handle for a block of contiguous buses of one rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BusId(pub(crate) u32);

impl BusId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus-{}", self.0)
    }
}

// ── Buses ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rate {
    Audio,
    Control,
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Audio => write!(f, "audio"),
            Rate::Control => write!(f, "control"),
        }
    }
}

/// Buses allocated together as one contiguous block. They live for the
/// whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusGroup {
    pub rate: Rate,
    #[serde(default = "one_channel")]
    pub channel_count: u32,
}

pub(crate) fn one_channel() -> u32 {
    1
}

impl BusGroup {
    pub fn audio(channel_count: u32) -> Self {
        BusGroup {
            rate: Rate::Audio,
            channel_count,
        }
    }

    pub fn control(channel_count: u32) -> Self {
        BusGroup {
            rate: Rate::Control,
            channel_count,
        }
    }
}

// ── Definitions & Parameters ────────────────────────────────

/// A compiled synth definition as handed over by the definition compiler:
/// a name plus parameter defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthDef {
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
}

impl SynthDef {
    pub fn new(name: impl Into<String>) -> Self {
        SynthDef {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, default: f64) -> Self {
        self.parameters.insert(name.into(), default);
        self
    }

    pub fn declares(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }
}

/// A synth control value. Buffer references resolve to buffer ids when the
/// bundle is assembled; bus references map the control onto the bus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Buffer(BufferId),
    Bus(BusId),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<BufferId> for ParamValue {
    fn from(b: BufferId) -> Self {
        ParamValue::Buffer(b)
    }
}

impl From<BusId> for ParamValue {
    fn from(b: BusId) -> Self {
        ParamValue::Bus(b)
    }
}

pub type Params = BTreeMap<String, ParamValue>;

// ── Entities ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Group,
    Synth { definition: SynthDef, params: Params },
}

impl NodeKind {
    /// Whether this node may own children.
    pub fn is_container(&self) -> bool {
        !matches!(self, NodeKind::Synth { .. })
    }
}

/// How a buffer is filled when it is allocated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BufferSpec {
    /// Empty buffer of the given size.
    Alloc { frame_count: u32, channel_count: u32 },
    /// Buffer read from a sound file.
    Read {
        path: String,
        #[serde(default)]
        starting_frame: u32,
        /// `None` reads to the end of the file.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame_count: Option<u32>,
    },
}

// ── Placement ───────────────────────────────────────────────

/// Where a caller wants a node placed relative to a target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddAction {
    #[default]
    AddToHead,
    AddToTail,
    AddBefore,
    AddAfter,
}
