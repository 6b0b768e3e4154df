//! Declarative scores.
//!
//! A score is a JSON document that names synth definitions and lists timed
//! events against labels instead of handles:
//!
//! ```json
//! {
//!   "definitions": { "sine": { "frequency": 440.0 } },
//!   "duration": 4.0,
//!   "events": [
//!     { "type": "group", "label": "voices", "at": 0.0 },
//!     { "type": "synth", "label": "a", "definition": "sine", "target": "voices",
//!       "action": "addToTail", "at": 0.0, "duration": 2.0,
//!       "params": { "frequency": 220.0 } },
//!     { "type": "set", "node": "a", "at": 1.0, "params": { "frequency": 330.0 } }
//!   ]
//! }
//! ```
//!
//! Events are applied in document order. The label `root` always names the
//! root group. Bus labels are session-wide: `bus` declares a group, `setBus`
//! writes control values, and `{"bus": "<label>"}` maps a parameter to it.

use std::collections::BTreeMap;
use std::ops::Range;

use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bundle::Bundle;
use crate::error::{ScoreError, SessionError};
use crate::node::{
    AddAction, BufferId, BufferSpec, BusGroup, BusId, NodeId, ParamValue, Params, Rate, SynthDef,
    one_channel,
};
use crate::session::Session;

const ROOT_LABEL: &str = "root";

// ── Document ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Definition name → parameter defaults.
    #[serde(default)]
    pub definitions: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    pub events: Vec<ScoreEvent>,
    /// Total render length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Hardware channels ahead of the first private audio bus.
    #[serde(default)]
    pub input_bus_count: u32,
    #[serde(default = "two_channels")]
    pub output_bus_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScoreEvent {
    Group {
        label: String,
        at: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        #[serde(default = "root_label")]
        target: String,
        #[serde(default)]
        action: AddAction,
    },
    Synth {
        label: String,
        definition: String,
        at: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        #[serde(default = "root_label")]
        target: String,
        #[serde(default)]
        action: AddAction,
        #[serde(default)]
        params: BTreeMap<String, ScoreValue>,
    },
    Buffer {
        label: String,
        at: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
        buffer: BufferSpec,
    },
    Move {
        node: String,
        at: f64,
        target: String,
        #[serde(default)]
        action: AddAction,
    },
    Set {
        node: String,
        at: f64,
        params: BTreeMap<String, ScoreValue>,
    },
    Bus {
        label: String,
        rate: Rate,
        #[serde(default = "one_channel")]
        channel_count: u32,
    },
    SetBus { bus: String, at: f64, values: Vec<f64> },
    /// Stops a node or frees a buffer, whichever the label names.
    Stop { label: String, at: f64 },
}

/// A parameter value: a number, `{"buffer": "<label>"}` or `{"bus": "<label>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
    Number(f64),
    Buffer { buffer: String },
    Bus { bus: String },
}

fn root_label() -> String {
    ROOT_LABEL.to_string()
}

fn two_channels() -> u32 {
    2
}

// ── Building ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Node(NodeId),
    Buffer(BufferId),
    Bus(BusId),
}

/// A score turned into a session, with its labels resolved.
#[derive(Debug, Clone)]
pub struct CompiledScore {
    pub session: Session,
    pub duration: Option<f64>,
    pub labels: BTreeMap<String, Handle>,
}

impl CompiledScore {
    pub fn bundles(&self) -> Result<Vec<Bundle>, SessionError> {
        match self.duration {
            Some(duration) => self.session.to_bundles_in(0.0, duration),
            None => self.session.to_bundles(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SessionError> {
        match self.duration {
            Some(duration) => self.session.to_bytes_in(0.0, duration),
            None => self.session.to_bytes(),
        }
    }

    pub fn digest(&self) -> Result<String, SessionError> {
        Ok(crate::bundle::digest(&self.to_bytes()?))
    }
}

/// Parse a JSON score.
pub fn parse(source: &str) -> Result<Score, ScoreError> {
    Ok(serde_json::from_str(source)?)
}

/// Parse and build a JSON score.
pub fn compile(source: &str) -> Result<CompiledScore, ScoreError> {
    parse(source)?.build()
}

struct Builder {
    session: Session,
    labels: BTreeMap<String, Handle>,
}

impl Builder {
    fn node(&self, label: &str) -> Result<NodeId, ScoreError> {
        match self.labels.get(label) {
            Some(Handle::Node(node)) => Ok(*node),
            _ => Err(ScoreError::UnknownLabel {
                label: label.to_string(),
            }),
        }
    }

    fn buffer(&self, label: &str) -> Result<BufferId, ScoreError> {
        match self.labels.get(label) {
            Some(Handle::Buffer(buffer)) => Ok(*buffer),
            _ => Err(ScoreError::UnknownLabel {
                label: label.to_string(),
            }),
        }
    }

    fn bus(&self, label: &str) -> Result<BusId, ScoreError> {
        match self.labels.get(label) {
            Some(Handle::Bus(bus)) => Ok(*bus),
            _ => Err(ScoreError::UnknownLabel {
                label: label.to_string(),
            }),
        }
    }

    fn claim(&self, label: &str) -> Result<(), ScoreError> {
        if self.labels.contains_key(label) {
            return Err(ScoreError::DuplicateLabel {
                label: label.to_string(),
            });
        }
        Ok(())
    }

    fn params(&self, values: &BTreeMap<String, ScoreValue>) -> Result<Params, ScoreError> {
        values
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    ScoreValue::Number(v) => ParamValue::Number(*v),
                    ScoreValue::Buffer { buffer } => ParamValue::Buffer(self.buffer(buffer)?),
                    ScoreValue::Bus { bus } => ParamValue::Bus(self.bus(bus)?),
                };
                Ok((name.clone(), value))
            })
            .collect()
    }
}

impl Score {
    pub fn build(&self) -> Result<CompiledScore, ScoreError> {
        let mut builder = Builder {
            session: Session::with_bus_counts(self.input_bus_count, self.output_bus_count),
            labels: BTreeMap::from([(ROOT_LABEL.to_string(), Handle::Node(NodeId::ROOT))]),
        };
        for event in &self.events {
            self.apply(&mut builder, event)?;
        }
        debug!(
            events = self.events.len(),
            states = builder.session.states().len(),
            "built score"
        );
        Ok(CompiledScore {
            session: builder.session,
            duration: self.duration,
            labels: builder.labels,
        })
    }

    fn apply(&self, b: &mut Builder, event: &ScoreEvent) -> Result<(), ScoreError> {
        match event {
            ScoreEvent::Group {
                label,
                at,
                duration,
                target,
                action,
            } => {
                b.claim(label)?;
                let target = b.node(target)?;
                let node = b.session.add_group(target, *action, *at, *duration)?;
                b.labels.insert(label.clone(), Handle::Node(node));
            }
            ScoreEvent::Synth {
                label,
                definition,
                at,
                duration,
                target,
                action,
                params,
            } => {
                b.claim(label)?;
                let defaults = self
                    .definitions
                    .get(definition)
                    .ok_or_else(|| ScoreError::UnknownDefinition {
                        name: definition.clone(),
                    })?;
                let synthdef = SynthDef {
                    name: definition.clone(),
                    parameters: defaults.clone(),
                };
                let target = b.node(target)?;
                let params = b.params(params)?;
                let node = b
                    .session
                    .add_synth(synthdef, params, target, *action, *at, *duration)?;
                b.labels.insert(label.clone(), Handle::Node(node));
            }
            ScoreEvent::Buffer {
                label,
                at,
                duration,
                buffer,
            } => {
                b.claim(label)?;
                let id = b.session.add_buffer(buffer.clone(), *at, *duration)?;
                b.labels.insert(label.clone(), Handle::Buffer(id));
            }
            ScoreEvent::Move {
                node,
                at,
                target,
                action,
            } => {
                let node = b.node(node)?;
                let target = b.node(target)?;
                b.session.move_node(node, target, *action, *at)?;
            }
            ScoreEvent::Set { node, at, params } => {
                let node = b.node(node)?;
                let params = b.params(params)?;
                b.session.set_parameters(node, params, *at)?;
            }
            ScoreEvent::Bus {
                label,
                rate,
                channel_count,
            } => {
                b.claim(label)?;
                let id = b.session.add_bus(BusGroup {
                    rate: *rate,
                    channel_count: *channel_count,
                })?;
                b.labels.insert(label.clone(), Handle::Bus(id));
            }
            ScoreEvent::SetBus { bus, at, values } => {
                let bus = b.bus(bus)?;
                b.session.set_control_bus(bus, values.clone(), *at)?;
            }
            ScoreEvent::Stop { label, at } => match b.labels.get(label) {
                Some(Handle::Node(node)) => b.session.stop_node(*node, *at)?,
                Some(Handle::Buffer(buffer)) => b.session.stop_buffer(*buffer, *at)?,
                // Buses live as long as the session.
                Some(Handle::Bus(_)) | None => {
                    return Err(ScoreError::UnknownLabel {
                        label: label.clone(),
                    });
                }
            },
        }
        Ok(())
    }
}

// ── Diagnostics ─────────────────────────────────────────────

impl ScoreError {
    /// Render this error against the score source as a plain-text diagnostic.
    pub fn report(&self, source: &str) -> String {
        let span = self.span(source);
        let note = match self {
            ScoreError::Json { .. } => "invalid score here",
            ScoreError::UnknownLabel { .. } => "not defined before this use",
            ScoreError::DuplicateLabel { .. } => "already defined",
            ScoreError::UnknownDefinition { .. } => "no such definition",
            ScoreError::Session(_) => "while building this score",
        };
        let mut out = Vec::new();
        let written = Report::build(ReportKind::Error, span.clone())
            .with_config(
                Config::default()
                    .with_color(false)
                    .with_index_type(IndexType::Byte),
            )
            .with_message(self.to_string())
            .with_label(Label::new(span).with_message(note))
            .finish()
            .write(Source::from(source.to_string()), &mut out);
        match written {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => self.to_string(),
        }
    }

    fn span(&self, source: &str) -> Range<usize> {
        let start = match self {
            ScoreError::Json { line, column, .. } => line_column_offset(source, *line, *column),
            ScoreError::UnknownLabel { label } => find_quoted(source, label, false),
            ScoreError::DuplicateLabel { label } => find_quoted(source, label, true),
            ScoreError::UnknownDefinition { name } => find_quoted(source, name, true),
            ScoreError::Session(_) => None,
        }
        .unwrap_or(0);
        let start = start.min(source.len().saturating_sub(1));
        let end = source[start..]
            .chars()
            .next()
            .map_or(start, |c| start + c.len_utf8());
        start..end
    }
}

/// Byte offset of a 1-based line and column.
fn line_column_offset(source: &str, line: usize, column: usize) -> Option<usize> {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let offset = line_start + column.saturating_sub(1);
    let offset = offset.min(source.len());
    // Land on a char boundary.
    (0..=offset).rev().find(|&i| source.is_char_boundary(i))
}

/// Offset of `"text"` in the source, first or last occurrence.
fn find_quoted(source: &str, text: &str, last: bool) -> Option<usize> {
    let needle = format!("\"{text}\"");
    let found = if last {
        source.rfind(&needle)
    } else {
        source.find(&needle)
    };
    found.map(|i| i + 1)
}
