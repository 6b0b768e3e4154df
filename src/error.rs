use crate::node::{BufferId, BusId, NodeId, Rate};
use crate::offset::Offset;
use std::fmt;
use std::path::PathBuf;

/// Faults raised while authoring a session or assembling its bundles.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// A negative or non-finite offset, or a non-positive duration.
    InvalidOffset { offset: f64 },
    /// The transition fixed point did not converge between two snapshots.
    StructuralInconsistency {
        from: Offset,
        to: Offset,
        rounds: usize,
        /// Children mapping of the earlier snapshot.
        current: String,
        /// Children mapping the later snapshot asked for.
        target: String,
    },
    UnknownNode { node: NodeId },
    UnknownBuffer { buffer: BufferId },
    UnknownBus { bus: BusId },
    /// A bus used where a bus of the other rate is required.
    BusRate { bus: BusId, expected: Rate },
    /// A bus block of zero channels, or more values than the block holds.
    InvalidChannelCount { channel_count: usize },
    /// A synth control its definition does not declare.
    UnknownParameter { definition: String, name: String },
    /// A placement that would break the single rooted tree.
    InvalidPlacement {
        node: NodeId,
        anchor: NodeId,
        reason: &'static str,
    },
    /// A bundle could not be serialized.
    Encode { message: String },
}

#[derive(Debug)]
pub enum ScoreError {
    Json {
        line: usize,
        column: usize,
        message: String,
    },
    UnknownLabel { label: String },
    DuplicateLabel { label: String },
    UnknownDefinition { name: String },
    Session(SessionError),
}

/// Failures of the external rendering step. These point at the environment,
/// never at the timeline.
#[derive(Debug)]
pub enum RenderError {
    Io(std::io::Error),
    Spawn {
        program: String,
        source: std::io::Error,
    },
    ExitStatus {
        code: Option<i32>,
        command: String,
    },
    MissingOutput { path: PathBuf },
    /// The session numbered its audio buses for other hardware channel counts.
    BusCounts {
        session: (u32, u32),
        options: (u32, u32),
    },
    Session(SessionError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidOffset { offset } => write!(f, "Invalid offset {offset}"),
            SessionError::StructuralInconsistency {
                from,
                to,
                rounds,
                current,
                target,
            } => write!(
                f,
                "Transitions from @{from} to @{to} did not converge after {rounds} rounds\n  current: {current}\n  target:  {target}"
            ),
            SessionError::UnknownNode { node } => write!(f, "Unknown node {node}"),
            SessionError::UnknownBuffer { buffer } => write!(f, "Unknown buffer {buffer}"),
            SessionError::UnknownBus { bus } => write!(f, "Unknown bus {bus}"),
            SessionError::BusRate { bus, expected } => write!(f, "{bus} is not a {expected} bus"),
            SessionError::InvalidChannelCount { channel_count } => {
                write!(f, "Invalid channel count {channel_count}")
            }
            SessionError::UnknownParameter { definition, name } => {
                write!(f, "Definition '{definition}' has no parameter '{name}'")
            }
            SessionError::InvalidPlacement { node, anchor, reason } => {
                write!(f, "Cannot place {node} relative to {anchor}: {reason}")
            }
            SessionError::Encode { message } => write!(f, "Encoding failed: {message}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl fmt::Display for ScoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreError::Json { line, column, message } => {
                write!(f, "Score error at {line}:{column}: {message}")
            }
            ScoreError::UnknownLabel { label } => write!(f, "Unknown label '{label}'"),
            ScoreError::DuplicateLabel { label } => write!(f, "Duplicate label '{label}'"),
            ScoreError::UnknownDefinition { name } => write!(f, "Unknown definition '{name}'"),
            ScoreError::Session(e) => write!(f, "Session error: {e}"),
        }
    }
}

impl std::error::Error for ScoreError {}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Io(e) => write!(f, "I/O error: {e}"),
            RenderError::Spawn { program, source } => {
                write!(f, "Failed to start '{program}': {source}")
            }
            RenderError::ExitStatus { code: Some(code), command } => {
                write!(f, "'{command}' exited with status {code}")
            }
            RenderError::ExitStatus { code: None, command } => {
                write!(f, "'{command}' was terminated by a signal")
            }
            RenderError::MissingOutput { path } => {
                write!(f, "Expected output '{}' was not written", path.display())
            }
            RenderError::BusCounts { session, options } => write!(
                f,
                "Session built for {} inputs and {} outputs, render uses {} and {}",
                session.0, session.1, options.0, options.1
            ),
            RenderError::Session(e) => write!(f, "Session error: {e}"),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<SessionError> for ScoreError {
    fn from(e: SessionError) -> Self {
        ScoreError::Session(e)
    }
}

impl From<serde_json::Error> for ScoreError {
    fn from(e: serde_json::Error) -> Self {
        ScoreError::Json {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(e: std::io::Error) -> Self {
        RenderError::Io(e)
    }
}

impl From<SessionError> for RenderError {
    fn from(e: SessionError) -> Self {
        RenderError::Session(e)
    }
}
