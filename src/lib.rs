//! Non-realtime session timelines.
//!
//! A [`Session`](session::Session) is a sparse series of snapshots of a
//! synthesis server's node tree. Authoring calls start, move, stop and
//! parameterize nodes at offsets; the session keeps the transitions between
//! consecutive snapshots consistent and assembles them into time-stamped
//! command [`Bundle`](bundle::Bundle)s for offline rendering.

pub mod bundle;
pub mod error;
pub mod node;
pub mod offset;
pub mod render;
pub mod score;
pub mod session;
pub mod state;
pub mod transition;
pub mod tree;

pub use crate::bundle::{Bundle, Command};
pub use crate::error::{RenderError, ScoreError, SessionError};
pub use crate::node::{
    AddAction, BufferId, BufferSpec, BusGroup, BusId, NodeId, ParamValue, Params, Rate, SynthDef,
};
pub use crate::offset::Offset;
pub use crate::render::RenderOptions;
pub use crate::session::Session;

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the nrt_session version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: compile a JSON score into its list of command bundles.
#[wasm_bindgen]
pub fn compile_score(source: &str) -> Result<JsValue, JsValue> {
    let score = score::compile(source).map_err(|e| JsValue::from_str(&e.report(source)))?;
    let bundles = score.bundles().map_err(|e| JsValue::from_str(&format!("{e}")))?;
    serde_wasm_bindgen::to_value(&bundles).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: content digest of a JSON score's serialized bundle stream.
#[wasm_bindgen]
pub fn score_digest(source: &str) -> Result<String, JsValue> {
    let score = score::compile(source).map_err(|e| JsValue::from_str(&e.report(source)))?;
    score.digest().map_err(|e| JsValue::from_str(&format!("{e}")))
}
