//! Offline rendering through an external synthesis server.
//!
//! The session's bundle stream is written to `<digest>.osc` and handed to the
//! server's non-realtime mode, which writes the output sound file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bundle::digest;
use crate::error::RenderError;
use crate::session::Session;

// ── Configuration ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderFormat {
    #[default]
    Aiff,
    Wav,
    Caf,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    Int8,
    Int16,
    #[default]
    Int24,
    Int32,
    Float,
    Double,
}

impl HeaderFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            HeaderFormat::Aiff => "aiff",
            HeaderFormat::Wav => "wav",
            HeaderFormat::Caf => "caf",
            HeaderFormat::Raw => "raw",
        }
    }
}

impl SampleFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Int8 => "int8",
            SampleFormat::Int16 => "int16",
            SampleFormat::Int24 => "int24",
            SampleFormat::Int32 => "int32",
            SampleFormat::Float => "float",
            SampleFormat::Double => "double",
        }
    }
}

/// Settings for one offline render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    /// Server executable, looked up on `PATH` unless absolute.
    pub executable: String,
    pub sample_rate: u32,
    pub header_format: HeaderFormat,
    pub sample_format: SampleFormat,
    pub input_bus_count: u32,
    pub output_bus_count: u32,
    /// Sound file fed to the input buses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_path: Option<PathBuf>,
    /// Render length in seconds. Pads the stream with a terminal bundle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            executable: "scsynth".to_string(),
            sample_rate: 44100,
            header_format: HeaderFormat::default(),
            sample_format: SampleFormat::default(),
            input_bus_count: 0,
            output_bus_count: 2,
            input_path: None,
            duration: None,
        }
    }
}

impl RenderOptions {
    /// An empty session whose audio buses start after these hardware channels.
    pub fn session(&self) -> Session {
        Session::with_bus_counts(self.input_bus_count, self.output_bus_count)
    }
}

// ── Command Line ────────────────────────────────────────────

/// Arguments for the non-realtime invocation, executable first. Bus counts
/// only appear when they differ from the defaults.
pub fn command_line(stream: &Path, output: &Path, options: &RenderOptions) -> Vec<String> {
    let defaults = RenderOptions::default();
    let mut args = vec![
        options.executable.clone(),
        "-N".to_string(),
        stream.display().to_string(),
        options
            .input_path
            .as_ref()
            .map_or_else(|| "_".to_string(), |p| p.display().to_string()),
        output.display().to_string(),
        options.sample_rate.to_string(),
        options.header_format.as_str().to_string(),
        options.sample_format.as_str().to_string(),
    ];
    if options.input_bus_count != defaults.input_bus_count {
        args.extend(["-i".to_string(), options.input_bus_count.to_string()]);
    }
    if options.output_bus_count != defaults.output_bus_count {
        args.extend(["-o".to_string(), options.output_bus_count.to_string()]);
    }
    args
}

// ── Rendering ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub digest: String,
    pub stream_path: PathBuf,
    pub output_path: PathBuf,
    pub command: String,
}

/// Write the session's stream into `dir` and run the server on it. The
/// session's hardware bus counts must match the options.
pub fn render(
    session: &Session,
    dir: &Path,
    output: &Path,
    options: &RenderOptions,
) -> Result<RenderReport, RenderError> {
    let counts = (session.input_count(), session.output_count());
    let wanted = (options.input_bus_count, options.output_bus_count);
    if counts != wanted {
        return Err(RenderError::BusCounts {
            session: counts,
            options: wanted,
        });
    }
    let bytes = match options.duration {
        Some(duration) => session.to_bytes_in(0.0, duration)?,
        None => session.to_bytes()?,
    };
    let digest = digest(&bytes);
    fs::create_dir_all(dir)?;
    let stream_path = dir.join(format!("{digest}.osc"));
    fs::write(&stream_path, &bytes)?;
    debug!(path = %stream_path.display(), bytes = bytes.len(), "wrote bundle stream");

    let args = command_line(&stream_path, output, options);
    let command = args.join(" ");
    info!(%command, "rendering");
    let status = Command::new(&args[0])
        .args(&args[1..])
        .status()
        .map_err(|source| RenderError::Spawn {
            program: options.executable.clone(),
            source,
        })?;
    if !status.success() {
        return Err(RenderError::ExitStatus {
            code: status.code(),
            command,
        });
    }
    if !output.exists() {
        return Err(RenderError::MissingOutput {
            path: output.to_path_buf(),
        });
    }
    Ok(RenderReport {
        digest,
        stream_path,
        output_path: output.to_path_buf(),
        command,
    })
}
