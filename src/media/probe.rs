use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{SceneError, SceneResult};
use crate::foundation::process::{ToolFailure, run_tool};

/// Measures the playable length of an audio file.
pub trait DurationProbe: Send + Sync {
    /// Duration in seconds; always finite and `> 0` on success.
    fn duration_secs(&self, path: &Path, cancel: &CancelToken) -> SceneResult<f64>;
}

/// [`DurationProbe`] backed by the system `ffprobe` binary.
#[derive(Clone, Debug)]
pub struct FfprobeDuration {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Default for FfprobeDuration {
    fn default() -> Self {
        Self::new()
    }
}

impl FfprobeDuration {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffprobe"),
            timeout: None,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl DurationProbe for FfprobeDuration {
    fn duration_secs(&self, path: &Path, cancel: &CancelToken) -> SceneResult<f64> {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_entries",
            "format=duration",
        ])
        .arg(path);

        let out = run_tool(cmd, cancel, self.timeout).map_err(|e| match e {
            ToolFailure::Cancelled { .. } => {
                SceneError::cancelled(format!("probe '{}'", path.display()))
            }
            other => SceneError::probe(path, other.to_string()),
        })?;
        if !out.status.success() {
            return Err(SceneError::probe(
                path,
                format!("ffprobe exited with {}: {}", out.status, out.stderr_text()),
            ));
        }

        parse_ffprobe_duration(&out.stdout).map_err(|msg| SceneError::probe(path, msg))
    }
}

/// Extract `format.duration` from `ffprobe -print_format json` output.
pub(crate) fn parse_ffprobe_duration(stdout: &[u8]) -> Result<f64, String> {
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        format: Option<ProbeFormat>,
    }

    let parsed: ProbeOut =
        serde_json::from_slice(stdout).map_err(|e| format!("ffprobe json parse failed: {e}"))?;
    let raw = parsed
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| "ffprobe reported no duration (not recognized audio?)".to_string())?;
    let secs = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid duration '{raw}'"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("non-positive duration {secs}"));
    }
    Ok(secs)
}
