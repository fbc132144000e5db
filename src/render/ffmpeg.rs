use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::Context as _;

use crate::foundation::atomic_file::TempFileGuard;
use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{SceneError, SceneResult};
use crate::foundation::process::{ToolFailure, is_tool_on_path, run_tool};
use crate::mix::plan::MixPlan;
use crate::render::backend::RenderEngine;

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_CODEC: &str = "libopus";

/// Options for [`FfmpegRenderer`].
#[derive(Clone, Debug)]
pub struct FfmpegRendererOpts {
    /// ffmpeg executable.
    pub program: PathBuf,
    /// Output sample rate (also the bed's rate).
    pub sample_rate: u32,
    /// Audio encoder passed to `-c:a`.
    pub codec: String,
    /// Kill the render after this long.
    pub timeout: Option<Duration>,
}

impl Default for FfmpegRendererOpts {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            sample_rate: DEFAULT_SAMPLE_RATE,
            codec: DEFAULT_CODEC.to_string(),
            timeout: None,
        }
    }
}

/// [`RenderEngine`] that runs the system `ffmpeg` over [`MixPlan::filter_graph`].
#[derive(Clone, Debug, Default)]
pub struct FfmpegRenderer {
    opts: FfmpegRendererOpts,
}

impl FfmpegRenderer {
    pub fn new(opts: FfmpegRendererOpts) -> Self {
        Self { opts }
    }

    pub fn opts(&self) -> &FfmpegRendererOpts {
        &self.opts
    }

    /// Full ffmpeg argument list writing to `out_path`.
    pub fn args(&self, plan: &MixPlan, out_path: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(plan.bed_source(self.opts.sample_rate));
        for seg in &plan.inputs {
            args.push("-i".to_string());
            args.push(seg.source_path.to_string_lossy().to_string());
        }
        args.extend([
            "-filter_complex".to_string(),
            plan.filter_graph(self.opts.sample_rate),
            "-map".to_string(),
            "[out]".to_string(),
            "-ar".to_string(),
            self.opts.sample_rate.to_string(),
            "-c:a".to_string(),
            self.opts.codec.clone(),
            out_path.to_string_lossy().to_string(),
        ]);
        args
    }

    fn validate(&self, plan: &MixPlan) -> SceneResult<()> {
        if self.opts.sample_rate == 0 {
            return Err(SceneError::render("sample rate must be non-zero"));
        }
        if !plan.total_duration_secs.is_finite() || plan.total_duration_secs <= 0.0 {
            return Err(SceneError::render(format!(
                "nothing to render: program duration is {}",
                plan.total_duration_secs
            )));
        }
        for (i, seg) in plan.inputs.iter().enumerate() {
            if !seg.source_path.is_file() {
                return Err(SceneError::render(format!(
                    "segment {i}: input '{}' does not exist",
                    seg.source_path.display()
                )));
            }
        }
        Ok(())
    }
}

impl RenderEngine for FfmpegRenderer {
    #[tracing::instrument(skip_all, fields(inputs = plan.inputs.len(), out = %out_path.display()))]
    fn render(&self, plan: &MixPlan, out_path: &Path, cancel: &CancelToken) -> SceneResult<()> {
        self.validate(plan)?;
        if !is_tool_on_path(&self.opts.program.to_string_lossy()) {
            return Err(SceneError::render(
                "ffmpeg is required for rendering, but was not found on PATH",
            ));
        }

        if let Some(parent) = out_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create output directory '{}'", parent.display())
            })?;
        }

        // Keep the real extension last so ffmpeg still picks the right muxer.
        let tmp = partial_path(out_path);
        let mut guard = TempFileGuard(Some(tmp.clone()));

        let mut cmd = Command::new(&self.opts.program);
        cmd.args(self.args(plan, &tmp));
        let out = run_tool(cmd, cancel, self.opts.timeout).map_err(|e| match e {
            ToolFailure::Cancelled { .. } => SceneError::cancelled("render"),
            other => SceneError::render(other.to_string()),
        })?;
        if !out.status.success() {
            return Err(SceneError::render(format!(
                "ffmpeg exited with status {}: {}",
                out.status,
                out.stderr_text()
            )));
        }

        std::fs::rename(&tmp, out_path).with_context(|| {
            format!(
                "failed to move rendered file into place at '{}'",
                out_path.display()
            )
        })?;
        guard.0 = None;
        tracing::info!(
            total_secs = plan.total_duration_secs,
            "rendered {}",
            out_path.display()
        );
        Ok(())
    }
}

fn partial_path(out_path: &Path) -> PathBuf {
    let stem = out_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "out".to_string());
    let name = match out_path.extension() {
        Some(ext) => format!(".{stem}.{}.partial.{}", std::process::id(), ext.to_string_lossy()),
        None => format!(".{stem}.{}.partial", std::process::id()),
    };
    out_path.with_file_name(name)
}
