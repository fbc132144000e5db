//! Rendering a [`MixPlan`](crate::mix::MixPlan) to an audio file.

/// Render engine trait.
pub mod backend;
/// `ffmpeg`-based engine (system binary).
pub mod ffmpeg;

pub use backend::RenderEngine;
pub use ffmpeg::{FfmpegRenderer, FfmpegRendererOpts};
