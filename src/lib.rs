#![forbid(unsafe_code)]

pub mod assets;
pub mod config;
pub mod foundation;
pub mod media;
pub mod mix;
pub mod pipeline;
pub mod render;
pub mod script;
pub mod synth;
pub mod timeline;

pub use assets::{AssetCache, AssetKey, CacheStats, Namespace};
pub use config::SceneConfig;
pub use foundation::cancel::CancelToken;
pub use foundation::error::{SceneError, SceneResult};
pub use foundation::process::is_tool_on_path;
pub use media::{DurationProbe, FfprobeDuration};
pub use mix::{MixPlan, PanGains, pan_gains};
pub use pipeline::Pipeline;
pub use render::{FfmpegRenderer, FfmpegRendererOpts, RenderEngine};
pub use script::{Command, ScriptLine, parse_line, parse_script};
pub use synth::{SoundSynthesizer, SpeechSynthesizer};
pub use timeline::{BuildReport, Collaborators, PlacedSegment, Timeline, TimelineBuilder};
