//! Run configuration, loaded from a JSON file.
//!
//! Every field has a default, so `{}` is a valid configuration. Relative directories resolve
//! against the current working directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{SceneError, SceneResult};

/// Environment variable that overrides [`ElevenLabsConfig::api_key`].
pub const API_KEY_ENV: &str = "ELEVENLABS_API_KEY";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Root for everything one run produces.
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,

    /// Asset cache root. Defaults to `<run_dir>/assets`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Extension (and therefore container) of cached assets.
    #[serde(default = "default_asset_extension")]
    pub asset_extension: String,

    /// Workers used to generate independent assets ahead of the timeline pass.
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub elevenlabs: ElevenLabsConfig,
}

/// Per-step limits in seconds. `0` disables a limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_generate_secs")]
    pub generate_secs: u64,
    #[serde(default = "default_probe_secs")]
    pub probe_secs: u64,
    #[serde(default = "default_render_secs")]
    pub render_secs: u64,
}

/// Output encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
}

/// ElevenLabs provider settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevenLabsConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// How literally sound generation follows the description, `0..=1`.
    #[serde(default = "default_prompt_influence")]
    pub prompt_influence: f64,
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

impl std::fmt::Debug for ElevenLabsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("voice_id", &self.voice_id)
            .field("model_id", &self.model_id)
            .field("prompt_influence", &self.prompt_influence)
            .field("output_format", &self.output_format)
            .finish()
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            run_dir: default_run_dir(),
            cache_dir: None,
            asset_extension: default_asset_extension(),
            jobs: default_jobs(),
            timeouts: TimeoutConfig::default(),
            render: RenderConfig::default(),
            elevenlabs: ElevenLabsConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            generate_secs: default_generate_secs(),
            probe_secs: default_probe_secs(),
            render_secs: default_render_secs(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            codec: default_codec(),
        }
    }
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            voice_id: default_voice_id(),
            model_id: default_model_id(),
            prompt_influence: default_prompt_influence(),
            output_format: default_output_format(),
        }
    }
}

impl SceneConfig {
    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> SceneResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SceneError::config(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_json(&text)
            .map_err(|e| SceneError::config(format!("{}: {e}", path.display())))
    }

    pub fn from_json(text: &str) -> SceneResult<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| SceneError::config(format!("invalid configuration JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> SceneResult<()> {
        if self.jobs == 0 {
            return Err(SceneError::config("jobs must be >= 1"));
        }
        let ext = self.asset_extension.as_str();
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SceneError::config(
                "asset_extension must be a non-empty alphanumeric extension (e.g. 'opus')",
            ));
        }
        if self.render.sample_rate == 0 {
            return Err(SceneError::config("render.sample_rate must be non-zero"));
        }
        if self.render.codec.trim().is_empty() {
            return Err(SceneError::config("render.codec must be non-empty"));
        }
        let influence = self.elevenlabs.prompt_influence;
        if !(0.0..=1.0).contains(&influence) {
            return Err(SceneError::config(
                "elevenlabs.prompt_influence must be within 0..=1",
            ));
        }
        Ok(())
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.run_dir.join("assets"))
    }

    /// API key from the environment, falling back to the config file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.elevenlabs.api_key.clone())
    }
}

impl TimeoutConfig {
    pub fn generate(&self) -> Option<Duration> {
        secs_limit(self.generate_secs)
    }

    pub fn probe(&self) -> Option<Duration> {
        secs_limit(self.probe_secs)
    }

    pub fn render(&self) -> Option<Duration> {
        secs_limit(self.render_secs)
    }
}

fn secs_limit(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn default_run_dir() -> PathBuf {
    PathBuf::from("runs").join("default")
}

fn default_asset_extension() -> String {
    "opus".to_string()
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(8)
}

fn default_generate_secs() -> u64 {
    120
}

fn default_probe_secs() -> u64 {
    30
}

fn default_render_secs() -> u64 {
    600
}

fn default_sample_rate() -> u32 {
    48_000
}

fn default_codec() -> String {
    "libopus".to_string()
}

fn default_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}

fn default_voice_id() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}

fn default_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_prompt_influence() -> f64 {
    1.0
}

fn default_output_format() -> String {
    "opus_48000_192".to_string()
}
