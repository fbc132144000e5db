use std::path::Path;
use std::sync::Arc;

use crate::assets::AssetCache;
use crate::config::SceneConfig;
use crate::foundation::cancel::CancelToken;
use crate::foundation::error::SceneResult;
use crate::media::DurationProbe;
use crate::mix::MixPlan;
use crate::render::RenderEngine;
use crate::script::parse_script;
use crate::synth::{SoundSynthesizer, SpeechSynthesizer};
use crate::timeline::{BuildReport, Collaborators, Timeline, TimelineBuilder};

/// Script in, mixed file out.
///
/// Owns the asset cache and every collaborator, so repeated compiles in one process share the
/// cache's in-flight table and counters.
pub struct Pipeline {
    cfg: SceneConfig,
    cache: AssetCache,
    speech: Arc<dyn SpeechSynthesizer>,
    sound: Arc<dyn SoundSynthesizer>,
    probe: Arc<dyn DurationProbe>,
    renderer: Arc<dyn RenderEngine>,
    cancel: CancelToken,
}

impl Pipeline {
    pub fn new(
        cfg: SceneConfig,
        speech: Arc<dyn SpeechSynthesizer>,
        sound: Arc<dyn SoundSynthesizer>,
        probe: Arc<dyn DurationProbe>,
        renderer: Arc<dyn RenderEngine>,
    ) -> Self {
        let cache = AssetCache::new(cfg.cache_dir(), cfg.asset_extension.clone());
        Self {
            cfg,
            cache,
            speech,
            sound,
            probe,
            renderer,
            cancel: CancelToken::new(),
        }
    }

    /// ElevenLabs generators, ffprobe and ffmpeg, all configured from `cfg`.
    ///
    /// A missing API key is not an error here; it surfaces only if an asset has to be generated.
    #[cfg(feature = "elevenlabs")]
    pub fn from_config(cfg: SceneConfig) -> SceneResult<Self> {
        use crate::media::FfprobeDuration;
        use crate::render::{FfmpegRenderer, FfmpegRendererOpts};
        use crate::synth::elevenlabs::ElevenLabsClient;

        cfg.validate()?;
        if cfg.api_key().is_none() {
            tracing::debug!("no ElevenLabs API key; only cached assets can be used");
        }
        let client = Arc::new(ElevenLabsClient::new(
            cfg.api_key(),
            cfg.elevenlabs.clone(),
            cfg.timeouts.generate(),
        )?);
        let probe = Arc::new(FfprobeDuration::new().with_timeout(cfg.timeouts.probe()));
        let renderer = Arc::new(FfmpegRenderer::new(FfmpegRendererOpts {
            sample_rate: cfg.render.sample_rate,
            codec: cfg.render.codec.clone(),
            timeout: cfg.timeouts.render(),
            ..FfmpegRendererOpts::default()
        }));
        Ok(Self::new(cfg, client.clone(), client, probe, renderer))
    }

    /// Share an existing token instead of the pipeline's own.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn config(&self) -> &SceneConfig {
        &self.cfg
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Parse and place every command, generating any missing assets.
    #[tracing::instrument(skip_all, fields(bytes = text.len()))]
    pub fn build_timeline(&self, text: &str) -> SceneResult<(Timeline, BuildReport)> {
        let lines = parse_script(text)?;
        let collab = Collaborators {
            speech: self.speech.as_ref(),
            sound: self.sound.as_ref(),
            probe: self.probe.as_ref(),
        };
        TimelineBuilder::new(&self.cache, collab, self.cancel.clone())
            .with_jobs(self.cfg.jobs)
            .build_with_report(&lines)
    }

    #[tracing::instrument(skip_all)]
    pub fn compile_script(&self, text: &str) -> SceneResult<MixPlan> {
        let (timeline, report) = self.build_timeline(text)?;
        let stats = self.cache.stats();
        tracing::info!(
            commands = report.commands,
            segments = report.segments,
            total_secs = timeline.total_duration_secs,
            cache_hits = stats.hits,
            generated = stats.generated,
            "timeline compiled"
        );
        Ok(MixPlan::from(timeline))
    }

    /// Compile, then render into `out_path`. Returns the plan that was rendered.
    #[tracing::instrument(skip_all, fields(out = %out_path.display()))]
    pub fn render_script(&self, text: &str, out_path: &Path) -> SceneResult<MixPlan> {
        let plan = self.compile_script(text)?;
        self.cancel.check("render")?;
        self.renderer.render(&plan, out_path, &self.cancel)?;
        Ok(plan)
    }
}
