use std::time::Duration;

use anyhow::Context;
use serde::Serialize;

use crate::config::ElevenLabsConfig;
use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{SceneError, SceneResult};
use crate::synth::{SoundSynthesizer, SpeechSynthesizer};

/// Sound generation rejects hints outside this range.
const SOUND_DURATION_RANGE: (f64, f64) = (0.5, 22.0);

/// Blocking ElevenLabs client for speech and sound effects.
///
/// Requests cannot be interrupted once sent; cancellation is checked before each request and
/// again before the response body is accepted.
///
/// The API key is only needed once something is actually generated, so a client without one can
/// still drive a run whose assets are all cached.
pub struct ElevenLabsClient {
    http: reqwest::blocking::Client,
    api_key: Option<String>,
    cfg: ElevenLabsConfig,
}

#[derive(Serialize)]
struct SpeechBody<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[derive(Serialize)]
struct SoundBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<f64>,
    prompt_influence: f64,
}

impl ElevenLabsClient {
    pub fn new(
        api_key: Option<String>,
        cfg: ElevenLabsConfig,
        timeout: Option<Duration>,
    ) -> SceneResult<Self> {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self { http, api_key, cfg })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{path}?output_format={}",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.output_format
        )
    }

    fn post<B: Serialize>(
        &self,
        what: &str,
        url: String,
        body: &B,
        cancel: &CancelToken,
    ) -> SceneResult<Vec<u8>> {
        cancel.check(what)?;
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(SceneError::config(format!(
                "{what} needs an ElevenLabs API key (set {} or elevenlabs.api_key)",
                crate::config::API_KEY_ENV
            )));
        };
        tracing::debug!(%url, "elevenlabs request");

        let resp = self
            .http
            .post(&url)
            .header("xi-api-key", api_key)
            .json(body)
            .send()
            .with_context(|| format!("{what}: request to '{url}' failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().unwrap_or_default();
            return Err(
                anyhow::anyhow!("{what}: provider returned {status}: {}", detail.trim()).into(),
            );
        }
        let bytes = resp
            .bytes()
            .with_context(|| format!("{what}: failed to read response body"))?;
        cancel.check(what)?;
        Ok(bytes.to_vec())
    }
}

impl SpeechSynthesizer for ElevenLabsClient {
    fn synthesize_speech(&self, phrase: &str, cancel: &CancelToken) -> SceneResult<Vec<u8>> {
        let url = self.endpoint(&format!("/v1/text-to-speech/{}", self.cfg.voice_id));
        let body = SpeechBody {
            text: phrase,
            model_id: &self.cfg.model_id,
        };
        self.post("speech synthesis", url, &body, cancel)
    }
}

impl SoundSynthesizer for ElevenLabsClient {
    fn synthesize_sound(
        &self,
        description: &str,
        duration_hint_secs: Option<f64>,
        cancel: &CancelToken,
    ) -> SceneResult<Vec<u8>> {
        let url = self.endpoint("/v1/sound-generation");
        let body = SoundBody {
            text: description,
            duration_seconds: duration_hint_secs.map(clamp_sound_duration),
            prompt_influence: self.cfg.prompt_influence,
        };
        self.post("sound generation", url, &body, cancel)
    }
}

/// The provider only accepts a bounded length; placement trims the asset to the scripted
/// duration anyway.
fn clamp_sound_duration(secs: f64) -> f64 {
    secs.clamp(SOUND_DURATION_RANGE.0, SOUND_DURATION_RANGE.1)
}
