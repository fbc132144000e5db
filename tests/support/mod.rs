#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use scenemix::{
    CancelToken, DurationProbe, MixPlan, RenderEngine, SceneError, SceneResult, SoundSynthesizer,
    SpeechSynthesizer,
};

pub fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "scenemix_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

/// Generators that write a `secs=<n>` marker instead of audio.
///
/// Speech lasts half a second per word; sounds last their hint, or `loop_secs` without one.
pub struct MarkerSynth {
    pub loop_secs: f64,
    pub speech_calls: AtomicUsize,
    pub sound_calls: AtomicUsize,
}

impl MarkerSynth {
    pub fn new(loop_secs: f64) -> Self {
        Self {
            loop_secs,
            speech_calls: AtomicUsize::new(0),
            sound_calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> (usize, usize) {
        (
            self.speech_calls.load(Ordering::SeqCst),
            self.sound_calls.load(Ordering::SeqCst),
        )
    }
}

impl SpeechSynthesizer for MarkerSynth {
    fn synthesize_speech(&self, phrase: &str, cancel: &CancelToken) -> SceneResult<Vec<u8>> {
        cancel.check("speech")?;
        self.speech_calls.fetch_add(1, Ordering::SeqCst);
        let secs = 0.5 * phrase.split_whitespace().count() as f64;
        Ok(format!("secs={secs}").into_bytes())
    }
}

impl SoundSynthesizer for MarkerSynth {
    fn synthesize_sound(
        &self,
        _description: &str,
        duration_hint_secs: Option<f64>,
        cancel: &CancelToken,
    ) -> SceneResult<Vec<u8>> {
        cancel.check("sound")?;
        self.sound_calls.fetch_add(1, Ordering::SeqCst);
        let secs = duration_hint_secs.unwrap_or(self.loop_secs);
        Ok(format!("secs={secs}").into_bytes())
    }
}

/// Reads the marker written by [`MarkerSynth`].
pub struct MarkerProbe;

impl DurationProbe for MarkerProbe {
    fn duration_secs(&self, path: &Path, _cancel: &CancelToken) -> SceneResult<f64> {
        let text =
            std::fs::read_to_string(path).map_err(|e| SceneError::probe(path, e.to_string()))?;
        text.trim_start_matches("secs=")
            .parse::<f64>()
            .map_err(|e| SceneError::probe(path, e.to_string()))
    }
}

/// Keeps every plan it is asked to render and writes the plan JSON as the "audio".
#[derive(Default)]
pub struct RecordingRenderer {
    pub plans: Mutex<Vec<MixPlan>>,
}

impl RenderEngine for RecordingRenderer {
    fn render(&self, plan: &MixPlan, out_path: &Path, cancel: &CancelToken) -> SceneResult<()> {
        cancel.check("render")?;
        let json = serde_json::to_vec(plan).map_err(|e| SceneError::render(e.to_string()))?;
        std::fs::write(out_path, json).map_err(|e| SceneError::render(e.to_string()))?;
        self.plans.lock().unwrap().push(plan.clone());
        Ok(())
    }
}

/// Mono 16-bit PCM WAV holding a quiet sine of `secs` length.
pub fn sine_wav(secs: f64, sample_rate: u32, freq_hz: f64) -> Vec<u8> {
    let frames = (secs * sample_rate as f64).round() as u32;
    let data_len = frames * 2;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for i in 0..frames {
        let t = i as f64 / sample_rate as f64;
        let s = (t * freq_hz * std::f64::consts::TAU).sin() * 0.2 * i16::MAX as f64;
        out.extend_from_slice(&(s as i16).to_le_bytes());
    }
    out
}

/// Like [`MarkerSynth`], but emits real WAV audio of the same lengths.
pub struct WavSynth {
    pub loop_secs: f64,
    pub sample_rate: u32,
}

impl SpeechSynthesizer for WavSynth {
    fn synthesize_speech(&self, phrase: &str, _cancel: &CancelToken) -> SceneResult<Vec<u8>> {
        let secs = 0.5 * phrase.split_whitespace().count() as f64;
        Ok(sine_wav(secs, self.sample_rate, 330.0))
    }
}

impl SoundSynthesizer for WavSynth {
    fn synthesize_sound(
        &self,
        _description: &str,
        duration_hint_secs: Option<f64>,
        _cancel: &CancelToken,
    ) -> SceneResult<Vec<u8>> {
        let secs = duration_hint_secs.unwrap_or(self.loop_secs);
        Ok(sine_wav(secs, self.sample_rate, 220.0))
    }
}
