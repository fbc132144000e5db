//! Asset generators.
//!
//! Generators are slow, usually network-bound collaborators. They only produce bytes; the
//! [`AssetCache`](crate::assets::AssetCache) decides whether they run and where the bytes land.

#[cfg(feature = "elevenlabs")]
/// ElevenLabs HTTP client (text-to-speech and sound generation).
pub mod elevenlabs;

use crate::foundation::cancel::CancelToken;
use crate::foundation::error::SceneResult;

/// Turns a phrase into encoded speech audio.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize_speech(&self, phrase: &str, cancel: &CancelToken) -> SceneResult<Vec<u8>>;
}

/// Turns a sound description into encoded audio, optionally of a requested length.
pub trait SoundSynthesizer: Send + Sync {
    fn synthesize_sound(
        &self,
        description: &str,
        duration_hint_secs: Option<f64>,
        cancel: &CancelToken,
    ) -> SceneResult<Vec<u8>>;
}
