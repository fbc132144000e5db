use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::Digest as _;

const FRAGMENT_MAX_CHARS: usize = 40;
const DIGEST_HEX_CHARS: usize = 32;

/// Media role of a cached asset. Each namespace is its own directory, so a phrase and a sound
/// description with identical text never share a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Voice,
    Sound,
}

impl Namespace {
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Sound => "sound",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Deterministic cache identity for a phrase or sound description.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssetKey {
    pub namespace: Namespace,
    pub text: String,
}

impl AssetKey {
    pub fn new(namespace: Namespace, text: impl Into<String>) -> Self {
        Self {
            namespace,
            text: text.into(),
        }
    }

    pub fn voice(text: impl Into<String>) -> Self {
        Self::new(Namespace::Voice, text)
    }

    pub fn sound(text: impl Into<String>) -> Self {
        Self::new(Namespace::Sound, text)
    }

    /// `{fragment}_{digest}.{ext}`, a pure function of the key text.
    pub fn file_name(&self, ext: &str) -> String {
        format!(
            "{}_{}.{}",
            sanitize_fragment(&self.text),
            digest_hex(&self.text),
            ext
        )
    }

    /// Path relative to the cache root: `{namespace}/{file_name}`.
    pub fn rel_path(&self, ext: &str) -> String {
        format!("{}/{}", self.namespace.dir_name(), self.file_name(ext))
    }
}

/// Human-readable prefix: lowercase ASCII alphanumerics, other runs collapsed to `-`.
pub fn sanitize_fragment(text: &str) -> String {
    let mut out = String::with_capacity(FRAGMENT_MAX_CHARS);
    let mut pending_dash = false;
    for c in text.chars() {
        if out.len() >= FRAGMENT_MAX_CHARS {
            break;
        }
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        out.push_str("asset");
    }
    out
}

/// Leading 128 bits of SHA-256 over the key bytes, lowercase hex.
pub fn digest_hex(text: &str) -> String {
    let digest = sha2::Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(DIGEST_HEX_CHARS);
    for b in digest.iter().take(DIGEST_HEX_CHARS / 2) {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
