use serde::{Deserialize, Serialize};

use crate::foundation::error::{SceneError, SceneResult};

/// One parsed scene-script instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    /// Speak `phrase`; blocks the clock for the synthesized clip's real length.
    Voice { pan: f64, phrase: String },
    /// Play a generated effect for exactly `duration_secs`; blocks the clock.
    Sound {
        pan: f64,
        duration_secs: f64,
        description: String,
    },
    /// Start looping `description` from the current clock position. Non-blocking.
    BackgroundStart { pan: f64, description: String },
    /// Stop the loop started under `description`. Non-blocking.
    BackgroundStop { description: String },
    /// Advance the clock without producing audio.
    Wait { secs: f64 },
}

impl Command {
    /// Script keyword this command is written with.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Voice { .. } => "voice",
            Self::Sound { .. } => "sound",
            Self::BackgroundStart { .. } => "bgstart",
            Self::BackgroundStop { .. } => "bgstop",
            Self::Wait { .. } => "wait",
        }
    }

    /// Check numeric invariants: `pan` within `[-1, 1]`, sound durations `> 0`, waits `>= 0`.
    pub fn validate(&self, line: usize) -> SceneResult<()> {
        match self {
            Self::Voice { pan, .. } | Self::BackgroundStart { pan, .. } => validate_pan(*pan, line),
            Self::Sound {
                pan, duration_secs, ..
            } => {
                validate_pan(*pan, line)?;
                if !duration_secs.is_finite() || *duration_secs <= 0.0 {
                    return Err(SceneError::InvalidDuration {
                        line,
                        value: *duration_secs,
                    });
                }
                Ok(())
            }
            Self::BackgroundStop { .. } => Ok(()),
            Self::Wait { secs } => {
                if !secs.is_finite() || *secs < 0.0 {
                    return Err(SceneError::InvalidDuration { line, value: *secs });
                }
                Ok(())
            }
        }
    }
}

fn validate_pan(pan: f64, line: usize) -> SceneResult<()> {
    if !pan.is_finite() || !(-1.0..=1.0).contains(&pan) {
        return Err(SceneError::InvalidPan { line, value: pan });
    }
    Ok(())
}

/// A command together with the 1-based script line it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptLine {
    pub line: usize,
    pub command: Command,
}

impl ScriptLine {
    pub fn new(line: usize, command: Command) -> Self {
        Self { line, command }
    }
}
