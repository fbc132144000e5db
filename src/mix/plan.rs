use std::fmt::Write as _;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::timeline::builder::{PlacedSegment, Timeline};

/// Engine-agnostic mix instructions for one program.
///
/// A plan consists of:
/// - the program length (`total_duration_secs`), which is also the length of the silent bed
/// - the placed inputs, in timeline insertion order
///
/// Every input is delayed to `start_secs`, trimmed to `duration_secs`, panned with
/// [`pan_gains`], and summed with the bed at a constant `1 / (inputs + 1)` weight so the sum
/// cannot clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MixPlan {
    /// Length of the rendered program in seconds.
    pub total_duration_secs: f64,
    /// Placed inputs, in timeline insertion order.
    pub inputs: Vec<PlacedSegment>,
}

/// Per-channel gains for a pan position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanGains {
    pub left: f64,
    pub right: f64,
}

/// `left = 1 - max(0, p)`, `right = 1 - max(0, -p)`. `p` is clamped to `[-1, 1]`.
pub fn pan_gains(pan: f64) -> PanGains {
    let p = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
    PanGains {
        left: 1.0 - p.max(0.0),
        right: 1.0 - (-p).max(0.0),
    }
}

/// Freeze a finished timeline into a mix plan.
pub fn compile(timeline: Timeline) -> MixPlan {
    MixPlan {
        total_duration_secs: timeline.total_duration_secs,
        inputs: timeline.segments,
    }
}

impl From<Timeline> for MixPlan {
    fn from(timeline: Timeline) -> Self {
        compile(timeline)
    }
}

impl MixPlan {
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Source files in input order; index `i` here is ffmpeg input `i + 1`.
    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.inputs.iter().map(|s| s.source_path.clone()).collect()
    }

    /// Gain applied to every summed stream, including the bed.
    pub fn mix_weight(&self) -> f64 {
        1.0 / (self.inputs.len() as f64 + 1.0)
    }

    /// ffmpeg `lavfi` source for the silent bed (input 0).
    pub fn bed_source(&self, sample_rate: u32) -> String {
        format!(
            "anullsrc=channel_layout=stereo:sample_rate={sample_rate}:d={}",
            fmt_secs(self.total_duration_secs)
        )
    }

    /// ffmpeg `filter_complex` graph producing the `[out]` stream.
    ///
    /// Input 0 is the bed from [`MixPlan::bed_source`]; segment `i` is input `i + 1`.
    pub fn filter_graph(&self, sample_rate: u32) -> String {
        if self.inputs.is_empty() {
            return "[0:a]anull[out]".to_string();
        }

        let mut g = String::new();
        for (i, seg) in self.inputs.iter().enumerate() {
            let gains = pan_gains(seg.pan);
            let delay_samples = (seg.start_secs.max(0.0) * f64::from(sample_rate)).round() as u64;
            let _ = write!(
                g,
                "[{input}:a]aformat=sample_fmts=fltp:sample_rates={sample_rate}:channel_layouts=stereo,\
                 atrim=end={dur},asetpts=PTS-STARTPTS,\
                 pan=stereo|c0={l}*c0|c1={r}*c1,\
                 adelay=delays={delay_samples}S:all=1[s{i}];",
                input = i + 1,
                dur = fmt_secs(seg.duration_secs),
                l = fmt_gain(gains.left),
                r = fmt_gain(gains.right),
            );
        }

        g.push_str("[0:a]");
        for i in 0..self.inputs.len() {
            let _ = write!(g, "[s{i}]");
        }
        let _ = write!(
            g,
            "amix=inputs={n}:duration=first:dropout_transition=0:normalize=0,volume={w}[out]",
            n = self.inputs.len() + 1,
            w = fmt_gain(self.mix_weight()),
        );
        g
    }
}

fn fmt_secs(secs: f64) -> String {
    format!("{secs:.6}")
}

fn fmt_gain(g: f64) -> String {
    format!("{g:.6}")
}

#[cfg(test)]
#[path = "../../tests/unit/mix/plan.rs"]
mod tests;
