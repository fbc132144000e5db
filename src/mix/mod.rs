//! Mix plan compilation.

/// Immutable mix instructions and the ffmpeg graph they translate to.
pub mod plan;

pub use plan::{MixPlan, PanGains, compile, pan_gains};
