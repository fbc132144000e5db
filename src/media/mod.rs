//! Media inspection.

/// Audio duration probing.
pub mod probe;

pub use probe::{DurationProbe, FfprobeDuration};
