//! Cross-cutting plumbing: errors, cancellation, external tools, atomic file writes.

pub(crate) mod atomic_file;
pub mod cancel;
pub mod error;
pub(crate) mod process;
