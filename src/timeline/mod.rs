//! Virtual-clock placement of script commands.

/// Command-stream state machine producing a [`Timeline`].
pub mod builder;
/// Loop tiling arithmetic for background tracks.
pub mod tiler;

pub use builder::{BuildReport, Collaborators, PlacedSegment, Timeline, TimelineBuilder};
pub use tiler::{Tile, tile, tile_span};
