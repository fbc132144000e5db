use crate::foundation::error::{SceneError, SceneResult};

/// Remainders at or below this many seconds are floating-point noise, not a trimmed tile.
pub const TILE_EPSILON_SECS: f64 = 1e-6;

/// Upper bound on loop instances for one span. A loop that would need more is unusable.
pub const MAX_TILES: u64 = 1_000_000;

/// One loop instance relative to the start of its span.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tile {
    pub offset_secs: f64,
    pub duration_secs: f64,
}

/// Cover `[0, span_secs)` with back-to-back copies of a `loop_secs` clip, trimming the last one.
///
/// Placements are contiguous, non-overlapping and start at zero; their durations sum to
/// `span_secs`. A non-positive span yields no tiles. A non-positive loop length, or one so short
/// that covering the span would take more than [`MAX_TILES`] copies, is an error.
pub fn tile(loop_secs: f64, span_secs: f64) -> SceneResult<Vec<Tile>> {
    if !loop_secs.is_finite() || loop_secs <= 0.0 {
        return Err(SceneError::InvalidLoopDuration { value: loop_secs });
    }
    if !span_secs.is_finite() || span_secs <= TILE_EPSILON_SECS {
        return Ok(Vec::new());
    }

    let ratio = (span_secs / loop_secs).floor();
    if !ratio.is_finite() || ratio >= MAX_TILES as f64 {
        return Err(SceneError::InvalidLoopDuration { value: loop_secs });
    }
    let mut full = ratio as u64;
    // Spans like 0.3 / 0.1 land a hair under an integer; absorb that into the full count.
    if span_secs - ((full + 1) as f64) * loop_secs > -TILE_EPSILON_SECS {
        full += 1;
    }

    let mut tiles = Vec::with_capacity(full as usize + 1);
    for i in 0..full {
        tiles.push(Tile {
            offset_secs: i as f64 * loop_secs,
            duration_secs: loop_secs,
        });
    }

    let covered = full as f64 * loop_secs;
    let remainder = span_secs - covered;
    if remainder > TILE_EPSILON_SECS {
        tiles.push(Tile {
            offset_secs: covered,
            duration_secs: remainder,
        });
    }
    Ok(tiles)
}

/// [`tile`] for a span starting at `span_start_secs`, returning absolute `(start, duration)`.
pub fn tile_span(
    loop_secs: f64,
    span_start_secs: f64,
    span_secs: f64,
) -> SceneResult<Vec<(f64, f64)>> {
    Ok(tile(loop_secs, span_secs)?
        .into_iter()
        .map(|t| (span_start_secs + t.offset_secs, t.duration_secs))
        .collect())
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/tiler.rs"]
mod tests;
