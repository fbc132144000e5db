use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::assets::{AssetCache, AssetKey, Namespace};
use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{SceneError, SceneResult};
use crate::media::probe::DurationProbe;
use crate::script::command::{Command, ScriptLine};
use crate::synth::{SoundSynthesizer, SpeechSynthesizer};
use crate::timeline::tiler::{TILE_EPSILON_SECS, tile_span};

/// One concrete clip instance in the final mix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedSegment {
    pub source_path: PathBuf,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub pan: f64,
}

impl PlacedSegment {
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

/// Finished placement of every clip, in insertion order (not sorted by start time).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub total_duration_secs: f64,
    pub segments: Vec<PlacedSegment>,
}

impl Timeline {
    /// Check that every segment starts at or after zero, is non-empty and ends within the program.
    pub fn validate(&self) -> SceneResult<()> {
        for (i, seg) in self.segments.iter().enumerate() {
            let starts_ok = seg.start_secs.is_finite() && seg.start_secs >= 0.0;
            let length_ok = seg.duration_secs.is_finite() && seg.duration_secs > 0.0;
            if !starts_ok
                || !length_ok
                || seg.end_secs() > self.total_duration_secs + TILE_EPSILON_SECS
            {
                return Err(SceneError::Other(anyhow::anyhow!(
                    "segment {i} ('{}') is outside the program: start {} duration {} total {}",
                    seg.source_path.display(),
                    seg.start_secs,
                    seg.duration_secs,
                    self.total_duration_secs
                )));
            }
        }
        Ok(())
    }
}

/// Counters describing one build, for logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub commands: usize,
    pub segments: usize,
    pub background_tracks: usize,
    pub implicit_flushes: usize,
}

/// External collaborators the builder calls. All are borrowed, never owned.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub speech: &'a dyn SpeechSynthesizer,
    pub sound: &'a dyn SoundSynthesizer,
    pub probe: &'a dyn DurationProbe,
}

/// A loop that has been started but not yet stopped.
#[derive(Clone, Debug)]
struct BackgroundTrack {
    description: String,
    pan: f64,
    source_path: PathBuf,
    activation_start_secs: f64,
    start_line: usize,
}

#[derive(Default)]
struct BuildState {
    clock_secs: f64,
    segments: Vec<PlacedSegment>,
    /// Live tracks in activation order; end-of-script flushes follow this order.
    live: Vec<BackgroundTrack>,
    loop_secs: HashMap<PathBuf, f64>,
    report: BuildReport,
}

#[derive(Clone, Debug)]
struct AssetRequest {
    key: AssetKey,
    hint: Option<f64>,
    line: usize,
}

/// Drives the command stream over a virtual clock and places every clip.
///
/// Command processing is strictly sequential. Asset generation for distinct keys may run ahead
/// of it on a worker pool (see [`TimelineBuilder::with_jobs`]).
pub struct TimelineBuilder<'a> {
    cache: &'a AssetCache,
    collab: Collaborators<'a>,
    cancel: CancelToken,
    jobs: usize,
}

impl<'a> TimelineBuilder<'a> {
    pub fn new(cache: &'a AssetCache, collab: Collaborators<'a>, cancel: CancelToken) -> Self {
        Self {
            cache,
            collab,
            cancel,
            jobs: 1,
        }
    }

    /// Number of workers used to prefetch assets. `1` disables prefetching.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn build(&self, lines: &[ScriptLine]) -> SceneResult<Timeline> {
        self.build_with_report(lines).map(|(timeline, _)| timeline)
    }

    #[tracing::instrument(skip_all, fields(commands = lines.len(), jobs = self.jobs))]
    pub fn build_with_report(&self, lines: &[ScriptLine]) -> SceneResult<(Timeline, BuildReport)> {
        check_structure(lines)?;
        if self.jobs > 1 {
            self.prefetch(lines)?;
        }

        let mut st = BuildState::default();
        for sl in lines {
            self.cancel
                .check("timeline build")
                .map_err(|e| e.at_line(sl.line))?;
            self.apply(&mut st, sl)?;
            st.report.commands += 1;
        }

        let leftover = std::mem::take(&mut st.live);
        for track in leftover {
            tracing::warn!(
                description = %track.description,
                line = track.start_line,
                "background track never stopped; flushing at end of script"
            );
            self.flush(&mut st, track, None)?;
            st.report.implicit_flushes += 1;
        }

        st.report.segments = st.segments.len();
        let timeline = Timeline {
            total_duration_secs: st.clock_secs,
            segments: st.segments,
        };
        timeline.validate()?;
        tracing::info!(
            total_secs = timeline.total_duration_secs,
            segments = st.report.segments,
            implicit_flushes = st.report.implicit_flushes,
            "timeline built"
        );
        Ok((timeline, st.report))
    }

    /// Materialize every distinct asset the script references, in parallel.
    ///
    /// On failure the error for the earliest script line is returned.
    pub fn prefetch(&self, lines: &[ScriptLine]) -> SceneResult<()> {
        let requests = collect_requests(lines);
        let pending: Vec<AssetRequest> = requests
            .into_iter()
            .filter(|r| self.cache.lookup(&r.key).is_none())
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        tracing::info!(pending = pending.len(), jobs = self.jobs, "prefetching assets");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build prefetch thread pool: {e}"))?;

        let results: Vec<SceneResult<PathBuf>> = pool.install(|| {
            pending
                .par_iter()
                .map(|r| self.materialize(&r.key, r.hint, r.line))
                .collect()
        });

        let mut first_err: Option<SceneError> = None;
        for res in results {
            if let Err(e) = res {
                let earlier = match (&first_err, e.line()) {
                    (None, _) => true,
                    (Some(prev), Some(l)) => prev.line().is_none_or(|p| l < p),
                    (Some(_), None) => false,
                };
                if earlier {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn apply(&self, st: &mut BuildState, sl: &ScriptLine) -> SceneResult<()> {
        let line = sl.line;
        match &sl.command {
            Command::Voice { pan, phrase } => {
                let key = AssetKey::voice(phrase.as_str());
                let path = self.materialize(&key, None, line)?;
                let duration_secs = self.probe(&path, line)?;
                st.segments.push(PlacedSegment {
                    source_path: path,
                    start_secs: st.clock_secs,
                    duration_secs,
                    pan: *pan,
                });
                st.clock_secs += duration_secs;
            }
            Command::Sound {
                pan,
                duration_secs,
                description,
            } => {
                if !duration_secs.is_finite() || *duration_secs <= 0.0 {
                    return Err(SceneError::InvalidDuration {
                        line,
                        value: *duration_secs,
                    });
                }
                let key = AssetKey::sound(description.as_str());
                let path = self.materialize(&key, Some(*duration_secs), line)?;
                st.segments.push(PlacedSegment {
                    source_path: path,
                    start_secs: st.clock_secs,
                    duration_secs: *duration_secs,
                    pan: *pan,
                });
                st.clock_secs += duration_secs;
            }
            Command::BackgroundStart { pan, description } => {
                if st.live.iter().any(|t| &t.description == description) {
                    return Err(SceneError::DuplicateBackgroundTrack {
                        line,
                        description: description.clone(),
                    });
                }
                let key = AssetKey::sound(description.as_str());
                let path = self.materialize(&key, None, line)?;
                st.live.push(BackgroundTrack {
                    description: description.clone(),
                    pan: *pan,
                    source_path: path,
                    activation_start_secs: st.clock_secs,
                    start_line: line,
                });
                st.report.background_tracks += 1;
            }
            Command::BackgroundStop { description } => {
                let Some(idx) = st.live.iter().position(|t| &t.description == description) else {
                    return Err(SceneError::UnknownBackgroundTrack {
                        line,
                        description: description.clone(),
                    });
                };
                let track = st.live.remove(idx);
                self.flush(st, track, Some(line))?;
            }
            Command::Wait { secs } => {
                if !secs.is_finite() || *secs < 0.0 {
                    return Err(SceneError::InvalidDuration { line, value: *secs });
                }
                st.clock_secs += secs;
            }
        }
        Ok(())
    }

    /// Tile a background track from its activation to the current clock.
    fn flush(
        &self,
        st: &mut BuildState,
        track: BackgroundTrack,
        stop_line: Option<usize>,
    ) -> SceneResult<()> {
        let line = stop_line.unwrap_or(track.start_line);
        let span_secs = st.clock_secs - track.activation_start_secs;
        if span_secs <= TILE_EPSILON_SECS {
            tracing::debug!(description = %track.description, "background track has an empty span");
            return Ok(());
        }

        let loop_secs = match st.loop_secs.get(&track.source_path) {
            Some(secs) => *secs,
            None => {
                let secs = self.probe(&track.source_path, line)?;
                st.loop_secs.insert(track.source_path.clone(), secs);
                secs
            }
        };

        let tiles = tile_span(loop_secs, track.activation_start_secs, span_secs)
            .map_err(|e| e.at_line(line))?;
        tracing::debug!(
            description = %track.description,
            loop_secs,
            span_secs,
            tiles = tiles.len(),
            "background track tiled"
        );
        st.segments
            .extend(tiles.into_iter().map(|(start_secs, duration_secs)| PlacedSegment {
                source_path: track.source_path.clone(),
                start_secs,
                duration_secs,
                pan: track.pan,
            }));
        Ok(())
    }

    fn materialize(&self, key: &AssetKey, hint: Option<f64>, line: usize) -> SceneResult<PathBuf> {
        let cancel = &self.cancel;
        let res = match key.namespace {
            Namespace::Voice => self.cache.ensure(key, hint, |text, _| {
                self.collab.speech.synthesize_speech(text, cancel)
            }),
            Namespace::Sound => self.cache.ensure(key, hint, |text, hint| {
                self.collab.sound.synthesize_sound(text, hint, cancel)
            }),
        };
        res.map_err(|e| generation_error(e, key, line))
    }

    fn probe(&self, path: &Path, line: usize) -> SceneResult<f64> {
        let secs = self
            .collab
            .probe
            .duration_secs(path, &self.cancel)
            .map_err(|e| e.at_line(line))?;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(
                SceneError::probe(path, format!("probe returned non-positive duration {secs}"))
                    .at_line(line),
            );
        }
        Ok(secs)
    }
}

fn generation_error(err: SceneError, key: &AssetKey, line: usize) -> SceneError {
    match err {
        e @ SceneError::GenerationFailed { .. } => e,
        e if e.is_cancelled() => e.at_line(line),
        e => SceneError::generation(
            line,
            format!("{}:{}", key.namespace, key.text),
            e.to_string(),
        ),
    }
}

/// Validate background start/stop pairing and numeric fields without touching any asset.
///
/// Runs before prefetching so script logic errors surface before any expensive generation.
fn check_structure(lines: &[ScriptLine]) -> SceneResult<()> {
    let mut live = HashSet::<&str>::new();
    for sl in lines {
        sl.command.validate(sl.line)?;
        match &sl.command {
            Command::BackgroundStart { description, .. } => {
                if !live.insert(description.as_str()) {
                    return Err(SceneError::DuplicateBackgroundTrack {
                        line: sl.line,
                        description: description.clone(),
                    });
                }
            }
            Command::BackgroundStop { description } => {
                if !live.remove(description.as_str()) {
                    return Err(SceneError::UnknownBackgroundTrack {
                        line: sl.line,
                        description: description.clone(),
                    });
                }
            }
            Command::Voice { .. } | Command::Sound { .. } | Command::Wait { .. } => {}
        }
    }
    Ok(())
}

/// Distinct asset requests in script order. The first occurrence of a key fixes its hint, which
/// matches what the sequential pass would generate.
fn collect_requests(lines: &[ScriptLine]) -> Vec<AssetRequest> {
    let mut seen = HashSet::<AssetKey>::new();
    let mut out = Vec::new();
    for sl in lines {
        let (key, hint) = match &sl.command {
            Command::Voice { phrase, .. } => (AssetKey::voice(phrase.as_str()), None),
            Command::Sound {
                duration_secs,
                description,
                ..
            } => (AssetKey::sound(description.as_str()), Some(*duration_secs)),
            Command::BackgroundStart { description, .. } => {
                (AssetKey::sound(description.as_str()), None)
            }
            Command::BackgroundStop { .. } | Command::Wait { .. } => continue,
        };
        if seen.insert(key.clone()) {
            out.push(AssetRequest {
                key,
                hint,
                line: sl.line,
            });
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/builder.rs"]
mod tests;
