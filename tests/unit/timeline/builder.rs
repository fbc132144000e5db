use super::*;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "scenemix_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

/// Writes `secs=<n>` so the fake probe can read the length back.
struct Fakes {
    loop_secs: f64,
    /// Overrides what the probe reports for every file.
    probed_secs: Option<f64>,
    speech_calls: AtomicUsize,
    sound_calls: AtomicUsize,
    probe_calls: Mutex<Vec<PathBuf>>,
    fail_sound: Option<&'static str>,
}

impl Fakes {
    fn new(loop_secs: f64) -> Self {
        Self {
            loop_secs,
            probed_secs: None,
            speech_calls: AtomicUsize::new(0),
            sound_calls: AtomicUsize::new(0),
            probe_calls: Mutex::new(Vec::new()),
            fail_sound: None,
        }
    }

    fn collab(&self) -> Collaborators<'_> {
        Collaborators {
            speech: self,
            sound: self,
            probe: self,
        }
    }
}

impl SpeechSynthesizer for Fakes {
    fn synthesize_speech(&self, phrase: &str, _cancel: &CancelToken) -> SceneResult<Vec<u8>> {
        self.speech_calls.fetch_add(1, Ordering::SeqCst);
        let secs = 0.5 * phrase.split_whitespace().count() as f64;
        Ok(format!("secs={secs}").into_bytes())
    }
}

impl SoundSynthesizer for Fakes {
    fn synthesize_sound(
        &self,
        description: &str,
        hint: Option<f64>,
        _cancel: &CancelToken,
    ) -> SceneResult<Vec<u8>> {
        self.sound_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sound == Some(description) {
            return Err(SceneError::Other(anyhow::anyhow!("provider said no")));
        }
        let secs = hint.unwrap_or(self.loop_secs);
        Ok(format!("secs={secs}").into_bytes())
    }
}

impl DurationProbe for Fakes {
    fn duration_secs(&self, path: &Path, _cancel: &CancelToken) -> SceneResult<f64> {
        self.probe_calls.lock().unwrap().push(path.to_path_buf());
        if let Some(secs) = self.probed_secs {
            return Ok(secs);
        }
        let text = std::fs::read_to_string(path).map_err(|e| SceneError::probe(path, e.to_string()))?;
        text.trim_start_matches("secs=")
            .parse::<f64>()
            .map_err(|e| SceneError::probe(path, e.to_string()))
    }
}

fn lines(script: &str) -> Vec<ScriptLine> {
    crate::script::parse_script(script).unwrap()
}

#[test]
fn voice_advances_clock_by_probed_length() {
    let tmp = temp_dir("builder_voice");
    let cache = AssetCache::new(&tmp, "opus");
    let fakes = Fakes::new(2.0);
    let builder = TimelineBuilder::new(&cache, fakes.collab(), CancelToken::new());

    let tl = builder.build(&lines("voice -1 one two\nvoice 1 three")).unwrap();
    assert_eq!(tl.segments.len(), 2);
    assert_eq!(tl.segments[0].start_secs, 0.0);
    assert_eq!(tl.segments[0].duration_secs, 1.0);
    assert_eq!(tl.segments[0].pan, -1.0);
    assert_eq!(tl.segments[1].start_secs, 1.0);
    assert_eq!(tl.segments[1].duration_secs, 0.5);
    assert_eq!(tl.total_duration_secs, 1.5);
    tl.validate().unwrap();

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn sound_uses_the_scripted_duration() {
    let tmp = temp_dir("builder_sound");
    let cache = AssetCache::new(&tmp, "opus");
    let fakes = Fakes::new(2.0);
    let builder = TimelineBuilder::new(&cache, fakes.collab(), CancelToken::new());

    let tl = builder.build(&lines("sound 0.5 1.25 door slam\nwait 1")).unwrap();
    assert_eq!(tl.segments.len(), 1);
    assert_eq!(tl.segments[0].duration_secs, 1.25);
    assert_eq!(tl.total_duration_secs, 2.25);
    // Sounds never need probing.
    assert!(fakes.probe_calls.lock().unwrap().is_empty());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn background_loop_is_probed_once_per_source() {
    let tmp = temp_dir("builder_loop_memo");
    let cache = AssetCache::new(&tmp, "opus");
    let fakes = Fakes::new(2.0);
    let builder = TimelineBuilder::new(&cache, fakes.collab(), CancelToken::new());

    let script = "bgstart 0 rain\nwait 3\nbgstop rain\nbgstart 0 rain\nwait 3\nbgstop rain";
    let tl = builder.build(&lines(script)).unwrap();
    assert_eq!(fakes.probe_calls.lock().unwrap().len(), 1);
    assert_eq!(fakes.sound_calls.load(Ordering::SeqCst), 1);
    let starts: Vec<f64> = tl.segments.iter().map(|s| s.start_secs).collect();
    assert_eq!(starts, vec![0.0, 2.0, 3.0, 5.0]);
    assert_eq!(tl.total_duration_secs, 6.0);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn zero_length_background_span_places_nothing() {
    let tmp = temp_dir("builder_zero_span");
    let cache = AssetCache::new(&tmp, "opus");
    let fakes = Fakes::new(2.0);
    let builder = TimelineBuilder::new(&cache, fakes.collab(), CancelToken::new());

    let tl = builder.build(&lines("bgstart 0 hum\nbgstop hum")).unwrap();
    assert!(tl.segments.is_empty());
    assert_eq!(tl.total_duration_secs, 0.0);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn structure_errors_come_before_any_generation() {
    let tmp = temp_dir("builder_structure");
    let cache = AssetCache::new(&tmp, "opus");
    let fakes = Fakes::new(2.0);
    let builder = TimelineBuilder::new(&cache, fakes.collab(), CancelToken::new()).with_jobs(4);

    let err = builder
        .build(&lines("voice 0 hi\nbgstart 0 x\nbgstart 0 x"))
        .unwrap_err();
    assert!(matches!(
        err,
        SceneError::DuplicateBackgroundTrack { line: 3, .. }
    ));
    assert_eq!(fakes.speech_calls.load(Ordering::SeqCst), 0);
    assert_eq!(fakes.sound_calls.load(Ordering::SeqCst), 0);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn prefetch_generates_each_key_once() {
    let tmp = temp_dir("builder_prefetch");
    let cache = AssetCache::new(&tmp, "opus");
    let fakes = Fakes::new(2.0);
    let builder = TimelineBuilder::new(&cache, fakes.collab(), CancelToken::new()).with_jobs(4);

    let script = "voice 0 a\nvoice 0 b\nvoice 0 a\nsound 0 1 boom\nsound 0 1 boom\nbgstart 0 wind\nwait 1";
    let (tl, report) = builder.build_with_report(&lines(script)).unwrap();
    assert_eq!(fakes.speech_calls.load(Ordering::SeqCst), 2);
    assert_eq!(fakes.sound_calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.stats().generated, 4);
    assert_eq!(report.commands, 7);
    assert_eq!(report.implicit_flushes, 1);
    assert_eq!(report.segments, tl.segments.len());

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn generation_failure_names_the_line() {
    let tmp = temp_dir("builder_gen_fail");
    let cache = AssetCache::new(&tmp, "opus");
    let mut fakes = Fakes::new(2.0);
    fakes.fail_sound = Some("glass");
    for jobs in [1, 3] {
        let builder =
            TimelineBuilder::new(&cache, fakes.collab(), CancelToken::new()).with_jobs(jobs);
        let err = builder
            .build(&lines("wait 1\nsound 0 1 glass\nsound 0 1 wood"))
            .unwrap_err();
        match err {
            SceneError::GenerationFailed { line, key, message } => {
                assert_eq!(line, 2);
                assert_eq!(key, "sound:glass");
                assert!(message.contains("provider said no"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn cancelled_build_stops_immediately() {
    let tmp = temp_dir("builder_cancel");
    let cache = AssetCache::new(&tmp, "opus");
    let fakes = Fakes::new(2.0);
    let cancel = CancelToken::new();
    cancel.cancel();
    let builder = TimelineBuilder::new(&cache, fakes.collab(), cancel);

    let err = builder.build(&lines("voice 0 hi")).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.line(), Some(1));
    assert_eq!(fakes.speech_calls.load(Ordering::SeqCst), 0);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn vanishingly_short_loop_fails_at_the_stop_line() {
    let tmp = temp_dir("builder_tiny_loop");
    let cache = AssetCache::new(&tmp, "opus");
    let mut fakes = Fakes::new(2.0);
    fakes.probed_secs = Some(1e-300);
    let builder = TimelineBuilder::new(&cache, fakes.collab(), CancelToken::new());

    let err = builder
        .build(&lines("bgstart 0 buzz\nwait 5\nbgstop buzz"))
        .unwrap_err();
    assert_eq!(err.line(), Some(3));
    match err {
        SceneError::AtLine { source, .. } => {
            assert!(matches!(*source, SceneError::InvalidLoopDuration { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn every_built_timeline_passes_validation() {
    let tmp = temp_dir("builder_validates");
    let cache = AssetCache::new(&tmp, "opus");
    let fakes = Fakes::new(0.7);
    let builder = TimelineBuilder::new(&cache, fakes.collab(), CancelToken::new());

    for script in [
        "bgstart 0 hum\nwait 0.1\nvoice 0 a b c\nwait 2.35\nsound 0 0.3 tick\nbgstop hum",
        "bgstart 1 hum\nbgstart -1 rain\nwait 0.30000000000000004\nbgstop rain",
        "voice 0 x\nbgstart 0 hum",
    ] {
        let tl = builder.build(&lines(script)).unwrap();
        tl.validate().unwrap();
        for seg in &tl.segments {
            assert!(seg.end_secs() <= tl.total_duration_secs + TILE_EPSILON_SECS);
        }
    }

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn validate_reports_the_offending_segment() {
    let tl = Timeline {
        total_duration_secs: 2.0,
        segments: vec![
            PlacedSegment {
                source_path: PathBuf::from("ok.opus"),
                start_secs: 0.0,
                duration_secs: 2.0,
                pan: 0.0,
            },
            PlacedSegment {
                source_path: PathBuf::from("late.opus"),
                start_secs: 1.5,
                duration_secs: 1.0,
                pan: 0.0,
            },
        ],
    };
    let msg = tl.validate().unwrap_err().to_string();
    assert!(msg.contains("segment 1"), "{msg}");
    assert!(msg.contains("late.opus"), "{msg}");
}

#[test]
fn collect_requests_keeps_first_hint() {
    let reqs = collect_requests(&lines("bgstart 0 rain\nsound 0 3 rain\nvoice 0 rain\nbgstop rain"));
    assert_eq!(reqs.len(), 2);
    assert_eq!(reqs[0].key, AssetKey::sound("rain"));
    assert_eq!(reqs[0].hint, None);
    assert_eq!(reqs[1].key, AssetKey::voice("rain"));
    assert_eq!(reqs[1].line, 3);
}

#[test]
fn validate_rejects_segments_past_the_end() {
    let tl = Timeline {
        total_duration_secs: 1.0,
        segments: vec![PlacedSegment {
            source_path: PathBuf::from("a.opus"),
            start_secs: 0.5,
            duration_secs: 1.0,
            pan: 0.0,
        }],
    };
    assert!(tl.validate().is_err());
}
