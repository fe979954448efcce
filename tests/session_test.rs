//! Session lifecycle tests through the public API
//!
//! A scripted source stands in for the microphone so tick outcomes, hold
//! expiry and state resets can be driven on a hand-stepped clock.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::{Duration, Instant};

use voice_hud::analysis::SpectrumAnalyzer;
use voice_hud::engine::{
    start_session_with_clock, DetectionLoop, LoopState, ManualClock, TickOutcome, TimeSource,
};
use voice_hud::{AppConfig, AudioSource, DetectionError, SourceFrame};

const SAMPLE_RATE: u32 = 44100;

enum Segment {
    Tone(f64),
    Silence,
    NotReady,
}

struct ScriptedMic {
    script: VecDeque<Segment>,
    analyzer: SpectrumAnalyzer,
    frame_size: usize,
    phase: usize,
}

impl ScriptedMic {
    fn new(config: &AppConfig, script: Vec<Segment>) -> Self {
        Self {
            script: script.into(),
            analyzer: SpectrumAnalyzer::new(&config.spectrum),
            frame_size: config.spectrum.fft_size,
            phase: 0,
        }
    }
}

impl AudioSource for ScriptedMic {
    fn is_active(&self) -> bool {
        !self.script.is_empty()
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn read_frame(&mut self) -> Option<SourceFrame> {
        let samples: Vec<f32> = match self.script.pop_front()? {
            Segment::NotReady => return None,
            Segment::Silence => vec![0.0; self.frame_size],
            Segment::Tone(hz) => (0..self.frame_size)
                .map(|i| {
                    let t = (self.phase + i) as f64 / SAMPLE_RATE as f64;
                    (0.3 * (2.0 * PI * hz * t).sin()) as f32
                })
                .collect(),
        };
        self.phase += self.frame_size;
        let spectrum = self.analyzer.analyze(&samples);
        Some(SourceFrame::new(samples, spectrum.decibels, spectrum.bytes))
    }
}

fn emitted(outcome: TickOutcome) -> voice_hud::DetectionSnapshot {
    match outcome {
        TickOutcome::Emitted(snapshot) => snapshot,
        other => panic!("expected a snapshot, got {:?}", other),
    }
}

#[test]
fn loop_walks_through_voiced_hold_and_silence() {
    let config = AppConfig::default();
    let clock = ManualClock::new();
    let mut script = vec![Segment::NotReady];
    script.extend((0..5).map(|_| Segment::Tone(165.0)));
    script.extend((0..12).map(|_| Segment::Silence));
    // Keeps the source active after the last checked tick
    script.push(Segment::Silence);

    let mut detection = DetectionLoop::new(&config).unwrap();
    detection.start(ScriptedMic::new(&config, script)).unwrap();
    assert_eq!(detection.state(), LoopState::Active);

    assert_eq!(detection.tick(clock.now()).unwrap(), TickOutcome::Pending);

    let step = config.session.update_interval();
    let mut last_voiced_pitch = None;
    for _ in 0..5 {
        let snapshot = emitted(detection.tick(clock.now()).unwrap());
        assert!(snapshot.voiced);
        let pitch = snapshot.pitch.unwrap();
        assert!((pitch - 165.0).abs() < 10.0);
        last_voiced_pitch = snapshot.pitch;
        // Between two throttle windows nothing is emitted
        clock.advance(step / 2);
        assert_eq!(detection.tick(clock.now()).unwrap(), TickOutcome::Throttled);
        clock.advance(step - step / 2);
    }

    let hold_window = config.session.hold_window();
    let mut silent_since_last_voiced = step;
    for _ in 0..12 {
        let snapshot = emitted(detection.tick(clock.now()).unwrap());
        // The last voiced tick happened one step before the first silent one
        if silent_since_last_voiced <= hold_window {
            assert!(snapshot.voiced);
            assert_eq!(snapshot.pitch, last_voiced_pitch);
        } else {
            assert!(!snapshot.voiced);
            assert_eq!(snapshot.pitch, None);
            assert!(snapshot.formants.is_empty());
        }
        clock.advance(step);
        silent_since_last_voiced += step;
    }

    let latest = detection.latest_snapshot().unwrap();
    assert_eq!(latest.pitch_history.len(), 17);

    detection.stop().unwrap();
    assert_eq!(detection.state(), LoopState::Idle);
    assert!(detection.latest_snapshot().is_none());
    assert_eq!(detection.tick(clock.now()), Err(DetectionError::NotRunning));
}

#[test]
fn history_never_exceeds_configured_length() {
    let mut config = AppConfig::default();
    config.session.pitch_history_length = 8;
    config.session.update_interval_ms = 0;
    let script: Vec<Segment> = (0..40)
        .map(|i| if i % 4 == 0 { Segment::Silence } else { Segment::Tone(220.0) })
        .collect();

    let mut detection = DetectionLoop::new(&config).unwrap();
    detection.start(ScriptedMic::new(&config, script)).unwrap();
    let clock = ManualClock::new();
    loop {
        match detection.tick(clock.now()).unwrap() {
            TickOutcome::Emitted(snapshot) => assert!(snapshot.pitch_history.len() <= 8),
            TickOutcome::SourceInactive => break,
            TickOutcome::Pending | TickOutcome::Throttled => {}
        }
        clock.advance(Duration::from_millis(10));
    }
}

#[test]
fn session_handle_streams_until_source_ends() {
    let mut config = AppConfig::default();
    config.session.update_interval_ms = 0;
    config.session.tick_poll_interval_ms = 1;
    let script: Vec<Segment> = (0..30).map(|_| Segment::Tone(196.0)).collect();
    let source = ScriptedMic::new(&config, script);

    let clock: Arc<dyn TimeSource> = Arc::new(ManualClock::new());
    let handle = start_session_with_clock(source, config, clock).unwrap();
    let mut rx = handle.subscribe();

    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.is_running() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!handle.is_running(), "worker should exit once the script ends");

    let latest = handle.poll_snapshot().unwrap().expect("at least one snapshot");
    assert!(latest.voiced);
    while let Ok(snapshot) = rx.try_recv() {
        assert!(snapshot.pitch.is_some());
    }
    handle.stop().unwrap();
}

#[test]
fn wrong_frame_size_source_is_rejected() {
    let config = AppConfig::default();
    let mut small = config.clone();
    small.spectrum.fft_size = 1024;
    let source = ScriptedMic::new(&small, vec![Segment::Silence]);

    let mut detection = DetectionLoop::new(&config).unwrap();
    assert_eq!(
        detection.start(source).err(),
        Some(DetectionError::FrameLengthMismatch {
            expected: 2048,
            actual: 1024
        })
    );
}
