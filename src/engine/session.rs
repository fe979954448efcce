// Detection loop - Idle/Active state machine around the detector
//
// The loop owns the attached source and the detector. Each `tick` call is
// one scheduling opportunity: it may be throttled, find no frame ready, or
// process the latest frame and emit a snapshot. Nothing here sleeps; the
// caller (the session worker, a test, an offline driver) owns the cadence.

use std::time::{Duration, Instant};

use super::detector::Detector;
use super::snapshot::DetectionSnapshot;
use crate::audio::AudioSource;
use crate::config::AppConfig;
use crate::error::DetectionError;

/// Lifecycle state of a loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Active,
}

/// Result of one scheduling opportunity
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A frame was processed
    Emitted(DetectionSnapshot),
    /// Less than the update interval since the last emitted snapshot
    Throttled,
    /// The source had no new frame yet
    Pending,
    /// The attached source stopped delivering audio
    SourceInactive,
}

struct Attached<S> {
    source: S,
    sample_rate: u32,
}

pub struct DetectionLoop<S: AudioSource> {
    detector: Detector,
    update_interval: Duration,
    attached: Option<Attached<S>>,
    last_emit_at: Option<Instant>,
    latest: Option<DetectionSnapshot>,
}

impl<S: AudioSource> DetectionLoop<S> {
    pub fn new(config: &AppConfig) -> Result<Self, DetectionError> {
        Ok(Self {
            detector: Detector::new(config)?,
            update_interval: config.session.update_interval(),
            attached: None,
            last_emit_at: None,
            latest: None,
        })
    }

    pub fn state(&self) -> LoopState {
        if self.attached.is_some() {
            LoopState::Active
        } else {
            LoopState::Idle
        }
    }

    /// Attach a source and start from a clean slate
    pub fn start(&mut self, source: S) -> Result<(), DetectionError> {
        if self.attached.is_some() {
            return Err(DetectionError::AlreadyRunning);
        }
        if source.frame_size() != self.detector.frame_size() {
            return Err(DetectionError::FrameLengthMismatch {
                expected: self.detector.frame_size(),
                actual: source.frame_size(),
            });
        }

        self.reset();
        let sample_rate = source.sample_rate();
        tracing::debug!(sample_rate, "[DetectionLoop] source attached");
        self.attached = Some(Attached {
            source,
            sample_rate,
        });
        Ok(())
    }

    /// Detach the source, clear all state and hand the source back
    pub fn stop(&mut self) -> Result<S, DetectionError> {
        let attached = self.attached.take().ok_or(DetectionError::NotRunning)?;
        self.reset();
        tracing::debug!("[DetectionLoop] source detached");
        Ok(attached.source)
    }

    /// Most recent emitted snapshot of the current session
    pub fn latest_snapshot(&self) -> Option<&DetectionSnapshot> {
        self.latest.as_ref()
    }

    /// Run one scheduling opportunity at `now`
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome, DetectionError> {
        let attached = self.attached.as_mut().ok_or(DetectionError::NotRunning)?;

        if !attached.source.is_active() {
            return Ok(TickOutcome::SourceInactive);
        }

        if let Some(last) = self.last_emit_at {
            if now.saturating_duration_since(last) < self.update_interval {
                tracing::trace!("[DetectionLoop] throttled");
                return Ok(TickOutcome::Throttled);
            }
        }

        let actual = attached.source.sample_rate();
        if actual != attached.sample_rate {
            return Err(DetectionError::SampleRateMismatch {
                expected: attached.sample_rate,
                actual,
            });
        }

        let frame = match attached.source.read_frame() {
            Some(frame) => frame,
            None => {
                tracing::trace!("[DetectionLoop] no frame ready");
                return Ok(TickOutcome::Pending);
            }
        };
        if frame.time_domain.is_empty() {
            tracing::trace!("[DetectionLoop] empty frame skipped");
            return Ok(TickOutcome::Pending);
        }

        let snapshot = self.detector.process(&frame, attached.sample_rate, now)?;
        self.last_emit_at = Some(now);
        self.latest = Some(snapshot.clone());
        Ok(TickOutcome::Emitted(snapshot))
    }

    fn reset(&mut self) {
        self.detector.reset();
        self.last_emit_at = None;
        self.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SourceFrame;
    use std::collections::VecDeque;
    use std::f64::consts::PI;

    const SAMPLE_RATE: u32 = 44100;
    const FRAME: usize = 2048;

    /// Source replaying a fixed script; `None` entries simulate "not ready"
    struct ScriptedSource {
        frames: VecDeque<Option<SourceFrame>>,
        sample_rate: u32,
        frame_size: usize,
        active: bool,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Option<SourceFrame>>) -> Self {
            Self {
                frames: frames.into(),
                sample_rate: SAMPLE_RATE,
                frame_size: FRAME,
                active: true,
            }
        }
    }

    impl AudioSource for ScriptedSource {
        fn is_active(&self) -> bool {
            self.active
        }

        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn frame_size(&self) -> usize {
            self.frame_size
        }

        fn read_frame(&mut self) -> Option<SourceFrame> {
            self.frames.pop_front().flatten()
        }
    }

    fn tone() -> SourceFrame {
        let samples: Vec<f32> = (0..FRAME)
            .map(|i| (0.4 * (2.0 * PI * 180.0 * i as f64 / SAMPLE_RATE as f64).sin()) as f32)
            .collect();
        SourceFrame::new(samples, vec![-60.0; FRAME / 2], vec![128; FRAME / 2])
    }

    fn silence() -> SourceFrame {
        SourceFrame::new(vec![0.0; FRAME], vec![-240.0; FRAME / 2], vec![0; FRAME / 2])
    }

    fn emitted(outcome: TickOutcome) -> DetectionSnapshot {
        match outcome {
            TickOutcome::Emitted(snapshot) => snapshot,
            other => panic!("expected a snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_lifecycle_errors() {
        let mut detection = DetectionLoop::<ScriptedSource>::new(&AppConfig::default()).unwrap();
        assert_eq!(detection.state(), LoopState::Idle);
        assert_eq!(
            detection.tick(Instant::now()),
            Err(DetectionError::NotRunning)
        );
        assert!(matches!(detection.stop(), Err(DetectionError::NotRunning)));

        detection.start(ScriptedSource::new(vec![])).unwrap();
        assert_eq!(detection.state(), LoopState::Active);
        assert_eq!(
            detection.start(ScriptedSource::new(vec![])),
            Err(DetectionError::AlreadyRunning)
        );

        detection.stop().unwrap();
        assert_eq!(detection.state(), LoopState::Idle);
    }

    #[test]
    fn test_mismatched_frame_size_is_rejected_on_start() {
        let mut detection = DetectionLoop::new(&AppConfig::default()).unwrap();
        let mut source = ScriptedSource::new(vec![]);
        source.frame_size = 1024;
        assert!(matches!(
            detection.start(source),
            Err(DetectionError::FrameLengthMismatch { .. })
        ));
        assert_eq!(detection.state(), LoopState::Idle);
    }

    #[test]
    fn test_pending_does_not_consume_throttle() {
        let mut detection = DetectionLoop::new(&AppConfig::default()).unwrap();
        detection
            .start(ScriptedSource::new(vec![None, Some(tone())]))
            .unwrap();
        let t0 = Instant::now();

        assert_eq!(detection.tick(t0).unwrap(), TickOutcome::Pending);
        let snapshot = emitted(detection.tick(t0).unwrap());
        assert!(snapshot.voiced);
        assert_eq!(detection.latest_snapshot(), Some(&snapshot));
    }

    #[test]
    fn test_empty_frame_is_skipped() {
        let empty = SourceFrame::new(vec![], vec![], vec![]);
        let mut detection = DetectionLoop::new(&AppConfig::default()).unwrap();
        detection
            .start(ScriptedSource::new(vec![Some(empty), Some(tone())]))
            .unwrap();
        let t0 = Instant::now();

        assert_eq!(detection.tick(t0).unwrap(), TickOutcome::Pending);
        assert!(detection.latest_snapshot().is_none());
        assert_eq!(detection.state(), LoopState::Active);

        // Same instant: the skipped frame left no throttle window behind
        let snapshot = emitted(detection.tick(t0).unwrap());
        assert!(snapshot.voiced);
        assert_eq!(snapshot.pitch_history.len(), 1);
    }

    #[test]
    fn test_throttle_interval() {
        let mut detection = DetectionLoop::new(&AppConfig::default()).unwrap();
        detection
            .start(ScriptedSource::new(vec![Some(tone()), Some(tone())]))
            .unwrap();
        let t0 = Instant::now();

        emitted(detection.tick(t0).unwrap());
        assert_eq!(
            detection.tick(t0 + Duration::from_millis(79)).unwrap(),
            TickOutcome::Throttled
        );
        emitted(detection.tick(t0 + Duration::from_millis(80)).unwrap());
    }

    #[test]
    fn test_hold_expiry_over_ticks() {
        let mut frames = vec![Some(tone())];
        frames.extend((0..10).map(|_| Some(silence())));
        let mut detection = DetectionLoop::new(&AppConfig::default()).unwrap();
        detection.start(ScriptedSource::new(frames)).unwrap();

        let t0 = Instant::now();
        let voiced = emitted(detection.tick(t0).unwrap());
        assert!(voiced.voiced);

        let mut last = voiced.clone();
        for i in 1..=10u64 {
            let snapshot = emitted(detection.tick(t0 + Duration::from_millis(80 * i)).unwrap());
            if 80 * i <= 600 {
                assert!(snapshot.voiced, "tick {} should still hold", i);
                assert_eq!(snapshot.pitch, voiced.pitch);
            } else {
                assert!(!snapshot.voiced, "tick {} should be silent", i);
                assert_eq!(snapshot.pitch, None);
                assert!(snapshot.formants.is_empty());
            }
            last = snapshot;
        }
        assert_eq!(last.pitch_history.len(), 11);
        assert_eq!(last.ghost_formants, voiced.ghost_formants);
    }

    #[test]
    fn test_inactive_source() {
        let mut detection = DetectionLoop::new(&AppConfig::default()).unwrap();
        let mut source = ScriptedSource::new(vec![Some(tone())]);
        source.active = false;
        detection.start(source).unwrap();
        assert_eq!(
            detection.tick(Instant::now()).unwrap(),
            TickOutcome::SourceInactive
        );
    }

    #[test]
    fn test_wrong_frame_length_is_an_error() {
        let mut detection = DetectionLoop::new(&AppConfig::default()).unwrap();
        let bad = SourceFrame::new(vec![0.0; 64], vec![-60.0; FRAME / 2], vec![]);
        detection.start(ScriptedSource::new(vec![Some(bad)])).unwrap();
        assert!(matches!(
            detection.tick(Instant::now()),
            Err(DetectionError::FrameLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_sample_rate_change_is_an_error() {
        let mut detection = DetectionLoop::new(&AppConfig::default()).unwrap();
        detection
            .start(ScriptedSource::new(vec![Some(tone())]))
            .unwrap();
        if let Some(attached) = detection.attached.as_mut() {
            attached.source.sample_rate = 48000;
        }
        assert_eq!(
            detection.tick(Instant::now()),
            Err(DetectionError::SampleRateMismatch {
                expected: 44100,
                actual: 48000
            })
        );
    }

    #[test]
    fn test_restart_clears_state() {
        let mut detection = DetectionLoop::new(&AppConfig::default()).unwrap();
        detection
            .start(ScriptedSource::new(vec![Some(tone())]))
            .unwrap();
        let t0 = Instant::now();
        emitted(detection.tick(t0).unwrap());
        detection.stop().unwrap();
        assert!(detection.latest_snapshot().is_none());

        detection
            .start(ScriptedSource::new(vec![Some(silence())]))
            .unwrap();
        // No throttle carried over, no hold carried over, ghost cleared
        let snapshot = emitted(detection.tick(t0 + Duration::from_millis(1)).unwrap());
        assert!(!snapshot.voiced);
        assert!(snapshot.ghost_formants.is_empty());
        assert_eq!(snapshot.pitch_history, vec![None]);
    }
}
