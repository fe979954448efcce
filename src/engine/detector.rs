// Detector - the per-tick pipeline over one frame
//
// classify voicing -> estimate pitch and formants (voiced only) -> smooth,
// hold and record history. All session state lives in this struct and is
// mutated through `&mut self`, so independent sessions never share it.

use std::time::{Duration, Instant};

use super::history::PitchHistory;
use super::smoothing::{HoldState, SmoothingState};
use super::snapshot::DetectionSnapshot;
use crate::analysis::{FormantDetector, Formants, VoicingClassifier, YinDetector};
use crate::audio::SourceFrame;
use crate::config::AppConfig;
use crate::error::DetectionError;

pub struct Detector {
    frame_size: usize,
    hold_window: Duration,
    voicing: VoicingClassifier,
    pitch: YinDetector,
    formants: FormantDetector,
    smoothing: SmoothingState,
    history: PitchHistory,
    origin: Option<Instant>,
}

impl Detector {
    pub fn new(config: &AppConfig) -> Result<Self, DetectionError> {
        config.validate()?;
        let session = &config.session;
        Ok(Self {
            frame_size: config.spectrum.fft_size,
            hold_window: session.hold_window(),
            voicing: VoicingClassifier::new(config.voicing.clone()),
            pitch: YinDetector::from_config(&config.pitch),
            formants: FormantDetector::new(config.formants.clone()),
            smoothing: SmoothingState::new(session.pitch_smoothing, session.formant_smoothing),
            history: PitchHistory::new(session.pitch_history_length),
            origin: None,
        })
    }

    /// Samples expected per time-domain frame
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Return every piece of session state to its initial value
    pub fn reset(&mut self) {
        self.voicing.reset();
        self.smoothing.reset();
        self.history.clear();
        self.origin = None;
    }

    /// Run one tick over `frame`
    ///
    /// Frames of the wrong length are a caller bug and are rejected without
    /// touching any state.
    pub fn process(
        &mut self,
        frame: &SourceFrame,
        sample_rate: u32,
        now: Instant,
    ) -> Result<DetectionSnapshot, DetectionError> {
        let samples = frame.time_domain.samples();
        if samples.len() != self.frame_size {
            return Err(DetectionError::FrameLengthMismatch {
                expected: self.frame_size,
                actual: samples.len(),
            });
        }
        let bins = self.frame_size / 2;
        if frame.spectrum.len() != bins {
            return Err(DetectionError::SpectrumLengthMismatch {
                expected: bins,
                actual: frame.spectrum.len(),
            });
        }

        let origin = *self.origin.get_or_insert(now);

        let decision = self.voicing.classify(samples);
        let detected_pitch = if decision.voiced {
            self.pitch.detect(samples, sample_rate)
        } else {
            None
        };

        // A voiced gate without a pitch counts as unvoiced
        match detected_pitch {
            Some(pitch) => {
                let formants =
                    self.formants
                        .detect(frame.spectrum.decibels(), sample_rate, self.frame_size);
                self.smoothing
                    .record_voiced(pitch, &formants, &frame.spectrum_bytes, now);
            }
            None => self.voicing.observe_unvoiced(decision.rms),
        }

        let hold_state = self
            .smoothing
            .hold_state(detected_pitch.is_some(), now, self.hold_window);

        let (pitch, formants, spectrum_bytes) = match hold_state {
            HoldState::Voiced => (
                self.smoothing.pitch(),
                self.smoothing.formants(),
                frame.spectrum_bytes.clone(),
            ),
            HoldState::Holding => {
                let held = self.smoothing.held();
                (held.pitch, held.formants, held.spectrum_bytes.clone())
            }
            HoldState::Silent => (None, Formants::EMPTY, frame.spectrum_bytes.clone()),
        };

        self.history.push(pitch);

        Ok(DetectionSnapshot {
            timestamp_ms: now.saturating_duration_since(origin).as_millis() as u64,
            pitch,
            rms: decision.rms,
            voiced: hold_state.is_voiced(),
            hold_state,
            formants,
            ghost_formants: self.smoothing.ghost_formants(),
            pitch_history: self.history.to_vec(),
            spectrum_bytes,
            threshold: decision.threshold,
            noise_floor: self.voicing.noise_floor(),
        })
    }
}
