// Voicing classifier and noise floor tracking
//
// A frame counts as voiced when its RMS clears an adaptive threshold.
// The threshold follows a slow EMA of the energy seen on unvoiced frames,
// bounded between a floor and a ceiling derived from the base threshold so
// it can never become too permissive or too strict.

use crate::analysis::signal::root_mean_square;
use crate::config::VoicingConfig;

/// Decide whether a frame carries enough energy to be voiced
///
/// When `whisper_boost_factor > 1` and the frame RMS is at or below
/// `whisper_boost_max_rms`, the RMS is scaled by the boost before the
/// comparison. Louder frames are compared unboosted.
pub fn is_voiced(
    frame: &[f32],
    threshold: f64,
    whisper_boost_factor: f64,
    whisper_boost_max_rms: f64,
) -> bool {
    let rms = root_mean_square(frame);
    boosted_rms(rms, whisper_boost_factor, whisper_boost_max_rms) > threshold
}

fn boosted_rms(rms: f64, whisper_boost_factor: f64, whisper_boost_max_rms: f64) -> f64 {
    if whisper_boost_factor > 1.0 && rms <= whisper_boost_max_rms {
        rms * whisper_boost_factor
    } else {
        rms
    }
}

/// Bounded voiced threshold derived from a noise floor estimate
///
/// NaN, infinite and negative noise floors are treated as 0, which yields
/// the floor value.
pub fn adaptive_threshold(noise_floor: f64, base_threshold: f64, config: &VoicingConfig) -> f64 {
    let noise_floor = sanitize_noise_floor(noise_floor);
    let floor = base_threshold * config.voice_threshold_floor_factor;
    let ceiling = base_threshold * config.voice_threshold_ceiling_factor;
    let scaled = noise_floor * config.voice_threshold_noise_multiplier;
    scaled.max(floor).min(ceiling)
}

fn sanitize_noise_floor(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Running estimate of ambient energy
///
/// Only fed from unvoiced frames so speech does not inflate the estimate.
#[derive(Debug, Clone)]
pub struct NoiseFloorTracker {
    noise_floor: f64,
    initial: f64,
    alpha: f64,
}

impl NoiseFloorTracker {
    pub fn new(config: &VoicingConfig) -> Self {
        let initial = config.initial_noise_floor();
        Self {
            noise_floor: initial,
            initial,
            alpha: config.noise_floor_ema_alpha,
        }
    }

    pub fn noise_floor(&self) -> f64 {
        self.noise_floor
    }

    /// Blend an unvoiced frame's RMS into the estimate
    pub fn observe_unvoiced(&mut self, rms: f64) {
        let rms = sanitize_noise_floor(rms);
        self.noise_floor = self.noise_floor * self.alpha + rms * (1.0 - self.alpha);
        self.noise_floor = sanitize_noise_floor(self.noise_floor);
    }

    pub fn reset(&mut self) {
        self.noise_floor = self.initial;
    }
}

/// Voicing gate combining the tracker with the configured thresholds
#[derive(Debug, Clone)]
pub struct VoicingClassifier {
    config: VoicingConfig,
    tracker: NoiseFloorTracker,
}

/// Outcome of classifying one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoicingDecision {
    pub rms: f64,
    pub threshold: f64,
    pub voiced: bool,
}

impl VoicingClassifier {
    pub fn new(config: VoicingConfig) -> Self {
        let tracker = NoiseFloorTracker::new(&config);
        Self { config, tracker }
    }

    pub fn noise_floor(&self) -> f64 {
        self.tracker.noise_floor()
    }

    pub fn current_threshold(&self) -> f64 {
        adaptive_threshold(
            self.tracker.noise_floor(),
            self.config.voice_threshold_base,
            &self.config,
        )
    }

    /// Classify without touching the noise floor
    pub fn classify(&self, frame: &[f32]) -> VoicingDecision {
        let rms = root_mean_square(frame);
        let threshold = self.current_threshold();
        let voiced = boosted_rms(
            rms,
            self.config.whisper_boost_factor,
            self.config.whisper_boost_max_rms,
        ) > threshold;
        VoicingDecision {
            rms,
            threshold,
            voiced,
        }
    }

    pub fn observe_unvoiced(&mut self, rms: f64) {
        self.tracker.observe_unvoiced(rms);
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
    }
}
