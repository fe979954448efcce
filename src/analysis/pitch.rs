// Pitch module - YIN fundamental frequency estimation
//
// Implements the four core steps of "YIN, a fundamental frequency estimator
// for speech and music" (de Cheveigné & Kawahara, 2002):
//
// 1. Difference function d(τ) over the first half of the frame
// 2. Cumulative mean normalized difference d'(τ)
// 3. Absolute threshold search, walking forward to the local minimum
// 4. Parabolic interpolation around the chosen lag
//
// White noise is usually rejected under a strict threshold, but YIN offers
// no hard guarantee: random frames occasionally dip below the threshold.

use crate::config::PitchConfig;

/// Default YIN absolute threshold
pub const DEFAULT_YIN_THRESHOLD: f64 = 0.15;
/// Default lower pitch bound in Hz
pub const MIN_PITCH_HZ: f64 = 50.0;
/// Default upper pitch bound in Hz
pub const MAX_PITCH_HZ: f64 = 600.0;

/// Estimate pitch with the default 50-600 Hz range
///
/// Returns `None` for silence, frames without a clear period, and
/// estimates outside the valid range.
pub fn detect_pitch(frame: &[f32], sample_rate: u32, threshold: f64) -> Option<f64> {
    let mut detector = YinDetector::new(threshold, MIN_PITCH_HZ, MAX_PITCH_HZ);
    detector.detect(frame, sample_rate)
}

/// YIN estimator with a reusable difference buffer
///
/// Holding the scratch buffer lets the detection loop run without
/// reallocating per tick. The output depends only on the input frame.
#[derive(Debug, Clone)]
pub struct YinDetector {
    threshold: f64,
    min_pitch_hz: f64,
    max_pitch_hz: f64,
    scratch: Vec<f64>,
}

impl YinDetector {
    pub fn new(threshold: f64, min_pitch_hz: f64, max_pitch_hz: f64) -> Self {
        Self {
            threshold,
            min_pitch_hz,
            max_pitch_hz,
            scratch: Vec::new(),
        }
    }

    pub fn from_config(config: &PitchConfig) -> Self {
        Self::new(
            config.yin_threshold,
            config.min_pitch_hz,
            config.max_pitch_hz,
        )
    }

    /// Estimate the fundamental frequency of `frame` in Hz
    pub fn detect(&mut self, frame: &[f32], sample_rate: u32) -> Option<f64> {
        let half_len = frame.len() / 2;
        if half_len < 3 {
            return None;
        }

        self.scratch.clear();
        self.scratch.resize(half_len, 0.0);
        let yin = &mut self.scratch[..];

        // Step 1: difference function
        for (tau, slot) in yin.iter_mut().enumerate() {
            let mut sum = 0.0;
            for i in 0..half_len {
                let delta = frame[i] as f64 - frame[i + tau] as f64;
                sum += delta * delta;
            }
            *slot = sum;
        }

        // Step 2: cumulative mean normalized difference
        yin[0] = 1.0;
        let mut running_sum = 0.0;
        for tau in 1..half_len {
            running_sum += yin[tau];
            yin[tau] = if running_sum > 0.0 {
                yin[tau] * tau as f64 / running_sum
            } else {
                1.0
            };
        }

        // Step 3: absolute threshold, then slide to the bottom of the dip
        let tau_estimate = first_dip_below(yin, self.threshold)?;

        // Step 4: parabolic interpolation
        let better_tau = refine_lag(yin, tau_estimate);
        if better_tau <= 0.0 || !better_tau.is_finite() {
            return None;
        }

        let pitch = sample_rate as f64 / better_tau;
        if pitch < self.min_pitch_hz || pitch > self.max_pitch_hz {
            return None;
        }
        Some(pitch)
    }
}

impl Default for YinDetector {
    fn default() -> Self {
        Self::new(DEFAULT_YIN_THRESHOLD, MIN_PITCH_HZ, MAX_PITCH_HZ)
    }
}

fn first_dip_below(yin: &[f64], threshold: f64) -> Option<usize> {
    let len = yin.len();
    let mut tau = 2;
    while tau < len {
        if yin[tau] < threshold {
            while tau + 1 < len && yin[tau + 1] < yin[tau] {
                tau += 1;
            }
            return Some(tau);
        }
        tau += 1;
    }
    None
}

fn refine_lag(yin: &[f64], tau: usize) -> f64 {
    let len = yin.len();
    let x0 = if tau < 1 { tau } else { tau - 1 };
    let x2 = if tau + 1 < len { tau + 1 } else { tau };

    if x0 == tau {
        if yin[tau] <= yin[x2] {
            tau as f64
        } else {
            x2 as f64
        }
    } else if x2 == tau {
        if yin[tau] <= yin[x0] {
            tau as f64
        } else {
            x0 as f64
        }
    } else {
        let s0 = yin[x0];
        let s1 = yin[tau];
        let s2 = yin[x2];
        let denominator = 2.0 * (2.0 * s1 - s2 - s0);
        if denominator == 0.0 {
            tau as f64
        } else {
            tau as f64 + (s2 - s0) / denominator
        }
    }
}
