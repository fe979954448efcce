// Smoothing state - EMA smoothing and hold-last-value across unvoiced gaps
//
// One instance per session, mutated once per tick by the detector:
// - smoothed pitch and formants (EMA, higher alpha = slower response)
// - ghost formants: last known-good smoothed formants, cleared only on reset
// - last voiced instant plus the values captured at that tick, replayed
//   while the hold window is open

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::analysis::Formants;

/// Exponential moving average over optional values
///
/// A missing current value keeps the previous one; a missing previous value
/// adopts the current one unchanged.
pub fn ema(prev: Option<f64>, cur: Option<f64>, alpha: f64) -> Option<f64> {
    match (prev, cur) {
        (prev, None) => prev,
        (None, cur) => cur,
        (Some(prev), Some(cur)) => Some(prev * alpha + cur * (1.0 - alpha)),
    }
}

/// Per-formant EMA
pub fn smooth_formants(prev: &Formants, cur: &Formants, alpha: f64) -> Formants {
    Formants {
        f1: ema(prev.f1, cur.f1, alpha),
        f2: ema(prev.f2, cur.f2, alpha),
        f3: ema(prev.f3, cur.f3, alpha),
    }
}

/// Output state of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldState {
    /// The current tick produced a pitch
    Voiced,
    /// No pitch now, but the last voiced tick is within the hold window
    Holding,
    /// Nothing to show
    Silent,
}

impl HoldState {
    /// Whether the emitted snapshot reports voicing
    pub fn is_voiced(self) -> bool {
        matches!(self, HoldState::Voiced | HoldState::Holding)
    }
}

/// Values captured on the last voiced tick
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeldValues {
    pub pitch: Option<f64>,
    pub formants: Formants,
    pub spectrum_bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SmoothingState {
    pitch_alpha: f64,
    formant_alpha: f64,
    pitch: Option<f64>,
    formants: Formants,
    ghost_formants: Formants,
    last_voiced_at: Option<Instant>,
    held: HeldValues,
}

impl SmoothingState {
    pub fn new(pitch_alpha: f64, formant_alpha: f64) -> Self {
        Self {
            pitch_alpha,
            formant_alpha,
            pitch: None,
            formants: Formants::EMPTY,
            ghost_formants: Formants::EMPTY,
            last_voiced_at: None,
            held: HeldValues::default(),
        }
    }

    pub fn pitch(&self) -> Option<f64> {
        self.pitch
    }

    pub fn formants(&self) -> Formants {
        self.formants
    }

    pub fn ghost_formants(&self) -> Formants {
        self.ghost_formants
    }

    pub fn held(&self) -> &HeldValues {
        &self.held
    }

    pub fn last_voiced_at(&self) -> Option<Instant> {
        self.last_voiced_at
    }

    /// Fold a voiced detection into the smoothed values and capture them
    /// for the hold window.
    pub fn record_voiced(
        &mut self,
        pitch: f64,
        formants: &Formants,
        spectrum_bytes: &[u8],
        now: Instant,
    ) {
        self.pitch = ema(self.pitch, Some(pitch), self.pitch_alpha);
        self.formants = smooth_formants(&self.formants, formants, self.formant_alpha);
        self.ghost_formants = self.formants;
        self.last_voiced_at = Some(now);

        self.held.pitch = self.pitch;
        self.held.formants = self.formants;
        self.held.spectrum_bytes.clear();
        self.held.spectrum_bytes.extend_from_slice(spectrum_bytes);
    }

    /// Classify the tick at `now`
    ///
    /// The hold window is inclusive: a gap of exactly `hold` still holds.
    pub fn hold_state(&self, voiced_now: bool, now: Instant, hold: Duration) -> HoldState {
        if voiced_now {
            return HoldState::Voiced;
        }
        match self.last_voiced_at {
            Some(at) if now.saturating_duration_since(at) <= hold => HoldState::Holding,
            _ => HoldState::Silent,
        }
    }

    /// Back to the initial state, ghost formants included
    pub fn reset(&mut self) {
        self.pitch = None;
        self.formants = Formants::EMPTY;
        self.ghost_formants = Formants::EMPTY;
        self.last_voiced_at = None;
        self.held = HeldValues::default();
    }
}
