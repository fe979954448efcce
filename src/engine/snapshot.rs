use serde::{Deserialize, Serialize};

use super::smoothing::HoldState;
use crate::analysis::Formants;

/// Consolidated output of one detection tick
///
/// Owned by the caller once emitted; retaining it never aliases loop state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSnapshot {
    /// Milliseconds since the session started
    pub timestamp_ms: u64,
    /// Smoothed pitch in Hz, or the held value while holding
    pub pitch: Option<f64>,
    /// RMS amplitude of the current frame
    pub rms: f64,
    /// True when the tick is voiced or within the hold window
    pub voiced: bool,
    pub hold_state: HoldState,
    pub formants: Formants,
    /// Last known-good formants, kept across unvoiced gaps
    pub ghost_formants: Formants,
    /// Emitted pitch per tick, oldest first
    pub pitch_history: Vec<Option<f64>>,
    /// Byte-quantized spectrum for visualization
    pub spectrum_bytes: Vec<u8>,
    /// Adaptive threshold used for this tick
    pub threshold: f64,
    /// Noise floor after this tick's update
    pub noise_floor: f64,
}

impl DetectionSnapshot {
    /// Snapshot reported before any tick has been processed
    pub fn initial() -> Self {
        Self {
            timestamp_ms: 0,
            pitch: None,
            rms: 0.0,
            voiced: false,
            hold_state: HoldState::Silent,
            formants: Formants::EMPTY,
            ghost_formants: Formants::EMPTY,
            pitch_history: Vec::new(),
            spectrum_bytes: Vec::new(),
            threshold: 0.0,
            noise_floor: 0.0,
        }
    }
}

impl Default for DetectionSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}
