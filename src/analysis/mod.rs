// Analysis module - stateless DSP estimators
//
// Everything here operates on a single frame and holds no session state
// beyond reusable scratch buffers:
// - signal: RMS and musical pitch conversions
// - voicing: RMS gate, whisper boost and the adaptive noise floor threshold
// - pitch: YIN fundamental frequency estimator
// - formant: spectral peak picking for F1-F3
// - resonance: qualitative labels over formant estimates
// - spectrum: analyser producing dB/byte spectra from raw samples
//
// The stateful per-tick orchestration lives in `crate::engine`.

pub mod formant;
pub mod pitch;
pub mod resonance;
pub mod signal;
pub mod spectrum;
pub mod voicing;

pub use formant::{detect_formants, FormantDetector, Formants};
pub use pitch::{detect_pitch, YinDetector};
pub use resonance::{describe_resonance, Locale};
pub use signal::{frequency_to_note_name, frequency_to_semitones, root_mean_square, VoiceRange};
pub use spectrum::{SpectrumAnalyzer, SpectrumData};
pub use voicing::{adaptive_threshold, is_voiced, NoiseFloorTracker, VoicingClassifier};
