//! Configuration management for detection tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration on thresholds and smoothing without
//! recompilation. Every section falls back to its defaults when missing
//! from the file, so partial configs are valid.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::DetectionError;

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pitch: PitchConfig,
    pub voicing: VoicingConfig,
    pub formants: FormantConfig,
    pub spectrum: SpectrumConfig,
    pub session: SessionConfig,
}

/// YIN pitch estimator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Minimum valid pitch in Hz
    pub min_pitch_hz: f64,
    /// Maximum valid pitch in Hz
    pub max_pitch_hz: f64,
    /// YIN absolute threshold (lower = more selective)
    pub yin_threshold: f64,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            min_pitch_hz: 50.0,
            max_pitch_hz: 600.0,
            yin_threshold: 0.15,
        }
    }
}

/// Voicing gate and noise floor parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoicingConfig {
    /// Base RMS amplitude to consider a frame voiced
    pub voice_threshold_base: f64,
    /// Adaptive threshold floor, as a multiple of the base
    pub voice_threshold_floor_factor: f64,
    /// Adaptive threshold ceiling, as a multiple of the base
    pub voice_threshold_ceiling_factor: f64,
    /// Scale applied to the noise floor estimate
    pub voice_threshold_noise_multiplier: f64,
    /// EMA decay for the noise floor (close to 1 = slow)
    pub noise_floor_ema_alpha: f64,
    /// RMS boost for the whisper path
    pub whisper_boost_factor: f64,
    /// Whisper boost only applies at or below this RMS
    pub whisper_boost_max_rms: f64,
}

impl Default for VoicingConfig {
    fn default() -> Self {
        Self {
            voice_threshold_base: 0.01,
            voice_threshold_floor_factor: 0.55,
            voice_threshold_ceiling_factor: 1.35,
            voice_threshold_noise_multiplier: 1.8,
            noise_floor_ema_alpha: 0.92,
            whisper_boost_factor: 1.18,
            whisper_boost_max_rms: 0.02,
        }
    }
}

impl VoicingConfig {
    /// Noise floor a fresh session starts from
    pub fn initial_noise_floor(&self) -> f64 {
        self.voice_threshold_base * self.voice_threshold_floor_factor
    }
}

/// Inclusive frequency band searched for a single formant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub min_hz: f64,
    pub max_hz: f64,
}

impl FrequencyBand {
    pub const fn new(min_hz: f64, max_hz: f64) -> Self {
        Self { min_hz, max_hz }
    }
}

/// Formant estimator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormantConfig {
    /// First formant (jaw opening)
    pub f1: FrequencyBand,
    /// Second formant (tongue position)
    pub f2: FrequencyBand,
    /// Third formant (vocal tract length)
    pub f3: FrequencyBand,
    /// Moving-average window applied to the dB spectrum
    pub smoothing_window: usize,
    /// Peaks below this level are treated as noise
    pub min_peak_db: f64,
}

impl Default for FormantConfig {
    fn default() -> Self {
        Self {
            f1: FrequencyBand::new(200.0, 1000.0),
            f2: FrequencyBand::new(700.0, 2500.0),
            f3: FrequencyBand::new(1800.0, 3500.0),
            smoothing_window: 5,
            min_peak_db: -80.0,
        }
    }
}

/// Analyser parameters used when the crate computes spectra itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Analysis window and FFT size in samples
    pub fft_size: usize,
    /// Temporal smoothing between successive spectra (0 = none)
    pub smoothing_time_constant: f64,
    /// Level mapped to byte value 0
    pub min_decibels: f64,
    /// Level mapped to byte value 255
    pub max_decibels: f64,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            fft_size: 2048,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Temporal aggregation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minimum interval between processed ticks
    pub update_interval_ms: u64,
    /// How long the last voiced values are held across gaps
    pub hold_last_value_ms: u64,
    /// EMA alpha for pitch (higher = more smoothing)
    pub pitch_smoothing: f64,
    /// EMA alpha for formants (higher = more smoothing)
    pub formant_smoothing: f64,
    /// Number of pitch history points to keep
    pub pitch_history_length: usize,
    /// Poll cadence of the background worker
    pub tick_poll_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 80,
            hold_last_value_ms: 600,
            pitch_smoothing: 0.45,
            formant_smoothing: 0.5,
            pitch_history_length: 200,
            tick_poll_interval_ms: 10,
        }
    }
}

impl SessionConfig {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn hold_window(&self) -> Duration {
        Duration::from_millis(self.hold_last_value_ms)
    }

    pub fn tick_poll_interval(&self) -> Duration {
        Duration::from_millis(self.tick_poll_interval_ms.max(1))
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or the
    /// JSON is invalid (a warning is logged either way).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Check ranges that the estimators rely on.
    pub fn validate(&self) -> Result<(), DetectionError> {
        let spectrum = &self.spectrum;
        if spectrum.sample_rate == 0 {
            return Err(DetectionError::invalid_config(
                "spectrum.sample_rate",
                "must be greater than 0",
            ));
        }
        if spectrum.fft_size < 4 || spectrum.fft_size % 2 != 0 {
            return Err(DetectionError::invalid_config(
                "spectrum.fft_size",
                format!("must be even and at least 4 (got {})", spectrum.fft_size),
            ));
        }
        if !(0.0..1.0).contains(&spectrum.smoothing_time_constant) {
            return Err(DetectionError::invalid_config(
                "spectrum.smoothing_time_constant",
                "must be in [0, 1)",
            ));
        }
        if spectrum.min_decibels >= spectrum.max_decibels {
            return Err(DetectionError::invalid_config(
                "spectrum.min_decibels",
                "must be below max_decibels",
            ));
        }

        let pitch = &self.pitch;
        if pitch.min_pitch_hz <= 0.0 || pitch.min_pitch_hz >= pitch.max_pitch_hz {
            return Err(DetectionError::invalid_config(
                "pitch.min_pitch_hz",
                "must be positive and below max_pitch_hz",
            ));
        }
        if !(pitch.yin_threshold > 0.0 && pitch.yin_threshold < 1.0) {
            return Err(DetectionError::invalid_config(
                "pitch.yin_threshold",
                "must be in (0, 1)",
            ));
        }

        let voicing = &self.voicing;
        if voicing.voice_threshold_base <= 0.0 {
            return Err(DetectionError::invalid_config(
                "voicing.voice_threshold_base",
                "must be greater than 0",
            ));
        }
        if voicing.voice_threshold_floor_factor > voicing.voice_threshold_ceiling_factor {
            return Err(DetectionError::invalid_config(
                "voicing.voice_threshold_floor_factor",
                "must not exceed voice_threshold_ceiling_factor",
            ));
        }
        check_alpha("voicing.noise_floor_ema_alpha", voicing.noise_floor_ema_alpha)?;

        let session = &self.session;
        check_alpha("session.pitch_smoothing", session.pitch_smoothing)?;
        check_alpha("session.formant_smoothing", session.formant_smoothing)?;
        if session.pitch_history_length == 0 {
            return Err(DetectionError::invalid_config(
                "session.pitch_history_length",
                "must be greater than 0",
            ));
        }

        let formants = &self.formants;
        if formants.smoothing_window == 0 {
            return Err(DetectionError::invalid_config(
                "formants.smoothing_window",
                "must be greater than 0",
            ));
        }
        for (name, band) in [
            ("formants.f1", formants.f1),
            ("formants.f2", formants.f2),
            ("formants.f3", formants.f3),
        ] {
            if band.min_hz < 0.0 || band.min_hz >= band.max_hz {
                return Err(DetectionError::invalid_config(
                    name,
                    "min_hz must be non-negative and below max_hz",
                ));
            }
        }

        Ok(())
    }
}

fn check_alpha(field: &str, value: f64) -> Result<(), DetectionError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(DetectionError::invalid_config(field, "must be in [0, 1)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.spectrum.sample_rate, 44100);
        assert_eq!(config.spectrum.fft_size, 2048);
        assert!(config.spectrum.fft_size.is_power_of_two());
        assert_eq!(config.pitch.min_pitch_hz, 50.0);
        assert_eq!(config.pitch.max_pitch_hz, 600.0);
        assert_eq!(config.pitch.yin_threshold, 0.15);
        assert_eq!(config.voicing.noise_floor_ema_alpha, 0.92);
        assert_eq!(config.session.pitch_history_length, 200);
        assert_eq!(config.session.hold_last_value_ms, 600);
        assert_eq!(config.session.update_interval_ms, 80);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_formant_bands_are_ordered() {
        let formants = FormantConfig::default();
        assert!(formants.f1.max_hz <= formants.f2.max_hz);
        assert!(formants.f2.max_hz <= formants.f3.max_hz);
    }

    #[test]
    fn test_initial_noise_floor() {
        let voicing = VoicingConfig::default();
        assert!((voicing.initial_noise_floor() - 0.0055).abs() < 1e-12);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{ "session": { "hold_last_value_ms": 340 } }"#).unwrap();
        assert_eq!(parsed.session.hold_last_value_ms, 340);
        assert_eq!(parsed.session.update_interval_ms, 80);
        assert_eq!(parsed.pitch, PitchConfig::default());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/voice_hud_config.json");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let mut config = AppConfig::default();
        config.pitch.min_pitch_hz = 700.0;
        assert!(matches!(
            config.validate(),
            Err(DetectionError::InvalidConfig { .. })
        ));

        let mut config = AppConfig::default();
        config.spectrum.fft_size = 1023;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.session.pitch_smoothing = 1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.session.pitch_history_length = 0;
        assert!(config.validate().is_err());
    }
}
