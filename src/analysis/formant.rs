// Formant module - vocal tract resonance estimation
//
// Formants are estimated by spectral peak picking on the dB magnitude
// spectrum:
//
// 1. Moving-average smoothing to suppress single-bin spikes
// 2. Highest strict local maximum inside each formant's search band
// 3. Peaks below the noise level are discarded
// 4. Parabolic interpolation across the peak bin for sub-bin accuracy
//
// F1 correlates with jaw opening, F2 with tongue position and F3 with
// vocal tract length. Each band is searched independently; no ordering is
// enforced between the results.

use serde::{Deserialize, Serialize};

use crate::config::{FormantConfig, FrequencyBand};

/// Level assigned to non-finite spectrum bins before smoothing
const SILENT_BIN_DB: f32 = -240.0;

/// First three formant frequencies in Hz
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Formants {
    pub f1: Option<f64>,
    pub f2: Option<f64>,
    pub f3: Option<f64>,
}

impl Formants {
    pub const EMPTY: Formants = Formants {
        f1: None,
        f2: None,
        f3: None,
    };

    pub fn is_empty(&self) -> bool {
        self.f1.is_none() && self.f2.is_none() && self.f3.is_none()
    }
}

/// Estimate formants with the default search bands
pub fn detect_formants(spectrum_db: &[f32], sample_rate: u32, fft_size: usize) -> Formants {
    FormantDetector::new(FormantConfig::default()).detect(spectrum_db, sample_rate, fft_size)
}

/// Peak-picking formant estimator
#[derive(Debug, Clone)]
pub struct FormantDetector {
    config: FormantConfig,
    smoothed: Vec<f32>,
}

impl FormantDetector {
    pub fn new(config: FormantConfig) -> Self {
        Self {
            config,
            smoothed: Vec::new(),
        }
    }

    /// Estimate F1-F3 from a dB magnitude spectrum of `fft_size / 2` bins
    pub fn detect(&mut self, spectrum_db: &[f32], sample_rate: u32, fft_size: usize) -> Formants {
        if spectrum_db.len() < 3 || fft_size == 0 || sample_rate == 0 {
            return Formants::EMPTY;
        }
        let bin_hz = sample_rate as f64 / fft_size as f64;

        smooth_spectrum(spectrum_db, self.config.smoothing_window, &mut self.smoothed);

        let min_peak_db = self.config.min_peak_db;
        Formants {
            f1: find_peak_in_band(&self.smoothed, bin_hz, self.config.f1, min_peak_db),
            f2: find_peak_in_band(&self.smoothed, bin_hz, self.config.f2, min_peak_db),
            f3: find_peak_in_band(&self.smoothed, bin_hz, self.config.f3, min_peak_db),
        }
    }
}

/// Centered moving average, truncated at the edges
fn smooth_spectrum(data: &[f32], window_size: usize, out: &mut Vec<f32>) {
    let half = window_size / 2;
    let len = data.len();
    out.clear();
    out.reserve(len);

    for i in 0..len {
        let start = i.saturating_sub(half);
        let end = (i + half).min(len - 1);
        let sum: f64 = data[start..=end]
            .iter()
            .map(|&v| if v.is_finite() { v } else { SILENT_BIN_DB } as f64)
            .sum();
        out.push((sum / (end - start + 1) as f64) as f32);
    }
}

fn find_peak_in_band(
    data: &[f32],
    bin_hz: f64,
    band: FrequencyBand,
    min_peak_db: f64,
) -> Option<f64> {
    let min_bin = (band.min_hz / bin_hz).ceil() as usize;
    let max_bin = ((band.max_hz / bin_hz).floor() as usize).min(data.len() - 2);

    let mut peak: Option<(usize, f32)> = None;
    for i in (min_bin + 1)..max_bin {
        let value = data[i];
        let is_local_max = value > data[i - 1] && value > data[i + 1];
        if is_local_max && peak.map_or(true, |(_, best)| value > best) {
            peak = Some((i, value));
        }
    }

    let (peak_bin, peak_db) = peak?;
    if (peak_db as f64) < min_peak_db {
        return None;
    }

    let alpha = data[peak_bin - 1] as f64;
    let beta = data[peak_bin] as f64;
    let gamma = data[peak_bin + 1] as f64;
    let denominator = alpha - 2.0 * beta + gamma;
    // Strict local maximum guarantees a negative curvature
    let offset = if denominator != 0.0 {
        0.5 * (alpha - gamma) / denominator
    } else {
        0.0
    };

    Some((peak_bin as f64 + offset) * bin_hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;
    const FFT_SIZE: usize = 2048;

    fn bin_hz() -> f64 {
        SAMPLE_RATE as f64 / FFT_SIZE as f64
    }

    fn flat_spectrum() -> Vec<f32> {
        vec![-100.0; FFT_SIZE / 2]
    }

    /// Wide quadratic peak that survives the 5-bin smoothing
    fn add_peak(data: &mut [f32], freq: f64, value: f32) {
        let center = (freq / bin_hz()).round() as i64;
        for offset in -8i64..=8 {
            let bin = center + offset;
            if bin >= 0 && (bin as usize) < data.len() {
                let level = value - (offset * offset) as f32;
                data[bin as usize] = data[bin as usize].max(level);
            }
        }
    }

    #[test]
    fn test_flat_spectrum_has_no_formants() {
        let formants = detect_formants(&flat_spectrum(), SAMPLE_RATE, FFT_SIZE);
        assert_eq!(formants, Formants::EMPTY);
        assert!(formants.is_empty());
    }

    #[test]
    fn test_single_peak_yields_f1() {
        let mut data = flat_spectrum();
        add_peak(&mut data, 500.0, -20.0);
        let formants = detect_formants(&data, SAMPLE_RATE, FFT_SIZE);
        let f1 = formants.f1.expect("F1 should be detected");
        assert!(f1 > 400.0 && f1 < 600.0, "F1 was {}", f1);
    }

    #[test]
    fn test_three_separated_peaks() {
        let mut data = flat_spectrum();
        add_peak(&mut data, 500.0, -20.0);
        add_peak(&mut data, 1500.0, -15.0);
        add_peak(&mut data, 2500.0, -25.0);

        let formants = detect_formants(&data, SAMPLE_RATE, FFT_SIZE);
        let f1 = formants.f1.expect("F1");
        let f2 = formants.f2.expect("F2");
        let f3 = formants.f3.expect("F3");
        assert!((200.0..=1000.0).contains(&f1));
        assert!((700.0..=2500.0).contains(&f2));
        assert!((1800.0..=3500.0).contains(&f3));
        assert!((f2 - 1500.0).abs() < 50.0);
        assert!((f3 - 2500.0).abs() < 50.0);
    }

    #[test]
    fn test_quiet_peak_is_rejected() {
        let mut data = flat_spectrum();
        add_peak(&mut data, 500.0, -85.0);
        let formants = detect_formants(&data, SAMPLE_RATE, FFT_SIZE);
        assert_eq!(formants.f1, None);
    }

    #[test]
    fn test_non_finite_bins_are_tolerated() {
        let mut data = vec![f32::NEG_INFINITY; FFT_SIZE / 2];
        add_peak(&mut data, 1500.0, -30.0);
        let formants = detect_formants(&data, SAMPLE_RATE, FFT_SIZE);
        assert!(formants.f2.is_some());
        assert!(formants.f2.map_or(false, f64::is_finite));
    }

    #[test]
    fn test_short_spectrum_is_empty() {
        assert_eq!(detect_formants(&[-10.0, -5.0], SAMPLE_RATE, FFT_SIZE), Formants::EMPTY);
    }

    #[test]
    fn test_detection_is_idempotent() {
        let mut data = flat_spectrum();
        add_peak(&mut data, 700.0, -30.0);
        let mut detector = FormantDetector::new(FormantConfig::default());
        let first = detector.detect(&data, SAMPLE_RATE, FFT_SIZE);
        let second = detector.detect(&data, SAMPLE_RATE, FFT_SIZE);
        assert_eq!(first, second);
    }
}
