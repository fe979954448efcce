// Spectrum module - analyser-style magnitude spectra
//
// Sources that only deliver raw samples (microphone capture, WAV files)
// use this analyser to produce the dB spectrum consumed by the formant
// estimator and the byte spectrum consumed by visualizations. It follows
// the usual analyser node recipe: Blackman window, FFT, |X|/N, temporal
// smoothing across calls, then dB conversion and byte quantization.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::SpectrumConfig;

/// Magnitudes below this are clamped before the dB conversion
const MIN_MAGNITUDE: f64 = 1e-12;

/// Analyser output for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumData {
    /// Magnitude per bin in decibels, `fft_size / 2` entries
    pub decibels: Vec<f32>,
    /// Decibels mapped linearly onto 0..=255
    pub bytes: Vec<u8>,
}

/// FFT analyser producing dB and byte spectra
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f64>>,
    fft_size: usize,
    /// Blackman window (pre-computed)
    window: Vec<f64>,
    smoothing_time_constant: f64,
    min_decibels: f64,
    max_decibels: f64,
    /// Smoothed magnitudes carried between calls
    previous: Vec<f64>,
    buffer: Vec<Complex<f64>>,
}

impl SpectrumAnalyzer {
    /// Create a new analyser
    ///
    /// # Panics
    /// Panics if `config.fft_size` is 0
    pub fn new(config: &SpectrumConfig) -> Self {
        let fft_size = config.fft_size;
        assert!(fft_size > 0, "fft_size must be greater than 0");

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft,
            fft_size,
            window: blackman_window(fft_size),
            smoothing_time_constant: config.smoothing_time_constant,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            previous: vec![0.0; fft_size / 2],
            buffer: Vec::with_capacity(fft_size),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Forget the temporal smoothing history
    pub fn reset(&mut self) {
        self.previous.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Analyse one frame of `fft_size` samples
    ///
    /// Shorter frames are zero-padded, longer frames are truncated.
    pub fn analyze(&mut self, frame: &[f32]) -> SpectrumData {
        self.buffer.clear();
        self.buffer.extend(
            (0..self.fft_size)
                .map(|i| frame.get(i).map_or(0.0, |&s| s as f64 * self.window[i]))
                .map(|re| Complex::new(re, 0.0)),
        );

        self.fft.process(&mut self.buffer);

        let scale = 1.0 / self.fft_size as f64;
        let tau = self.smoothing_time_constant;
        let range = self.max_decibels - self.min_decibels;

        let bins = self.bin_count();
        let mut decibels = Vec::with_capacity(bins);
        let mut bytes = Vec::with_capacity(bins);

        for (k, previous) in self.previous.iter_mut().enumerate() {
            let magnitude = self.buffer[k].norm() * scale;
            let smoothed = tau * *previous + (1.0 - tau) * magnitude;
            *previous = if smoothed.is_finite() { smoothed } else { 0.0 };

            let db = 20.0 * (*previous).max(MIN_MAGNITUDE).log10();
            decibels.push(db as f32);

            let scaled = (255.0 / range * (db - self.min_decibels)).floor();
            bytes.push(scaled.clamp(0.0, 255.0) as u8);
        }

        SpectrumData { decibels, bytes }
    }
}

fn blackman_window(size: usize) -> Vec<f64> {
    let alpha = 0.16;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    let n = size as f64;
    (0..size)
        .map(|i| {
            let x = i as f64 / n;
            a0 - a1 * (2.0 * std::f64::consts::PI * x).cos()
                + a2 * (4.0 * std::f64::consts::PI * x).cos()
        })
        .collect()
}
