// Frame types exchanged between audio sources and the detection loop

/// One analysis window of normalized time-domain samples
///
/// Produced once per tick by a source and read by every estimator in that
/// tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Per-bin magnitudes in dB for the paired `AudioFrame`
///
/// Holds `frame_len / 2` bins at the same sample rate and FFT size.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    decibels: Vec<f32>,
}

impl SpectrumFrame {
    pub fn new(decibels: Vec<f32>) -> Self {
        Self { decibels }
    }

    pub fn decibels(&self) -> &[f32] {
        &self.decibels
    }

    pub fn len(&self) -> usize {
        self.decibels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decibels.is_empty()
    }
}

/// Everything a source hands over for one tick
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFrame {
    pub time_domain: AudioFrame,
    pub spectrum: SpectrumFrame,
    /// Byte-quantized spectrum for visualization
    pub spectrum_bytes: Vec<u8>,
}

impl SourceFrame {
    pub fn new(time_domain: Vec<f32>, spectrum_db: Vec<f32>, spectrum_bytes: Vec<u8>) -> Self {
        Self {
            time_domain: AudioFrame::new(time_domain),
            spectrum: SpectrumFrame::new(spectrum_db),
            spectrum_bytes,
        }
    }
}
