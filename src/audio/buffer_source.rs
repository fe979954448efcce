// Offline audio source over an in-memory buffer or WAV file
//
// Walks the buffer with a fixed hop, running the analyser on every window,
// so recordings go through the same per-frame contract as live capture.

use std::path::Path;

use super::{AudioSource, SourceFrame};
use crate::analysis::SpectrumAnalyzer;
use crate::config::SpectrumConfig;
use crate::error::AudioError;

/// Mono samples loaded from a WAV file
#[derive(Debug, Clone, PartialEq)]
pub struct WavClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Frame source that replays a buffer hop by hop
pub struct BufferSource {
    samples: Vec<f32>,
    sample_rate: u32,
    frame_size: usize,
    hop: usize,
    position: usize,
    analyzer: SpectrumAnalyzer,
}

impl BufferSource {
    /// Create a source over `samples`
    ///
    /// The analyser uses `spectrum.fft_size` as the frame size; `hop` is
    /// clamped to at least one sample.
    pub fn new(samples: Vec<f32>, sample_rate: u32, spectrum: &SpectrumConfig, hop: usize) -> Self {
        Self {
            samples,
            sample_rate,
            frame_size: spectrum.fft_size,
            hop: hop.max(1),
            position: 0,
            analyzer: SpectrumAnalyzer::new(spectrum),
        }
    }

    /// Load a WAV file; multi-channel audio keeps the first channel
    pub fn from_wav<P: AsRef<Path>>(
        path: P,
        spectrum: &SpectrumConfig,
        hop: usize,
    ) -> Result<Self, AudioError> {
        let clip = read_wav(path.as_ref())?;
        Ok(Self::new(clip.samples, clip.sample_rate, spectrum, hop))
    }

    /// Offset of the next frame in the recording
    pub fn position_secs(&self) -> f64 {
        self.position as f64 / self.sample_rate.max(1) as f64
    }

    /// Number of full frames the buffer yields
    pub fn total_frames(&self) -> usize {
        if self.samples.len() < self.frame_size {
            0
        } else {
            (self.samples.len() - self.frame_size) / self.hop + 1
        }
    }
}

impl AudioSource for BufferSource {
    fn is_active(&self) -> bool {
        self.position + self.frame_size <= self.samples.len()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn read_frame(&mut self) -> Option<SourceFrame> {
        if !self.is_active() {
            return None;
        }
        let window = self.samples[self.position..self.position + self.frame_size].to_vec();
        self.position += self.hop;

        let spectrum = self.analyzer.analyze(&window);
        Some(SourceFrame::new(window, spectrum.decibels, spectrum.bytes))
    }
}

/// Decode a WAV file into mono f32 samples
pub fn read_wav(path: &Path) -> Result<WavClip, AudioError> {
    let wav_error = |reason: String| AudioError::Wav {
        path: path.display().to_string(),
        reason,
    };

    // I/O failures past the header are read faults, not format problems
    let sample_error = |err: hound::Error| match err {
        hound::Error::IoError(io) => AudioError::from(io),
        other => wav_error(format!("read error: {other}")),
    };

    let mut reader =
        hound::WavReader::open(path).map_err(|err| wav_error(format!("failed to open: {err}")))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(wav_error("zero channels".to_string()));
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(sample_error))
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            if !(8..=32).contains(&bits) {
                return Err(wav_error(format!("unsupported bits_per_sample={bits}")));
            }
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| {
                    sample
                        .map(|value| value as f32 / scale)
                        .map_err(sample_error)
                })
                .collect::<Result<Vec<f32>, _>>()?
        }
    };

    let channels = spec.channels as usize;
    let samples = if channels == 1 {
        samples
    } else {
        samples.chunks_exact(channels).map(|frame| frame[0]).collect()
    };

    Ok(WavClip {
        samples,
        sample_rate: spec.sample_rate,
    })
}
