// Live microphone capture via cpal
//
// `cpal::Stream` is not `Send`, so capture is split in two halves:
// - CpalCapture: owns the stream and stays on the thread that opened it
// - CaptureSource: the `AudioSource` handed to the detection worker; it
//   drains the sample handoff and runs the analyser on the latest window
//
// The stream error callback flips a shared flag so the detection loop sees
// the source go inactive instead of reading stale audio forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::handoff::{sample_handoff, SampleProducer, SampleWindow, DEFAULT_RING_CAPACITY};
use super::{AudioSource, SourceFrame};
use crate::analysis::SpectrumAnalyzer;
use crate::config::SpectrumConfig;
use crate::error::{log_audio_error, AudioError};

/// Running input stream
pub struct CpalCapture {
    stream: cpal::Stream,
    sample_rate: u32,
    active: Arc<AtomicBool>,
}

impl CpalCapture {
    /// Open and start the default input device
    ///
    /// The device's native sample rate wins over `config.sample_rate`; the
    /// returned source reports the rate actually delivered.
    pub fn open(config: &SpectrumConfig) -> Result<(Self, CaptureSource), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;

        let supported = device
            .default_input_config()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to get default input config: {:?}", e),
            })?;

        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();
        let channels = stream_config.channels as usize;
        let sample_rate = stream_config.sample_rate.0;

        let capacity = DEFAULT_RING_CAPACITY.max(config.fft_size * 4);
        let (producer, window) = sample_handoff(capacity, config.fft_size);
        let active = Arc::new(AtomicBool::new(true));

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, producer, channels, &active, |s| s)
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, producer, channels, &active, |s| {
                    s as f32 / 32768.0
                })
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, producer, channels, &active, |s| {
                    (s as f32 - 32768.0) / 32768.0
                })
            }
            other => {
                return Err(AudioError::UnsupportedFormat {
                    format: format!("{:?}", other),
                })
            }
        }?;

        stream.play().map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Failed to start input stream: {:?}", e),
        })?;

        tracing::info!(
            sample_rate,
            channels,
            format = ?sample_format,
            "input stream started"
        );

        let source = CaptureSource {
            window,
            analyzer: SpectrumAnalyzer::new(config),
            sample_rate,
            frame_size: config.fft_size,
            active: Arc::clone(&active),
            reported_drops: 0,
        };

        Ok((
            Self {
                stream,
                sample_rate,
                active,
            },
            source,
        ))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop the stream and mark the paired source inactive
    pub fn stop(self) -> Result<(), AudioError> {
        self.active.store(false, Ordering::Release);
        self.stream.pause().map_err(|e| AudioError::StreamFailure {
            reason: format!("Failed to pause input stream: {:?}", e),
        })?;
        tracing::info!("input stream stopped");
        Ok(())
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: SampleProducer,
    channels: usize,
    active: &Arc<AtomicBool>,
    convert: fn(T) -> f32,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let error_flag = Arc::clone(active);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                producer.push_interleaved(data, channels, convert);
            },
            move |err| {
                error_flag.store(false, Ordering::Release);
                log_audio_error(
                    &AudioError::StreamFailure {
                        reason: err.to_string(),
                    },
                    "input stream",
                );
            },
            None,
        )
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })
}

/// Detection-side half of a live capture
pub struct CaptureSource {
    window: SampleWindow,
    analyzer: SpectrumAnalyzer,
    sample_rate: u32,
    frame_size: usize,
    active: Arc<AtomicBool>,
    reported_drops: u64,
}

impl AudioSource for CaptureSource {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn read_frame(&mut self) -> Option<SourceFrame> {
        let samples = self.window.latest_frame()?;

        let dropped = self.window.dropped_samples();
        if dropped > self.reported_drops {
            tracing::warn!(
                "[CaptureSource] handoff overrun, {} samples dropped so far",
                dropped
            );
            self.reported_drops = dropped;
        }

        let spectrum = self.analyzer.analyze(&samples);
        Some(SourceFrame::new(samples, spectrum.decibels, spectrum.bytes))
    }
}
