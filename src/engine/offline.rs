// Offline analysis - run the detector over a whole recording
//
// Frames are processed back to back with no throttle. Time is derived from
// the frame position in the recording, so the hold window is measured in
// audio time rather than wall-clock time.

use std::path::Path;
use std::time::{Duration, Instant};

use super::detector::Detector;
use super::snapshot::DetectionSnapshot;
use crate::audio::{AudioSource, BufferSource};
use crate::config::AppConfig;
use crate::error::DetectionError;

/// Analyse an in-memory buffer, one snapshot per hop
pub fn analyze_buffer(
    samples: &[f32],
    sample_rate: u32,
    config: &AppConfig,
    hop: usize,
) -> Result<Vec<DetectionSnapshot>, DetectionError> {
    config.validate()?;
    let mut source = BufferSource::new(samples.to_vec(), sample_rate, &config.spectrum, hop);
    analyze_source(&mut source, config)
}

/// Analyse a WAV file, one snapshot per hop
pub fn analyze_wav<P: AsRef<Path>>(
    path: P,
    config: &AppConfig,
    hop: usize,
) -> anyhow::Result<Vec<DetectionSnapshot>> {
    config.validate()?;
    let mut source = BufferSource::from_wav(path, &config.spectrum, hop)?;
    Ok(analyze_source(&mut source, config)?)
}

/// Drain a buffer source through a fresh detector
pub fn analyze_source(
    source: &mut BufferSource,
    config: &AppConfig,
) -> Result<Vec<DetectionSnapshot>, DetectionError> {
    let mut detector = Detector::new(config)?;
    if source.frame_size() != detector.frame_size() {
        return Err(DetectionError::FrameLengthMismatch {
            expected: detector.frame_size(),
            actual: source.frame_size(),
        });
    }

    let sample_rate = source.sample_rate();
    let origin = Instant::now();
    let mut snapshots = Vec::with_capacity(source.total_frames());

    loop {
        let at = origin + Duration::from_secs_f64(source.position_secs());
        let Some(frame) = source.read_frame() else {
            break;
        };
        snapshots.push(detector.process(&frame, sample_rate, at)?);
    }

    tracing::debug!(
        frames = snapshots.len(),
        sample_rate,
        "offline analysis finished"
    );
    Ok(snapshots)
}
