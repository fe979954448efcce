// Audio module - frame sources feeding the detection loop
//
// - frame: time-domain and spectrum frame types
// - handoff: lock-free sample transfer out of the capture callback
// - buffer_source: offline source over a buffer or WAV file
// - capture: live microphone capture through cpal

pub mod buffer_source;
pub mod capture;
pub mod frame;
pub mod handoff;

// Re-export commonly used types for convenience
pub use buffer_source::{read_wav, BufferSource, WavClip};
pub use capture::{CaptureSource, CpalCapture};
pub use frame::{AudioFrame, SourceFrame, SpectrumFrame};
pub use handoff::{sample_handoff, SampleProducer, SampleWindow};

/// Supplier of synchronized time-domain and spectrum frames
///
/// A source delivers one frame per read at a fixed sample rate and frame
/// size. `read_frame` returns `None` when no new frame is ready yet; that is
/// not an error.
pub trait AudioSource: Send {
    /// Whether the source is still delivering audio
    fn is_active(&self) -> bool;

    /// Sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Samples per time-domain frame (the FFT size)
    fn frame_size(&self) -> usize;

    /// Pull the most recent frame, if any
    fn read_frame(&mut self) -> Option<SourceFrame>;
}
