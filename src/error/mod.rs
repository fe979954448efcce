// Error types for the voice HUD core
//
// This module defines custom error types for audio capture and detection
// sessions, providing structured error handling with stable error codes.
// No-detection outcomes (no pitch, no formant, unvoiced frame) are never
// errors; they are the `None` case of the respective estimator.

mod audio;
mod detection;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use detection::{log_detection_error, DetectionError, DetectionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library and CLI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
