// Detection session error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Detection error code constants
///
/// Error code range: 2001-2008
pub struct DetectionErrorCodes {}

impl DetectionErrorCodes {
    /// Time-domain frame length differs from the configured frame size
    pub const FRAME_LENGTH_MISMATCH: i32 = 2001;

    /// Spectrum length differs from frame size / 2
    pub const SPECTRUM_LENGTH_MISMATCH: i32 = 2002;

    /// Source sample rate changed during a session
    pub const SAMPLE_RATE_MISMATCH: i32 = 2003;

    /// Configuration failed validation
    pub const INVALID_CONFIG: i32 = 2004;

    /// Session already has an attached source
    pub const ALREADY_RUNNING: i32 = 2005;

    /// Session has no attached source
    pub const NOT_RUNNING: i32 = 2006;

    /// Shared state lock was poisoned
    pub const LOCK_POISONED: i32 = 2007;

    /// Detection worker thread panicked
    pub const WORKER_PANICKED: i32 = 2008;
}

/// Log a detection error with structured context
pub fn log_detection_error(err: &DetectionError, context: &str) {
    error!(
        "Detection error in {}: code={}, component=DetectionLoop, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Precondition faults and session lifecycle errors
///
/// Malformed frames indicate a caller bug and are never coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// Time-domain frame has the wrong number of samples
    FrameLengthMismatch { expected: usize, actual: usize },

    /// Spectrum frame has the wrong number of bins
    SpectrumLengthMismatch { expected: usize, actual: usize },

    /// Source sample rate differs from the one the session started with
    SampleRateMismatch { expected: u32, actual: u32 },

    /// Configuration value out of range
    InvalidConfig { field: String, reason: String },

    /// Session already active
    AlreadyRunning,

    /// Session not active
    NotRunning,

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Worker thread panicked before it could be joined
    WorkerPanicked,
}

impl DetectionError {
    pub(crate) fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        DetectionError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl ErrorCode for DetectionError {
    fn code(&self) -> i32 {
        match self {
            DetectionError::FrameLengthMismatch { .. } => {
                DetectionErrorCodes::FRAME_LENGTH_MISMATCH
            }
            DetectionError::SpectrumLengthMismatch { .. } => {
                DetectionErrorCodes::SPECTRUM_LENGTH_MISMATCH
            }
            DetectionError::SampleRateMismatch { .. } => DetectionErrorCodes::SAMPLE_RATE_MISMATCH,
            DetectionError::InvalidConfig { .. } => DetectionErrorCodes::INVALID_CONFIG,
            DetectionError::AlreadyRunning => DetectionErrorCodes::ALREADY_RUNNING,
            DetectionError::NotRunning => DetectionErrorCodes::NOT_RUNNING,
            DetectionError::LockPoisoned { .. } => DetectionErrorCodes::LOCK_POISONED,
            DetectionError::WorkerPanicked => DetectionErrorCodes::WORKER_PANICKED,
        }
    }

    fn message(&self) -> String {
        match self {
            DetectionError::FrameLengthMismatch { expected, actual } => {
                format!(
                    "Time-domain frame must have {} samples (got {})",
                    expected, actual
                )
            }
            DetectionError::SpectrumLengthMismatch { expected, actual } => {
                format!("Spectrum frame must have {} bins (got {})", expected, actual)
            }
            DetectionError::SampleRateMismatch { expected, actual } => {
                format!(
                    "Sample rate changed mid-session: started at {} Hz, now {} Hz",
                    expected, actual
                )
            }
            DetectionError::InvalidConfig { field, reason } => {
                format!("Invalid configuration for {}: {}", field, reason)
            }
            DetectionError::AlreadyRunning => {
                "Detection session already running. Call stop() first.".to_string()
            }
            DetectionError::NotRunning => {
                "Detection session not running. Call start() first.".to_string()
            }
            DetectionError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            DetectionError::WorkerPanicked => "Detection worker thread panicked".to_string(),
        }
    }
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DetectionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DetectionError {}
