// Voice HUD Core - real-time vocal analysis engine
// Pitch, formant and voicing detection with smoothing and hold for live feedback

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;

// Re-exports for convenience
pub use analysis::{
    adaptive_threshold, describe_resonance, detect_formants, detect_pitch,
    frequency_to_note_name, is_voiced, root_mean_square, Formants, Locale, VoiceRange,
};
pub use audio::{AudioSource, SourceFrame};
pub use config::AppConfig;
pub use engine::{
    analyze_buffer, start_session, DetectionLoop, DetectionSnapshot, HoldState, SessionHandle,
    TickOutcome,
};
pub use error::{AudioError, DetectionError, ErrorCode};
