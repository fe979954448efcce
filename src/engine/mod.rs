//! Engine module housing the stateful detection core.
//!
//! `Detector` runs the per-tick pipeline over one frame, `DetectionLoop`
//! wraps it in the Idle/Active lifecycle with throttling, and `runner`
//! drives a loop on a worker thread. `offline` replays recordings through
//! the same detector.

pub mod clock;
pub mod detector;
pub mod history;
pub mod offline;
pub mod runner;
pub mod session;
pub mod smoothing;
pub mod snapshot;

pub use clock::{ManualClock, SystemTimeSource, TimeSource};
pub use detector::Detector;
pub use history::PitchHistory;
pub use offline::{analyze_buffer, analyze_source, analyze_wav};
pub use runner::{start_session, start_session_with_clock, SessionHandle};
pub use session::{DetectionLoop, LoopState, TickOutcome};
pub use smoothing::{ema, smooth_formants, HeldValues, HoldState, SmoothingState};
pub use snapshot::DetectionSnapshot;
