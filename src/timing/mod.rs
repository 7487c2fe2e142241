//! Timing module
//!
//! Beat grid derived from a fixed BPM or analyzed beat timestamps, plus tap
//! tempo estimation. Pure: time always enters as an explicit argument.

pub mod clock;
pub mod tap;

pub use clock::{BeatClock, BeatEvent, BeatSource};
pub use tap::TapTempoEstimator;
