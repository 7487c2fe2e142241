//! Rhyme Board - beat-synchronized rhyme board engine
//!
//! Core modules:
//! - `catalog`: Read-only rhyme family lookup
//! - `timing`: Beat clock (BPM or analyzed beat timestamps) and tap tempo
//! - `board`: Rhyme scheme sequencing, word pools, broken bricks
//! - `playhead`: Beat-locked playhead state machine and bounce animation
//! - `session`: Session state and the controller gluing everything together
//! - `songs`: Track metadata and filename parsing
//! - `progress`: Family play-count persistence collaborator
//! - `settings`: Data-driven session configuration

pub mod board;
pub mod catalog;
pub mod error;
pub mod playhead;
pub mod progress;
pub mod session;
pub mod settings;
pub mod songs;
pub mod timing;

pub use board::{RhymeRow, RhymeSequencer, RowTag, SchemePattern};
pub use catalog::{RhymeCatalog, RhymeFamily, SyllableBucket};
pub use error::{Result, RhymeError};
pub use playhead::{ColumnLayout, PlayheadAnimator, PlayheadState};
pub use progress::{FamilyProgress, JsonProgressFile, MemoryProgress, ProgressStore};
pub use session::{SessionController, SessionEvent, SessionSnapshot, SessionState};
pub use settings::SessionSettings;
pub use songs::{Song, SongCue};
pub use timing::{BeatClock, BeatEvent, TapTempoEstimator};

/// Engine configuration constants
pub mod consts {
    /// Board geometry (fixed 4x4)
    pub const BOARD_ROWS: usize = 4;
    pub const BOARD_COLS: usize = 4;
    pub const BOARD_CELLS: usize = BOARD_ROWS * BOARD_COLS;

    /// Fallback tempo when BPM is missing, zero or not finite
    pub const DEFAULT_BPM: f64 = 90.0;

    /// Session used-word history cap (FIFO eviction)
    pub const USED_WORD_CAPACITY: usize = 50;

    /// Tap tempo window
    pub const TAP_HISTORY_LEN: usize = 4;
    /// Minimum spacing between accepted taps
    pub const TAP_DEBOUNCE_MS: f64 = 200.0;

    /// Beats of countdown before a song's drop
    pub const COUNTDOWN_BEATS: usize = 4;

    /// Bounce peak height, in row heights
    pub const BOUNCE_PEAK: f32 = 0.5;
    /// Downbeats bounce higher
    pub const DOWNBEAT_BOUNCE_SCALE: f32 = 1.5;

    /// Width share of the active (word) column; the rest split the remainder
    pub const ACTIVE_COLUMN_SHARE: f32 = 0.4;
}

/// Quadratic ease-out, `t` in [0, 1]
#[inline]
pub fn ease_out_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

/// Quadratic ease-in, `t` in [0, 1]
#[inline]
pub fn ease_in_quad(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t
}

/// Sanitize a tempo, falling back to [`consts::DEFAULT_BPM`]
#[inline]
pub fn sanitize_bpm(bpm: f64) -> f64 {
    if bpm.is_finite() && bpm > 0.0 {
        bpm
    } else {
        consts::DEFAULT_BPM
    }
}
