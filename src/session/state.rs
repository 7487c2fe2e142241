//! Session state, events and the render snapshot
//!
//! Everything a running session owns lives in [`SessionState`]; there is no
//! ambient global. The UI observes it through [`SessionSnapshot`] and the
//! drained [`SessionEvent`] queue.

use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::board::{FamilyPolicy, RhymeSequencer, RowTag, SchemePattern};
use crate::catalog::RhymeCatalog;
use crate::consts::{BOARD_COLS, BOARD_ROWS};
use crate::playhead::{ColumnLayout, PlayheadAnimator};
use crate::settings::SessionSettings;
use crate::songs::{Song, SongCue};
use crate::timing::{BeatClock, TapTempoEstimator};

/// Something the UI may want to react to (sound, flash, toast)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Playhead entered a beat
    BeatHit {
        beat: usize,
        column: usize,
        downbeat: bool,
    },
    /// A new row rotated in
    BoardShifted { beat: usize },
    /// Whole board regenerated (scheme/target/mastery change or reset)
    BoardReloaded,
    TempoChanged { bpm: f64 },
    /// Beats left until the song's drop (1..=countdown)
    Countdown { beats_remaining: usize },
    /// The drop beat itself
    Drop { beat: usize },
    /// Beat cycle restarted from the stored beat
    Resynced { beat: usize },
    /// A song was selected; the audio layer should seek to the cue
    SongCued { cue: SongCue },
    /// Beat data ran out
    Ended { beat: usize },
    /// The audio layer failed; playback stopped
    PlaybackFailed { reason: String },
}

/// Everything owned by one practice session
#[derive(Debug, Clone)]
pub struct SessionState {
    pub settings: SessionSettings,
    pub clock: BeatClock,
    pub tap: TapTempoEstimator,
    pub sequencer: RhymeSequencer,
    pub playhead: PlayheadAnimator,
    /// Single source of truth for the active (word) column
    pub layout: ColumnLayout,
    pub song: Option<Song>,
    pub cue: Option<SongCue>,
    /// Time of the last accepted tap, for debouncing
    pub last_tap_ms: Option<f64>,
    /// Latest time seen by any timed command
    pub now_ms: f64,
    /// Pending events (newest last)
    pub events: Vec<SessionEvent>,
}

impl SessionState {
    /// Build a session and load the initial board
    pub fn new(catalog: Arc<RhymeCatalog>, settings: SessionSettings) -> Self {
        let settings = settings.sanitized();
        let seed = settings.seed.unwrap_or_else(rand::random);
        log::info!("New session (seed {seed}, scheme {})", settings.scheme);

        let policy = FamilyPolicy {
            target_ids: settings.target_family_ids.clone(),
            mastery_percentage: settings.mastery_percentage,
            include_slant: settings.include_slant_words,
        };
        let mut sequencer = RhymeSequencer::new(catalog, settings.scheme, seed)
            .with_used_capacity(settings.used_word_capacity)
            .with_policy(policy);
        sequencer.load_all();

        Self {
            clock: BeatClock::from_bpm(settings.default_bpm),
            tap: TapTempoEstimator::new(),
            sequencer,
            playhead: PlayheadAnimator::new(settings.bounce_peak, settings.downbeat_bounce_scale)
                .with_countdown_beats(settings.countdown_beats),
            layout: ColumnLayout::new(settings.active_column),
            song: None,
            cue: None,
            last_tap_ms: None,
            now_ms: 0.0,
            events: Vec::new(),
            settings,
        }
    }

    /// Record a timed command's clock, never moving backwards
    pub fn observe_time(&mut self, now_ms: f64) {
        if now_ms.is_finite() && now_ms > self.now_ms {
            self.now_ms = now_ms;
        }
    }

    /// Beats until the drop as seen on the current beat
    pub fn countdown(&self) -> Option<Countdown> {
        let beat = self.playhead.current_beat();
        match self.clock.beats_until_drop(beat)? {
            0 => Some(Countdown::Drop),
            n if n <= self.settings.countdown_beats => Some(Countdown::BeatsRemaining(n)),
            _ => None,
        }
    }

    pub fn snapshot(&self, now_ms: f64) -> SessionSnapshot {
        let rows = self
            .sequencer
            .rows()
            .iter()
            .map(|row| RowView {
                id: row.id,
                word: row.word.clone(),
                tag: row.tag,
                color: row.color().to_string(),
            })
            .collect();

        SessionSnapshot {
            rows,
            broken: self.sequencer.bricks().grid(),
            active_column: self.layout.active_column,
            playhead: self.playhead.position(now_ms, &self.layout),
            current_beat: self.playhead.current_beat(),
            bpm: self.clock.bpm(),
            is_playing: self.playhead.is_running(),
            countdown: self.countdown(),
            scheme: self.sequencer.scheme(),
        }
    }
}

/// Countdown indicator into a song's drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Countdown {
    BeatsRemaining(usize),
    Drop,
}

/// One row as the renderer sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowView {
    pub id: u64,
    pub word: String,
    pub tag: RowTag,
    pub color: String,
}

/// Render-facing copy of the board and playhead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Row 0 (current) first
    pub rows: Vec<RowView>,
    pub broken: [[bool; BOARD_COLS]; BOARD_ROWS],
    pub active_column: usize,
    /// x: fraction of board width, y: bounce in row heights (negative is up)
    pub playhead: Vec2,
    pub current_beat: usize,
    pub bpm: f64,
    pub is_playing: bool,
    pub countdown: Option<Countdown>,
    pub scheme: SchemePattern,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
