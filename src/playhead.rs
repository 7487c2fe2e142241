//! Playhead animator
//!
//! Moves the marker across the four columns in lockstep with the beat clock.
//! Each beat snaps the playhead to its column, breaks the brick underneath,
//! and on the last column rotates the board. The in-flight beat is a single
//! cancellable [`BeatTimer`]; every restart bumps the generation so a stale
//! handle can never fire.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::board::RhymeSequencer;
use crate::consts::{
    ACTIVE_COLUMN_SHARE, BOARD_COLS, BOUNCE_PEAK, COUNTDOWN_BEATS, DOWNBEAT_BOUNCE_SCALE,
};
use crate::session::SessionEvent;
use crate::timing::BeatClock;
use crate::{ease_in_quad, ease_out_quad};

/// Expired beats processed per `advance` before re-anchoring at `now`
pub const MAX_CATCH_UP_BEATS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayheadState {
    /// Parked over column 0 of row 0
    Stopped,
    /// Advancing beat by beat
    Running,
}

/// The scheduled end of the beat in flight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatTimer {
    pub generation: u64,
    pub beat_index: usize,
    pub column: usize,
    pub started_at_ms: f64,
    pub duration_ms: f64,
    pub downbeat: bool,
    /// Last beat of the song: stop instead of continuing
    pub terminal: bool,
}

impl BeatTimer {
    pub fn deadline_ms(&self) -> f64 {
        self.started_at_ms + self.duration_ms
    }

    /// Fraction of the beat elapsed, clamped to [0, 1]
    pub fn progress(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        ((now_ms - self.started_at_ms) / self.duration_ms).clamp(0.0, 1.0) as f32
    }
}

/// Horizontal column layout: the active (word) column is wider.
///
/// Both row rendering and the playhead read column geometry from here, so
/// the active column has one source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    pub active_column: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            active_column: BOARD_COLS - 1,
        }
    }
}

impl ColumnLayout {
    pub fn new(active_column: usize) -> Self {
        Self {
            active_column: active_column.min(BOARD_COLS - 1),
        }
    }

    /// Width of a column as a fraction of the board width
    pub fn width(&self, column: usize) -> f32 {
        if column == self.active_column {
            ACTIVE_COLUMN_SHARE
        } else {
            (1.0 - ACTIVE_COLUMN_SHARE) / (BOARD_COLS - 1) as f32
        }
    }

    /// Center of a column as a fraction of the board width
    pub fn center(&self, column: usize) -> f32 {
        let column = column.min(BOARD_COLS - 1);
        let left: f32 = (0..column).map(|c| self.width(c)).sum();
        left + self.width(column) / 2.0
    }
}

/// Map a horizontal drag position to a column (equal quarters, clamped)
pub fn column_from_drag(x: f32, width: f32) -> usize {
    if width <= 0.0 || !width.is_finite() || !x.is_finite() {
        return 0;
    }
    let col_width = width / BOARD_COLS as f32;
    ((x / col_width).floor().max(0.0) as usize).min(BOARD_COLS - 1)
}

#[derive(Debug, Clone)]
pub struct PlayheadAnimator {
    state: PlayheadState,
    timer: Option<BeatTimer>,
    generation: u64,
    /// Absolute beat array index of the current/last beat
    current_beat: usize,
    /// Beat whose side effects already fired
    last_hit: Option<usize>,
    bounce_peak: f32,
    downbeat_scale: f32,
    /// Countdown events start this many beats before the drop
    countdown_beats: usize,
}

impl Default for PlayheadAnimator {
    fn default() -> Self {
        Self::new(BOUNCE_PEAK, DOWNBEAT_BOUNCE_SCALE)
    }
}

impl PlayheadAnimator {
    pub fn new(bounce_peak: f32, downbeat_scale: f32) -> Self {
        Self {
            state: PlayheadState::Stopped,
            timer: None,
            generation: 0,
            current_beat: 0,
            last_hit: None,
            bounce_peak,
            downbeat_scale,
            countdown_beats: COUNTDOWN_BEATS,
        }
    }

    pub fn with_countdown_beats(mut self, beats: usize) -> Self {
        self.countdown_beats = beats;
        self
    }

    pub fn state(&self) -> PlayheadState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PlayheadState::Running
    }

    pub fn current_beat(&self) -> usize {
        self.current_beat
    }

    pub fn current_column(&self) -> usize {
        self.current_beat % BOARD_COLS
    }

    pub fn timer(&self) -> Option<&BeatTimer> {
        self.timer.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop the in-flight timer; any handle issued before is now stale
    fn cancel(&mut self) {
        self.timer = None;
        self.generation += 1;
    }

    /// Jump to a beat without firing anything; its side effects will fire
    /// when it next begins.
    pub fn set_current_beat(&mut self, beat: usize) {
        self.current_beat = beat;
        self.last_hit = None;
    }

    /// Start (or restart) from the stored beat index
    pub fn play(
        &mut self,
        now_ms: f64,
        clock: &BeatClock,
        sequencer: &mut RhymeSequencer,
        events: &mut Vec<SessionEvent>,
    ) {
        self.cancel();
        self.state = PlayheadState::Running;
        log::info!("Playhead running from beat {}", self.current_beat);
        self.begin_beat(self.current_beat, now_ms, clock, sequencer, events);
    }

    /// Stop immediately and park
    pub fn stop(&mut self) {
        self.cancel();
        if self.state == PlayheadState::Running {
            log::info!("Playhead stopped at beat {}", self.current_beat);
        }
        self.state = PlayheadState::Stopped;
    }

    /// Restart the cycle cleanly from the stored beat index.
    ///
    /// Idempotent: the beat's side effects already fired, so only the timer
    /// is re-anchored at `now_ms`.
    pub fn resync(
        &mut self,
        now_ms: f64,
        clock: &BeatClock,
        sequencer: &mut RhymeSequencer,
        events: &mut Vec<SessionEvent>,
    ) {
        self.cancel();
        events.push(SessionEvent::Resynced {
            beat: self.current_beat,
        });
        if self.state == PlayheadState::Running {
            self.begin_beat(self.current_beat, now_ms, clock, sequencer, events);
        }
    }

    /// Resync onto the column of a tapped brick, keeping the absolute beat
    /// position within the current cycle. Column 0 clears broken bricks.
    pub fn sync_to_beat(
        &mut self,
        brick_index: usize,
        now_ms: f64,
        clock: &BeatClock,
        sequencer: &mut RhymeSequencer,
        events: &mut Vec<SessionEvent>,
    ) {
        let column = brick_index % BOARD_COLS;
        let target = self.current_beat - self.current_column() + column;
        log::debug!("Sync to brick {} -> beat {}", brick_index, target);

        if column == 0 {
            sequencer.clear_bricks();
        }
        if target != self.current_beat {
            self.set_current_beat(target);
        }
        self.resync(now_ms, clock, sequencer, events);
    }

    /// Fire every expired timer up to `now_ms`
    pub fn advance(
        &mut self,
        now_ms: f64,
        clock: &BeatClock,
        sequencer: &mut RhymeSequencer,
        events: &mut Vec<SessionEvent>,
    ) {
        let mut fired = 0;
        while let Some(timer) = self.timer {
            if now_ms < timer.deadline_ms() {
                break;
            }
            if timer.terminal {
                self.cancel();
                self.state = PlayheadState::Stopped;
                log::info!("Beat data ended at beat {}", timer.beat_index);
                events.push(SessionEvent::Ended {
                    beat: timer.beat_index,
                });
                break;
            }

            // Next beat starts exactly at the previous deadline
            let mut start = timer.deadline_ms();
            fired += 1;
            if fired > MAX_CATCH_UP_BEATS {
                log::debug!("Playhead fell behind, re-anchoring at {:.1}ms", now_ms);
                start = now_ms;
            }
            self.begin_beat(timer.beat_index + 1, start, clock, sequencer, events);
            if fired > MAX_CATCH_UP_BEATS {
                break;
            }
        }
    }

    /// A host timer delivered `handle`. Handles issued before the last
    /// restart are stale and ignored; a current one fires every beat due by
    /// `now_ms`. Returns whether the handle was accepted.
    pub fn fire_timer(
        &mut self,
        handle: &BeatTimer,
        now_ms: f64,
        clock: &BeatClock,
        sequencer: &mut RhymeSequencer,
        events: &mut Vec<SessionEvent>,
    ) -> bool {
        if handle.generation != self.generation {
            log::debug!(
                "Ignoring stale beat timer (generation {} != {})",
                handle.generation,
                self.generation
            );
            return false;
        }
        self.advance(now_ms, clock, sequencer, events);
        true
    }

    /// Enter beat `beat`: snap, fire side effects once, schedule its end
    fn begin_beat(
        &mut self,
        beat: usize,
        started_at_ms: f64,
        clock: &BeatClock,
        sequencer: &mut RhymeSequencer,
        events: &mut Vec<SessionEvent>,
    ) {
        let column = beat % BOARD_COLS;
        let event = clock.event(beat);
        self.current_beat = beat;

        if self.last_hit != Some(beat) {
            self.last_hit = Some(beat);
            sequencer.break_brick(column);
            events.push(SessionEvent::BeatHit {
                beat,
                column,
                downbeat: event.is_downbeat,
            });

            match clock.beats_until_drop(beat) {
                Some(0) => events.push(SessionEvent::Drop { beat }),
                Some(n) if n <= self.countdown_beats => {
                    events.push(SessionEvent::Countdown { beats_remaining: n })
                }
                _ => {}
            }

            // Last column: the new row must be in before the playhead wraps
            if column == BOARD_COLS - 1 {
                sequencer.shift_board();
                events.push(SessionEvent::BoardShifted { beat });
            }
        }

        self.timer = Some(BeatTimer {
            generation: self.generation,
            beat_index: beat,
            column,
            started_at_ms,
            duration_ms: event.duration_ms,
            downbeat: event.is_downbeat,
            terminal: clock.is_terminal(beat),
        });
    }

    /// Playhead position: x as a fraction of board width, y as a bounce
    /// offset in row heights (negative is up).
    pub fn position(&self, now_ms: f64, layout: &ColumnLayout) -> Vec2 {
        let timer = match (&self.state, &self.timer) {
            (PlayheadState::Running, Some(timer)) => timer,
            _ => return Vec2::new(layout.center(0), 0.0),
        };

        let t = timer.progress(now_ms);
        let from = layout.center(timer.column);
        let to = layout.center((timer.column + 1) % BOARD_COLS);
        let x = from + (to - from) * t;

        let peak = if timer.downbeat {
            -self.bounce_peak * self.downbeat_scale
        } else {
            -self.bounce_peak
        };
        let y = if t < 0.5 {
            peak * ease_out_quad(t * 2.0)
        } else {
            peak * (1.0 - ease_in_quad((t - 0.5) * 2.0))
        };

        Vec2::new(x, y)
    }
}
