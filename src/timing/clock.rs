//! Beat clock
//!
//! Converts either a fixed BPM or an analyzed list of beat timestamps into
//! per-beat durations, downbeat flags and end-of-song detection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::consts::BOARD_COLS;
use crate::sanitize_bpm;
use crate::songs::{Song, SongCue};

/// Timestamps closer than this are the same beat (seconds)
const BEAT_MATCH_EPSILON_S: f64 = 1e-3;

/// One beat of the grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    pub beat_array_index: usize,
    pub duration_ms: f64,
    pub is_downbeat: bool,
}

/// Where beat timing comes from
#[derive(Debug, Clone, PartialEq)]
pub enum BeatSource {
    /// Fixed tempo, loops forever
    Tempo { bpm: f64 },
    /// Analyzed beat timestamps (seconds, ascending); downbeats keyed in microseconds
    Timeline {
        beats: Vec<f64>,
        downbeats: BTreeSet<i64>,
    },
}

#[inline]
fn micros(seconds: f64) -> i64 {
    (seconds * 1_000_000.0).round() as i64
}

/// Beat grid with fallback tempo and optional drop marker
#[derive(Debug, Clone)]
pub struct BeatClock {
    source: BeatSource,
    /// Used whenever beat data cannot answer
    fallback_bpm: f64,
    /// Beat index of the song's drop, if a song is cued
    drop_beat: Option<usize>,
}

impl Default for BeatClock {
    fn default() -> Self {
        Self::from_bpm(crate::consts::DEFAULT_BPM)
    }
}

impl BeatClock {
    /// Fixed tempo clock; invalid BPM falls back to the default
    pub fn from_bpm(bpm: f64) -> Self {
        let bpm = sanitize_bpm(bpm);
        Self {
            source: BeatSource::Tempo { bpm },
            fallback_bpm: bpm,
            drop_beat: None,
        }
    }

    /// Timeline clock. Fewer than two beats is treated as no beat data.
    pub fn from_beats(beats: Vec<f64>, downbeats: &[f64], fallback_bpm: f64) -> Self {
        let fallback_bpm = sanitize_bpm(fallback_bpm);
        if beats.len() < 2 {
            log::warn!(
                "Degenerate beat data ({} beats), using {} BPM",
                beats.len(),
                fallback_bpm
            );
            return Self::from_bpm(fallback_bpm);
        }

        Self {
            source: BeatSource::Timeline {
                beats,
                downbeats: downbeats.iter().map(|t| micros(*t)).collect(),
            },
            fallback_bpm,
            drop_beat: None,
        }
    }

    /// Clock for a song: timeline when it carries beats, tempo otherwise
    pub fn from_song(song: &Song) -> Self {
        Self::from_beats(song.beats.clone(), &song.downbeats, song.bpm)
    }

    pub fn source(&self) -> &BeatSource {
        &self.source
    }

    pub fn is_timeline(&self) -> bool {
        matches!(self.source, BeatSource::Timeline { .. })
    }

    /// Current tempo (fallback tempo in timeline mode)
    pub fn bpm(&self) -> f64 {
        match self.source {
            BeatSource::Tempo { bpm } => bpm,
            BeatSource::Timeline { .. } => self.fallback_bpm,
        }
    }

    /// Change the tempo. Timeline clocks only update their fallback.
    pub fn set_bpm(&mut self, bpm: f64) {
        let bpm = sanitize_bpm(bpm);
        self.fallback_bpm = bpm;
        if let BeatSource::Tempo { bpm: current } = &mut self.source {
            *current = bpm;
        }
    }

    fn fallback_duration_ms(&self) -> f64 {
        60_000.0 / self.fallback_bpm
    }

    pub fn duration_ms(&self, index: usize) -> f64 {
        match &self.source {
            BeatSource::Tempo { bpm } => 60_000.0 / bpm,
            BeatSource::Timeline { beats, .. } => {
                // Past the last interval, hold the last known spacing
                let i = index.min(beats.len() - 2);
                let ms = (beats[i + 1] - beats[i]) * 1000.0;
                if ms.is_finite() && ms > 0.0 {
                    ms
                } else {
                    self.fallback_duration_ms()
                }
            }
        }
    }

    pub fn is_downbeat(&self, index: usize) -> bool {
        match &self.source {
            BeatSource::Tempo { .. } => false,
            BeatSource::Timeline { beats, downbeats } => beats
                .get(index)
                .is_some_and(|t| downbeats.contains(&micros(*t))),
        }
    }

    /// True on the last beat interval of a timeline: `beats[index + 1]` is
    /// the final timestamp, so the song ends when this beat completes.
    pub fn is_terminal(&self, index: usize) -> bool {
        match &self.source {
            BeatSource::Tempo { .. } => false,
            BeatSource::Timeline { beats, .. } => index + 2 >= beats.len(),
        }
    }

    pub fn event(&self, index: usize) -> BeatEvent {
        BeatEvent {
            beat_array_index: index,
            duration_ms: self.duration_ms(index),
            is_downbeat: self.is_downbeat(index),
        }
    }

    pub fn drop_beat(&self) -> Option<usize> {
        self.drop_beat
    }

    pub fn clear_drop(&mut self) {
        self.drop_beat = None;
    }

    /// Beats left before the drop (0 on the drop beat, None once past it)
    pub fn beats_until_drop(&self, index: usize) -> Option<usize> {
        self.drop_beat.and_then(|drop| drop.checked_sub(index))
    }

    /// Cue a countdown of up to `countdown_beats` beats before the drop.
    ///
    /// Records the drop beat and returns where the playhead should start and
    /// where the audio should seek. In tempo mode the drop lands on column 0.
    pub fn cue_drop(&mut self, drop_time_s: f64, countdown_beats: usize) -> SongCue {
        let drop_time_s = if drop_time_s.is_finite() {
            drop_time_s.max(0.0)
        } else {
            0.0
        };

        let cue = match &self.source {
            BeatSource::Tempo { bpm } => {
                let beat_len_s = 60.0 / bpm;
                let fit = (drop_time_s / beat_len_s + 1e-9).floor() as usize;
                let beats_before = fit.min(countdown_beats);
                let drop_beat = beats_before.div_ceil(BOARD_COLS) * BOARD_COLS;
                SongCue {
                    start_beat: drop_beat - beats_before,
                    drop_beat,
                    seek_seconds: (drop_time_s - beats_before as f64 * beat_len_s).max(0.0),
                }
            }
            BeatSource::Timeline { beats, .. } => {
                let drop_beat = beats
                    .iter()
                    .position(|t| *t >= drop_time_s - BEAT_MATCH_EPSILON_S)
                    .unwrap_or(beats.len() - 1);
                let start_beat = drop_beat.saturating_sub(countdown_beats);
                SongCue {
                    start_beat,
                    drop_beat,
                    seek_seconds: beats[start_beat],
                }
            }
        };

        log::debug!(
            "Cued drop at beat {} (start beat {}, seek {:.3}s)",
            cue.drop_beat,
            cue.start_beat,
            cue.seek_seconds
        );
        self.drop_beat = Some(cue.drop_beat);
        cue
    }
}
