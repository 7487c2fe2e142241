//! Track metadata
//!
//! Songs either carry analyzed beat timestamps (timeline mode) or only a BPM
//! (tempo mode). The drop time anchors the countdown cue.

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_BPM;
use crate::error::{Result, RhymeError};

/// A selectable track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub bpm: f64,
    /// Analyzed beat timestamps (seconds, ascending)
    #[serde(default)]
    pub beats: Vec<f64>,
    /// Subset of `beats` flagged as downbeats
    #[serde(default)]
    pub downbeats: Vec<f64>,
    /// When the main section starts (seconds)
    pub beat_drop_time: f64,
    /// Track length (seconds)
    pub duration: f64,
    #[serde(default)]
    pub filename: Option<String>,
}

impl Song {
    /// Tempo-only track
    pub fn with_bpm(id: &str, title: &str, bpm: f64, beat_drop_time: f64, duration: f64) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            bpm,
            beats: Vec::new(),
            downbeats: Vec::new(),
            beat_drop_time,
            duration,
            filename: Some(format!("{id}.mp3")),
        }
    }

    /// Attach analyzed beats
    pub fn with_beats(mut self, beats: Vec<f64>, downbeats: Vec<f64>) -> Self {
        self.beats = beats;
        self.downbeats = downbeats;
        self
    }

    /// Parse metadata from a filename, falling back to defaults when the
    /// name carries none.
    pub fn from_filename_or_default(filename: &str) -> Self {
        match parse_song_filename(filename) {
            Ok(song) => song,
            Err(e) => {
                log::warn!("{e}");
                let clean = base_name(filename);
                Self {
                    id: slug(clean),
                    title: clean.to_string(),
                    bpm: DEFAULT_BPM,
                    beats: Vec::new(),
                    downbeats: Vec::new(),
                    beat_drop_time: 0.0,
                    duration: 0.0,
                    filename: Some(clean.to_string()),
                }
            }
        }
    }
}

/// Where to start the playhead and the audio for a countdown into the drop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SongCue {
    /// Beat index the playhead starts from
    pub start_beat: usize,
    /// Beat index of the drop
    pub drop_beat: usize,
    /// Audio seek position (seconds)
    pub seek_seconds: f64,
}

/// Built-in tracks
pub fn builtin_songs() -> Vec<Song> {
    vec![
        Song::with_bpm("are_we_cooked", "Are We Cooked", 96.0, 20.1, 201.0),
        Song::with_bpm("beep_boo_boo_bop", "Beep Boo Boo Bop", 140.0, 13.9, 181.7),
        Song::with_bpm("bop_squad", "Bop Squad", 87.5, 11.4, 187.0),
        Song::with_bpm("chillaxin", "Chillaxin", 91.4, 21.0, 209.8),
    ]
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

/// `MM;SS.s` -> seconds
fn parse_timestamp(token: &str) -> Option<f64> {
    let (minutes, seconds) = token.split_once(';')?;
    if minutes.len() != 2 || !minutes.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (whole, frac) = seconds.split_once('.')?;
    if whole.len() != 2 || frac.is_empty() {
        return None;
    }
    let minutes: f64 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    Some(minutes * 60.0 + seconds)
}

/// Parse `"Title (87.5 BPM - 00;11.4 - 03;07.0).mp3"`.
///
/// Separators between the BPM and the two timestamps are optional spaces
/// and hyphens, and `BPM` may follow the number without a space.
pub fn parse_song_filename(filename: &str) -> Result<Song> {
    let clean = base_name(filename);
    let err = || RhymeError::SongFilename(clean.to_string());

    let split = clean.len().checked_sub(4).ok_or_else(err)?;
    let stem = clean.get(..split).ok_or_else(err)?;
    if !clean[split..].eq_ignore_ascii_case(".mp3") {
        return Err(err());
    }
    let inner_end = stem.strip_suffix(')').ok_or_else(err)?;
    let open = inner_end.rfind('(').ok_or_else(err)?;
    let title = inner_end[..open].trim();
    let meta = &inner_end[open + 1..];

    let bpm_pos = meta
        .as_bytes()
        .windows(3)
        .position(|w| w.eq_ignore_ascii_case(b"BPM"))
        .ok_or_else(err)?;
    let bpm_token = meta[..bpm_pos].trim();
    if bpm_token.is_empty() || !bpm_token.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return Err(err());
    }
    let bpm: f64 = bpm_token.parse().map_err(|_| err())?;

    let times: Vec<f64> = meta[bpm_pos + 3..]
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|t| !t.is_empty())
        .map(parse_timestamp)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(err)?;
    let [start, end] = times[..] else {
        return Err(err());
    };

    Ok(Song {
        id: slug(title),
        title: title.to_string(),
        bpm,
        beats: Vec::new(),
        downbeats: Vec::new(),
        beat_drop_time: start,
        duration: end,
        filename: Some(clean.to_string()),
    })
}
