//! Session settings
//!
//! Persisted as JSON next to the progress file. Every field has a default so
//! partial documents load.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::board::SchemePattern;
use crate::consts::{
    BOUNCE_PEAK, COUNTDOWN_BEATS, DEFAULT_BPM, DOWNBEAT_BOUNCE_SCALE, TAP_DEBOUNCE_MS,
    USED_WORD_CAPACITY,
};
use crate::error::Result;
use crate::sanitize_bpm;

/// Session settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    // === Timing ===
    /// Tempo used without song beat data
    pub default_bpm: f64,
    /// Minimum spacing between accepted taps (ms)
    pub tap_debounce_ms: f64,
    /// Beats of countdown before a song's drop
    pub countdown_beats: usize,

    // === Board ===
    pub scheme: SchemePattern,
    /// Chance (0-100) that a pool refresh uses a target family
    pub mastery_percentage: u8,
    /// Families to practice
    pub target_family_ids: Vec<String>,
    /// Union slant words into pools
    pub include_slant_words: bool,
    /// Session used-word history cap
    pub used_word_capacity: usize,
    /// Initial active (word) column
    pub active_column: usize,

    // === Animation ===
    /// Bounce peak, in row heights
    pub bounce_peak: f32,
    /// Downbeat bounce multiplier
    pub downbeat_bounce_scale: f32,

    /// Fixed RNG seed (random per session when absent)
    pub seed: Option<u64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_bpm: DEFAULT_BPM,
            tap_debounce_ms: TAP_DEBOUNCE_MS,
            countdown_beats: COUNTDOWN_BEATS,

            scheme: SchemePattern::Aabb,
            mastery_percentage: 0,
            target_family_ids: Vec::new(),
            include_slant_words: false,
            used_word_capacity: USED_WORD_CAPACITY,
            active_column: 3,

            bounce_peak: BOUNCE_PEAK,
            downbeat_bounce_scale: DOWNBEAT_BOUNCE_SCALE,

            seed: None,
        }
    }
}

impl SessionSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let settings = Self::from_json_str(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings, using defaults when the file is missing or unreadable
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("Using default settings");
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring settings file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Clamp out-of-range values into their valid ranges
    pub fn sanitized(mut self) -> Self {
        self.default_bpm = sanitize_bpm(self.default_bpm);
        if !self.tap_debounce_ms.is_finite() || self.tap_debounce_ms < 0.0 {
            self.tap_debounce_ms = TAP_DEBOUNCE_MS;
        }
        self.mastery_percentage = self.mastery_percentage.min(100);
        self.used_word_capacity = self.used_word_capacity.max(1);
        self.active_column = self.active_column.min(3);
        if !self.bounce_peak.is_finite() || self.bounce_peak < 0.0 {
            self.bounce_peak = BOUNCE_PEAK;
        }
        if !self.downbeat_bounce_scale.is_finite() || self.downbeat_bounce_scale < 0.0 {
            self.downbeat_bounce_scale = DOWNBEAT_BOUNCE_SCALE;
        }
        self
    }
}
