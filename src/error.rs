//! Error taxonomy
//!
//! Generation and timing problems never reach this type: they degrade to a
//! safe fallback inside the engine. What remains are construction-time
//! failures (bad catalog/settings/progress data) and playback failures
//! reported by the audio layer.

/// Crate result alias
pub type Result<T> = std::result::Result<T, RhymeError>;

#[derive(Debug, thiserror::Error)]
pub enum RhymeError {
    /// Catalog has no usable one-syllable family
    #[error("rhyme catalog has no usable one-syllable families")]
    EmptyCatalog,
    /// Scheme name outside AABB/AAAA/ABAB/AXBX/XAXB
    #[error("unknown rhyme scheme '{0}'")]
    UnknownScheme(String),
    /// No built-in song with this id
    #[error("unknown song '{0}'")]
    UnknownSong(String),
    /// Song filename does not carry `(BPM - MM;SS.s - MM;SS.s)` metadata
    #[error("could not parse song filename '{0}'")]
    SongFilename(String),
    /// Audio/video layer reported a failure; playback was stopped
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
