//! Rhyme board module
//!
//! Owns the 4x4 board: which word each row carries, which bricks are
//! broken, and how rows rotate in as the playhead completes a cycle.
//! All randomness goes through the sequencer's seeded RNG.

pub mod pool;
pub mod scheme;
pub mod sequencer;

pub use pool::{FamilyPolicy, UsedWords, draw_word};
pub use scheme::{RowTag, SchemePattern};
pub use sequencer::{
    ActiveWordPools, BrokenBricks, RhymeRow, RhymeSequencer, SequencerPhase, WordPool,
};
