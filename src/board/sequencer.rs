//! Rhyme sequencer
//!
//! The board state machine: four rows of rhyming words laid out by the active
//! scheme, the broken-brick bitmap, per-tag word pools and the used-word
//! history. `shift_board` rotates a fresh row in at the bottom each cycle.

use std::sync::Arc;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::pool::{FamilyPolicy, UsedWords, draw_word};
use super::scheme::{RowTag, SchemePattern};
use crate::catalog::RhymeCatalog;
use crate::consts::{BOARD_CELLS, BOARD_COLS, BOARD_ROWS, USED_WORD_CAPACITY};

/// One board row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RhymeRow {
    /// Unique per instantiation
    pub id: u64,
    /// Empty for filler rows
    pub word: String,
    pub tag: RowTag,
}

impl RhymeRow {
    pub fn color(&self) -> &'static str {
        self.tag.color()
    }
}

/// Broken cells of the visible 4x4 window, bit `row * 4 + col`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenBricks(u16);

impl BrokenBricks {
    pub fn from_indices(indices: &[usize]) -> Self {
        let mut bricks = Self::default();
        for &i in indices {
            bricks.break_cell(i);
        }
        bricks
    }

    /// Mark a cell broken; indices outside the window are ignored
    pub fn break_cell(&mut self, index: usize) {
        if index < BOARD_CELLS {
            self.0 |= 1 << index;
        }
    }

    pub fn is_broken(&self, index: usize) -> bool {
        index < BOARD_CELLS && self.0 & (1 << index) != 0
    }

    /// Re-index after a shift: every index moves up a row, row 0 falls off
    pub fn shift_up(&mut self) {
        self.0 >>= BOARD_COLS;
    }

    pub fn clear_row(&mut self, row: usize) {
        if row < BOARD_ROWS {
            self.0 &= !(0xF << (row * BOARD_COLS));
        }
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn indices(&self) -> Vec<usize> {
        (0..BOARD_CELLS).filter(|i| self.is_broken(*i)).collect()
    }

    pub fn grid(&self) -> [[bool; BOARD_COLS]; BOARD_ROWS] {
        let mut grid = [[false; BOARD_COLS]; BOARD_ROWS];
        for (row, cells) in grid.iter_mut().enumerate() {
            for (col, cell) in cells.iter_mut().enumerate() {
                *cell = self.is_broken(row * BOARD_COLS + col);
            }
        }
        grid
    }
}

/// Words currently feeding one tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPool {
    pub family_id: Option<String>,
    pub words: Vec<String>,
}

/// The A and B pools, refreshed at each cycle boundary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWordPools {
    pub a: WordPool,
    pub b: WordPool,
}

impl ActiveWordPools {
    pub fn get(&self, tag: RowTag) -> Option<&WordPool> {
        match tag {
            RowTag::A => Some(&self.a),
            RowTag::B => Some(&self.b),
            RowTag::X => None,
        }
    }

    fn get_mut(&mut self, tag: RowTag) -> Option<&mut WordPool> {
        match tag {
            RowTag::A => Some(&mut self.a),
            RowTag::B => Some(&mut self.b),
            RowTag::X => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequencerPhase {
    /// No rows loaded
    Idle,
    /// Four rows present
    Loaded,
}

#[derive(Debug, Clone)]
pub struct RhymeSequencer {
    catalog: Arc<RhymeCatalog>,
    scheme: SchemePattern,
    policy: FamilyPolicy,
    rng: Pcg32,
    phase: SequencerPhase,
    /// Oldest (row 0, current) first
    rows: Vec<RhymeRow>,
    bricks: BrokenBricks,
    pools: ActiveWordPools,
    /// Pattern position of the newest row
    pattern_index: usize,
    used: UsedWords,
    /// Last word drawn per pool slot in the current cycle (couplet exclusion)
    cycle_last: [Option<String>; 2],
    next_row_id: u64,
    /// Families drawn since last drained
    refreshed: Vec<String>,
}

impl RhymeSequencer {
    /// Create an idle sequencer
    pub fn new(catalog: Arc<RhymeCatalog>, scheme: SchemePattern, seed: u64) -> Self {
        Self {
            catalog,
            scheme,
            policy: FamilyPolicy::default(),
            rng: Pcg32::seed_from_u64(seed),
            phase: SequencerPhase::Idle,
            rows: Vec::with_capacity(BOARD_ROWS + 1),
            bricks: BrokenBricks::default(),
            pools: ActiveWordPools::default(),
            pattern_index: BOARD_ROWS - 1,
            used: UsedWords::new(USED_WORD_CAPACITY),
            cycle_last: [None, None],
            next_row_id: 1,
            refreshed: Vec::new(),
        }
    }

    /// Replace the history with an empty one of the given capacity
    pub fn with_used_capacity(mut self, capacity: usize) -> Self {
        self.used = UsedWords::new(capacity);
        self
    }

    pub fn with_policy(mut self, policy: FamilyPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn next_row_id(&mut self) -> u64 {
        let id = self.next_row_id;
        self.next_row_id += 1;
        id
    }

    /// Redraw the pools of every tag the scheme uses
    fn refresh_pools(&mut self) {
        for tag in [RowTag::A, RowTag::B] {
            if !self.scheme.uses(tag) {
                continue;
            }
            let family = self.policy.choose_family(&self.catalog, &mut self.rng);
            let pool = WordPool {
                family_id: Some(family.family_id.clone()),
                words: family.pool(self.policy.include_slant),
            };
            log::debug!("Pool {:?} <- family '{}'", tag, family.family_id);
            self.refreshed.push(family.family_id.clone());
            if let Some(slot) = self.pools.get_mut(tag) {
                *slot = pool;
            }
        }
        self.cycle_last = [None, None];
    }

    /// Draw the next word for a tag and record it
    fn draw_for_tag(&mut self, tag: RowTag) -> String {
        let (Some(slot), Some(pool)) = (tag.pool_slot(), self.pools.get(tag)) else {
            return String::new();
        };

        let mut word = draw_word(
            &pool.words,
            &self.used,
            self.cycle_last[slot].as_deref(),
            &mut self.rng,
        );
        if word.is_empty() {
            // Pool never loaded; fall back to the default family
            let fallback = self.catalog.default_family().words.clone();
            word = draw_word(&fallback, &self.used, None, &mut self.rng);
        }

        self.cycle_last[slot] = Some(word.clone());
        self.used.push(word.clone());
        word
    }

    /// Full (re)load: fresh pools, four rows per the pattern, no broken
    /// bricks, history holding exactly the placed words.
    pub fn load_all(&mut self) {
        self.used.clear();
        self.bricks.clear();
        self.rows.clear();
        self.refresh_pools();

        for (i, tag) in self.scheme.tags().into_iter().enumerate() {
            let word = self.draw_for_tag(tag);
            let id = self.next_row_id();
            self.rows.push(RhymeRow { id, word, tag });
            self.pattern_index = i;
        }

        self.phase = SequencerPhase::Loaded;
        log::info!(
            "Board loaded ({}): {:?}",
            self.scheme,
            self.rows.iter().map(|r| r.word.as_str()).collect::<Vec<_>>()
        );
    }

    /// Drop row 0 and append the next row of the pattern.
    pub fn shift_board(&mut self) {
        if self.phase == SequencerPhase::Idle {
            log::warn!("shift_board on an idle board, loading instead");
            self.load_all();
            return;
        }

        self.rows.remove(0);

        let next_index = (self.pattern_index + 1) % BOARD_ROWS;
        if next_index == 0 {
            self.refresh_pools();
        }

        let tag = self.scheme.tag_at(next_index);
        let word = self.draw_for_tag(tag);
        let id = self.next_row_id();
        self.rows.push(RhymeRow { id, word, tag });

        self.bricks.shift_up();
        self.pattern_index = next_index;

        log::debug!(
            "Board shifted: pattern slot {} ({:?}) -> '{}'",
            next_index,
            tag,
            self.rows[BOARD_ROWS - 1].word
        );
    }

    /// Break the cell under the playhead (row 0)
    pub fn break_brick(&mut self, column: usize) {
        if column < BOARD_COLS {
            self.bricks.break_cell(column);
        }
    }

    /// Break any visible cell
    pub fn break_cell(&mut self, index: usize) {
        self.bricks.break_cell(index);
    }

    /// Clear broken cells only
    pub fn clear_bricks(&mut self) {
        self.bricks.clear();
    }

    /// Clear all broken cells and reload the whole board
    pub fn reset_bricks(&mut self) {
        self.load_all();
    }

    /// Clear one row's broken cells and give it a different word of its tag
    pub fn reset_row(&mut self, row: usize) {
        if row >= self.rows.len() {
            return;
        }
        self.bricks.clear_row(row);

        let tag = self.rows[row].tag;
        let (Some(slot), Some(pool)) = (tag.pool_slot(), self.pools.get(tag)) else {
            return;
        };
        let current = self.rows[row].word.clone();
        let word = draw_word(&pool.words, &self.used, Some(&current), &mut self.rng);
        if word.is_empty() {
            return;
        }
        self.used.push(word.clone());
        // Couplet exclusion tracks the newest row of the tag in this cycle
        let cycle_start = (BOARD_ROWS - 1).saturating_sub(self.pattern_index);
        let newest_of_tag = !self.rows[row + 1..].iter().any(|r| r.tag == tag);
        if row >= cycle_start && newest_of_tag {
            self.cycle_last[slot] = Some(word.clone());
        }
        log::debug!("Row {} reset: '{}' -> '{}'", row, current, word);
        self.rows[row].word = word;
    }

    // === Configuration (each forces a full reload) ===

    pub fn set_scheme(&mut self, scheme: SchemePattern) {
        self.scheme = scheme;
        self.reload();
    }

    pub fn set_target_families(&mut self, ids: Vec<String>) {
        self.policy.target_ids = ids;
        self.reload();
    }

    pub fn toggle_target_family(&mut self, family_id: &str) {
        self.policy.toggle_target(family_id);
        self.reload();
    }

    pub fn set_mastery(&mut self, percentage: u8) {
        self.policy.set_mastery(percentage);
        self.reload();
    }

    pub fn set_include_slant(&mut self, include: bool) {
        self.policy.include_slant = include;
        self.reload();
    }

    fn reload(&mut self) {
        self.phase = SequencerPhase::Idle;
        self.load_all();
    }

    // === Read access ===

    pub fn row(&self, index: usize) -> Option<&RhymeRow> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[RhymeRow] {
        &self.rows
    }

    pub fn bricks(&self) -> BrokenBricks {
        self.bricks
    }

    pub fn phase(&self) -> SequencerPhase {
        self.phase
    }

    pub fn scheme(&self) -> SchemePattern {
        self.scheme
    }

    pub fn policy(&self) -> &FamilyPolicy {
        &self.policy
    }

    pub fn pools(&self) -> &ActiveWordPools {
        &self.pools
    }

    pub fn pattern_index(&self) -> usize {
        self.pattern_index
    }

    pub fn used_words(&self) -> &UsedWords {
        &self.used
    }

    pub fn catalog(&self) -> &RhymeCatalog {
        &self.catalog
    }

    /// The session RNG, for callers that must stay on the same seed
    pub fn rng_mut(&mut self) -> &mut Pcg32 {
        &mut self.rng
    }

    /// Families drawn by pool refreshes since the last call
    pub fn take_refreshed_families(&mut self) -> Vec<String> {
        std::mem::take(&mut self.refreshed)
    }
}
