//! Word pools: family selection policy and repeat-avoiding draws

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{RhymeCatalog, RhymeFamily};
use crate::consts::USED_WORD_CAPACITY;

/// Bounded FIFO history of words shown this session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsedWords {
    words: VecDeque<String>,
    capacity: usize,
}

impl Default for UsedWords {
    fn default() -> Self {
        Self::new(USED_WORD_CAPACITY)
    }
}

impl UsedWords {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            words: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append, evicting the oldest entries beyond capacity
    pub fn push(&mut self, word: impl Into<String>) {
        self.words.push_back(word.into());
        while self.words.len() > self.capacity {
            self.words.pop_front();
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Draw a word from `pool`, avoiding `used` and the paired `exclude` word.
///
/// Candidates are `pool \ used \ {exclude}`. When history has exhausted the
/// pool, history stops excluding anything but the paired word is still
/// avoided; a single-word pool returns that word.
pub fn draw_word<R: Rng>(
    pool: &[String],
    used: &UsedWords,
    exclude: Option<&str>,
    rng: &mut R,
) -> String {
    let not_paired = |w: &&String| exclude != Some(w.as_str());

    let mut candidates: Vec<&String> = pool
        .iter()
        .filter(|w| !used.contains(w))
        .filter(not_paired)
        .collect();
    if candidates.is_empty() {
        candidates = pool.iter().filter(not_paired).collect();
    }
    if candidates.is_empty() {
        candidates = pool.iter().collect();
    }

    match candidates.len() {
        0 => String::new(),
        n => candidates[rng.random_range(0..n)].clone(),
    }
}

/// Which family a pool refresh draws from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyPolicy {
    /// Families the player wants to practice
    pub target_ids: Vec<String>,
    /// Chance (0-100) that a refresh uses a target family
    pub mastery_percentage: u8,
    /// Union slant words into pools
    pub include_slant: bool,
}

impl FamilyPolicy {
    pub fn set_mastery(&mut self, percentage: u8) {
        self.mastery_percentage = percentage.min(100);
    }

    /// Add the id if absent, remove it if present
    pub fn toggle_target(&mut self, family_id: &str) {
        if let Some(pos) = self.target_ids.iter().position(|id| id == family_id) {
            self.target_ids.remove(pos);
        } else {
            self.target_ids.push(family_id.to_string());
        }
    }

    /// Pick a family for one pool refresh.
    ///
    /// Evaluated fresh at every refresh: with targets set and the mastery
    /// roll passing, a uniformly chosen target family (degrading to the
    /// catalog default if it is unknown or not live); otherwise a uniformly
    /// random live family.
    pub fn choose_family<'a, R: Rng>(
        &self,
        catalog: &'a RhymeCatalog,
        rng: &mut R,
    ) -> &'a RhymeFamily {
        if !self.target_ids.is_empty() {
            let roll: u8 = rng.random_range(0..100);
            if roll < self.mastery_percentage {
                let id = &self.target_ids[rng.random_range(0..self.target_ids.len())];
                return catalog.live_family_or_default(id);
            }
        }

        let families = catalog.live_families();
        match families.len() {
            0 => catalog.default_family(),
            n => &families[rng.random_range(0..n)],
        }
    }
}
