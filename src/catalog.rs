//! Rhyme catalog
//!
//! Read-only lookup of rhyme families grouped by syllable count. Only the
//! one-syllable bucket feeds live board generation; the other buckets back
//! the dictionary browser.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RhymeError};

/// Built-in rhyme data set
const BUILTIN_CATALOG_JSON: &str = include_str!("data/rhyme_families.json");

/// Syllable-count grouping of families
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SyllableBucket {
    One,
    Two,
    Three,
    FourPlus,
}

impl SyllableBucket {
    pub const ALL: [SyllableBucket; 4] = [
        SyllableBucket::One,
        SyllableBucket::Two,
        SyllableBucket::Three,
        SyllableBucket::FourPlus,
    ];

    /// Bucket for a syllable count (4 and above share a bucket)
    pub fn from_count(syllables: usize) -> Option<Self> {
        match syllables {
            1 => Some(SyllableBucket::One),
            2 => Some(SyllableBucket::Two),
            3 => Some(SyllableBucket::Three),
            n if n >= 4 => Some(SyllableBucket::FourPlus),
            _ => None,
        }
    }
}

/// A set of words sharing a rhyme sound
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RhymeFamily {
    pub family_id: String,
    pub label: String,
    pub words: Vec<String>,
    /// Imperfect/near rhymes
    #[serde(default)]
    pub slant_words: Vec<String>,
}

impl RhymeFamily {
    pub fn new(family_id: impl Into<String>, label: impl Into<String>, words: &[&str]) -> Self {
        Self {
            family_id: family_id.into(),
            label: label.into(),
            words: words.iter().map(|w| w.to_string()).collect(),
            slant_words: Vec::new(),
        }
    }

    /// Word pool for this family, optionally unioned with slant words
    pub fn pool(&self, include_slant: bool) -> Vec<String> {
        let mut pool = self.words.clone();
        if include_slant {
            for word in &self.slant_words {
                if !pool.contains(word) {
                    pool.push(word.clone());
                }
            }
        }
        pool
    }
}

/// On-disk catalog document
#[derive(Debug, Default, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    syllable_1_families: Vec<RhymeFamily>,
    #[serde(default)]
    syllable_2_families: Vec<RhymeFamily>,
    #[serde(default)]
    syllable_3_families: Vec<RhymeFamily>,
    #[serde(default)]
    syllable_4_plus_families: Vec<RhymeFamily>,
}

/// Typed family lookup keyed by [`SyllableBucket`]
#[derive(Debug, Clone)]
pub struct RhymeCatalog {
    buckets: BTreeMap<SyllableBucket, Vec<RhymeFamily>>,
}

impl RhymeCatalog {
    /// Build a catalog. Families without words are dropped; at least one
    /// one-syllable family must remain.
    pub fn new(buckets: BTreeMap<SyllableBucket, Vec<RhymeFamily>>) -> Result<Self> {
        let mut cleaned = BTreeMap::new();
        for (bucket, families) in buckets {
            let kept: Vec<RhymeFamily> = families
                .into_iter()
                .filter(|f| {
                    if f.words.is_empty() {
                        log::warn!("Dropping empty rhyme family '{}'", f.family_id);
                        false
                    } else {
                        true
                    }
                })
                .collect();
            cleaned.insert(bucket, kept);
        }

        let has_live = cleaned
            .get(&SyllableBucket::One)
            .is_some_and(|families| !families.is_empty());
        if !has_live {
            return Err(RhymeError::EmptyCatalog);
        }

        Ok(Self { buckets: cleaned })
    }

    /// Catalog containing only one-syllable families
    pub fn from_families(families: Vec<RhymeFamily>) -> Result<Self> {
        let mut buckets = BTreeMap::new();
        buckets.insert(SyllableBucket::One, families);
        Self::new(buckets)
    }

    /// Parse the `syllable_N_families` JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: CatalogDocument = serde_json::from_str(json)?;
        let mut buckets = BTreeMap::new();
        buckets.insert(SyllableBucket::One, doc.syllable_1_families);
        buckets.insert(SyllableBucket::Two, doc.syllable_2_families);
        buckets.insert(SyllableBucket::Three, doc.syllable_3_families);
        buckets.insert(SyllableBucket::FourPlus, doc.syllable_4_plus_families);
        Self::new(buckets)
    }

    /// The catalog bundled with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_CATALOG_JSON)
    }

    pub fn list_families(&self, bucket: SyllableBucket) -> &[RhymeFamily] {
        self.buckets.get(&bucket).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Families used for live board generation
    pub fn live_families(&self) -> &[RhymeFamily] {
        self.list_families(SyllableBucket::One)
    }

    /// Find a family by id in any bucket (live bucket searched first)
    pub fn find_family(&self, family_id: &str) -> Option<&RhymeFamily> {
        SyllableBucket::ALL
            .iter()
            .flat_map(|b| self.list_families(*b))
            .find(|f| f.family_id == family_id)
    }

    /// First live family; always present
    pub fn default_family(&self) -> &RhymeFamily {
        // `new` rejects catalogs without a live family
        &self.live_families()[0]
    }

    /// Look up a live family, degrading to the default family on a miss.
    /// Families outside the 1-syllable bucket count as a miss.
    pub fn live_family_or_default(&self, family_id: &str) -> &RhymeFamily {
        match self
            .live_families()
            .iter()
            .find(|f| f.family_id == family_id)
        {
            Some(family) => family,
            None => {
                log::warn!(
                    "Live rhyme family '{}' not found, using '{}'",
                    family_id,
                    self.default_family().family_id
                );
                self.default_family()
            }
        }
    }

    /// Dictionary lookup: which family contains this word
    pub fn find_word(&self, word: &str) -> Option<(SyllableBucket, &RhymeFamily)> {
        let query = word.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        SyllableBucket::ALL.iter().find_map(|bucket| {
            self.list_families(*bucket)
                .iter()
                .find(|f| f.words.iter().any(|w| *w == query))
                .map(|f| (*bucket, f))
        })
    }

    /// Total number of families across buckets
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = RhymeCatalog::builtin().unwrap();
        assert!(!catalog.live_families().is_empty());
        assert!(!catalog.list_families(SyllableBucket::FourPlus).is_empty());
        assert!(catalog.find_family("ack").is_some());
    }

    #[test]
    fn test_missing_family_degrades_to_first() {
        let catalog = RhymeCatalog::from_families(vec![
            RhymeFamily::new("at", "-AT", &["cat", "hat"]),
            RhymeFamily::new("op", "-OP", &["top", "hop"]),
        ])
        .unwrap();
        assert_eq!(catalog.live_family_or_default("nope").family_id, "at");
        assert_eq!(catalog.live_family_or_default("op").family_id, "op");
    }

    #[test]
    fn test_multi_syllable_family_is_not_live() {
        let catalog = RhymeCatalog::builtin().unwrap();
        assert!(catalog.find_family("ocket").is_some());
        let live = catalog.live_family_or_default("ocket");
        assert_eq!(live.family_id, catalog.default_family().family_id);
    }

    #[test]
    fn test_empty_families_dropped() {
        let catalog = RhymeCatalog::from_families(vec![
            RhymeFamily::new("empty", "-", &[]),
            RhymeFamily::new("at", "-AT", &["cat"]),
        ])
        .unwrap();
        assert_eq!(catalog.default_family().family_id, "at");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_catalog_without_live_family_rejected() {
        let result = RhymeCatalog::from_families(vec![RhymeFamily::new("empty", "-", &[])]);
        assert!(matches!(result, Err(RhymeError::EmptyCatalog)));

        let json = r#"{"syllable_2_families":[{"family_id":"x","label":"X","words":["pocket"]}]}"#;
        assert!(matches!(
            RhymeCatalog::from_json_str(json),
            Err(RhymeError::EmptyCatalog)
        ));
    }

    #[test]
    fn test_find_word_across_buckets() {
        let catalog = RhymeCatalog::builtin().unwrap();
        let (bucket, family) = catalog.find_word("  Rocket ").unwrap();
        assert_eq!(bucket, SyllableBucket::Two);
        assert_eq!(family.family_id, "ocket");
        assert!(catalog.find_word("zzzz").is_none());
        assert!(catalog.find_word("").is_none());
    }

    #[test]
    fn test_pool_with_slant_words() {
        let mut family = RhymeFamily::new("at", "-AT", &["cat", "hat"]);
        family.slant_words = vec!["back".into(), "cat".into()];
        assert_eq!(family.pool(false), vec!["cat", "hat"]);
        assert_eq!(family.pool(true), vec!["cat", "hat", "back"]);
    }

    #[test]
    fn test_bucket_from_count() {
        assert_eq!(SyllableBucket::from_count(0), None);
        assert_eq!(SyllableBucket::from_count(1), Some(SyllableBucket::One));
        assert_eq!(SyllableBucket::from_count(7), Some(SyllableBucket::FourPlus));
    }
}
