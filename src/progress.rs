//! Family practice progress
//!
//! The engine only reports "this family was drawn"; storage lives behind
//! [`ProgressStore`]. Two stores ship: in-memory and a JSON file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{RhymeCatalog, RhymeFamily};
use crate::error::Result;

/// How many of the least-played families "play weakest" chooses from
pub const WEAKEST_POOL_SIZE: usize = 5;

/// Per-family practice record
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyProgress {
    pub times_played: u32,
    /// Timestamp (ms) of the latest play
    pub last_played_ms: f64,
}

/// Persistence collaborator for play counts
pub trait ProgressStore {
    /// Count one play of a family and return its updated record
    fn increment_family_play_count(&mut self, family_id: &str, now_ms: f64)
    -> Result<FamilyProgress>;

    fn family_progress(&self, family_id: &str) -> Option<FamilyProgress>;

    fn all_progress(&self) -> &BTreeMap<String, FamilyProgress>;

    fn times_played(&self, family_id: &str) -> u32 {
        self.family_progress(family_id)
            .map(|p| p.times_played)
            .unwrap_or(0)
    }
}

/// Progress kept for the lifetime of the process
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryProgress {
    pub families: BTreeMap<String, FamilyProgress>,
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressStore for MemoryProgress {
    fn increment_family_play_count(
        &mut self,
        family_id: &str,
        now_ms: f64,
    ) -> Result<FamilyProgress> {
        let entry = self.families.entry(family_id.to_string()).or_default();
        entry.times_played += 1;
        entry.last_played_ms = now_ms;
        Ok(*entry)
    }

    fn family_progress(&self, family_id: &str) -> Option<FamilyProgress> {
        self.families.get(family_id).copied()
    }

    fn all_progress(&self) -> &BTreeMap<String, FamilyProgress> {
        &self.families
    }
}

/// Progress persisted to a JSON file, rewritten after every increment
#[derive(Debug, Clone)]
pub struct JsonProgressFile {
    path: PathBuf,
    data: MemoryProgress,
}

impl JsonProgressFile {
    /// Open a progress file; a missing file starts fresh
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let json = fs::read_to_string(&path)?;
            let data: MemoryProgress = serde_json::from_str(&json)?;
            log::info!(
                "Loaded progress for {} families from {}",
                data.families.len(),
                path.display()
            );
            data
        } else {
            log::info!("No progress file at {}, starting fresh", path.display());
            MemoryProgress::new()
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, json)?;
        log::debug!("Progress saved ({} families)", self.data.families.len());
        Ok(())
    }
}

impl ProgressStore for JsonProgressFile {
    fn increment_family_play_count(
        &mut self,
        family_id: &str,
        now_ms: f64,
    ) -> Result<FamilyProgress> {
        let progress = self.data.increment_family_play_count(family_id, now_ms)?;
        self.save()?;
        Ok(progress)
    }

    fn family_progress(&self, family_id: &str) -> Option<FamilyProgress> {
        self.data.family_progress(family_id)
    }

    fn all_progress(&self) -> &BTreeMap<String, FamilyProgress> {
        self.data.all_progress()
    }
}

/// Practice overview across the live families
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressStats {
    /// Families played at least once
    pub families_seen: usize,
    pub total_families: usize,
    pub total_plays: u64,
}

pub fn progress_stats(catalog: &RhymeCatalog, store: &dyn ProgressStore) -> ProgressStats {
    let families = catalog.live_families();
    let plays: Vec<u32> = families
        .iter()
        .map(|f| store.times_played(&f.family_id))
        .collect();
    ProgressStats {
        families_seen: plays.iter().filter(|p| **p > 0).count(),
        total_families: families.len(),
        total_plays: plays.iter().map(|p| *p as u64).sum(),
    }
}

/// "Play new": a random never-played live family, else any live family
pub fn pick_unplayed_family<'a, R: Rng>(
    catalog: &'a RhymeCatalog,
    store: &dyn ProgressStore,
    rng: &mut R,
) -> &'a RhymeFamily {
    let families = catalog.live_families();
    let unplayed: Vec<&RhymeFamily> = families
        .iter()
        .filter(|f| store.times_played(&f.family_id) == 0)
        .collect();

    if unplayed.is_empty() {
        &families[rng.random_range(0..families.len())]
    } else {
        unplayed[rng.random_range(0..unplayed.len())]
    }
}

/// "Play weakest": a random family among the least-played live families
pub fn pick_weakest_family<'a, R: Rng>(
    catalog: &'a RhymeCatalog,
    store: &dyn ProgressStore,
    rng: &mut R,
) -> &'a RhymeFamily {
    let mut ranked: Vec<&RhymeFamily> = catalog.live_families().iter().collect();
    // Stable sort keeps catalog order among ties
    ranked.sort_by_key(|f| store.times_played(&f.family_id));
    ranked.truncate(WEAKEST_POOL_SIZE);
    ranked[rng.random_range(0..ranked.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn catalog() -> RhymeCatalog {
        let families = ["at", "ack", "op", "ine", "ore", "ill", "est"]
            .iter()
            .map(|id| RhymeFamily::new(*id, id.to_uppercase(), &["word"]))
            .collect();
        RhymeCatalog::from_families(families).unwrap()
    }

    #[test]
    fn test_memory_increment() {
        let mut store = MemoryProgress::new();
        store.increment_family_play_count("at", 10.0).unwrap();
        let p = store.increment_family_play_count("at", 20.0).unwrap();
        assert_eq!(p.times_played, 2);
        assert_eq!(p.last_played_ms, 20.0);
        assert_eq!(store.times_played("at"), 2);
        assert_eq!(store.times_played("op"), 0);
        assert!(store.family_progress("op").is_none());
    }

    #[test]
    fn test_json_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let mut store = JsonProgressFile::open(&path).unwrap();
        store.increment_family_play_count("ack", 1.0).unwrap();
        store.increment_family_play_count("ack", 2.0).unwrap();
        store.increment_family_play_count("op", 3.0).unwrap();

        let reopened = JsonProgressFile::open(&path).unwrap();
        assert_eq!(reopened.times_played("ack"), 2);
        assert_eq!(reopened.family_progress("op").unwrap().last_played_ms, 3.0);
        assert_eq!(reopened.all_progress().len(), 2);
    }

    #[test]
    fn test_json_file_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(JsonProgressFile::open(&path).is_err());
    }

    #[test]
    fn test_pick_unplayed_prefers_new_families() {
        let catalog = catalog();
        let mut store = MemoryProgress::new();
        for id in ["at", "ack", "op", "ine", "ore", "ill"] {
            store.increment_family_play_count(id, 0.0).unwrap();
        }
        let mut rng = Pcg32::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(pick_unplayed_family(&catalog, &store, &mut rng).family_id, "est");
        }

        store.increment_family_play_count("est", 0.0).unwrap();
        // Everything played: any family will do
        let picked = pick_unplayed_family(&catalog, &store, &mut rng);
        assert!(catalog.find_family(&picked.family_id).is_some());
    }

    #[test]
    fn test_pick_weakest_avoids_most_played() {
        let catalog = catalog();
        let mut store = MemoryProgress::new();
        for (i, id) in ["at", "ack", "op", "ine", "ore", "ill", "est"].iter().enumerate() {
            for _ in 0..=i {
                store.increment_family_play_count(id, 0.0).unwrap();
            }
        }
        let mut rng = Pcg32::seed_from_u64(2);
        for _ in 0..50 {
            let id = &pick_weakest_family(&catalog, &store, &mut rng).family_id;
            assert!(id != "ill" && id != "est", "picked {id}");
        }
    }

    #[test]
    fn test_progress_stats() {
        let catalog = catalog();
        let mut store = MemoryProgress::new();
        store.increment_family_play_count("at", 0.0).unwrap();
        store.increment_family_play_count("at", 0.0).unwrap();
        store.increment_family_play_count("op", 0.0).unwrap();
        // Unknown ids do not count toward live stats
        store.increment_family_play_count("gone", 0.0).unwrap();

        let stats = progress_stats(&catalog, &store);
        assert_eq!(stats.families_seen, 2);
        assert_eq!(stats.total_families, 7);
        assert_eq!(stats.total_plays, 3);
    }
}
