//! Rhyme scheme patterns

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::BOARD_ROWS;
use crate::error::RhymeError;

/// Which pool a row draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowTag {
    A,
    B,
    /// Rhythm filler, no word
    X,
}

impl RowTag {
    /// Display color for rows of this tag
    pub fn color(self) -> &'static str {
        match self {
            RowTag::A => "#FFD700",
            RowTag::B => "#87CEEB",
            RowTag::X => "#95A5A6",
        }
    }

    /// Pool slot (A=0, B=1), None for filler
    pub fn pool_slot(self) -> Option<usize> {
        match self {
            RowTag::A => Some(0),
            RowTag::B => Some(1),
            RowTag::X => None,
        }
    }
}

/// Four-slot tag sequence, selected by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchemePattern {
    #[default]
    #[serde(rename = "AABB")]
    Aabb,
    #[serde(rename = "AAAA")]
    Aaaa,
    #[serde(rename = "ABAB")]
    Abab,
    #[serde(rename = "AXBX")]
    Axbx,
    #[serde(rename = "XAXB")]
    Xaxb,
}

impl SchemePattern {
    pub const ALL: [SchemePattern; 5] = [
        SchemePattern::Aabb,
        SchemePattern::Aaaa,
        SchemePattern::Abab,
        SchemePattern::Axbx,
        SchemePattern::Xaxb,
    ];

    pub fn tags(self) -> [RowTag; BOARD_ROWS] {
        use RowTag::*;
        match self {
            SchemePattern::Aabb => [A, A, B, B],
            SchemePattern::Aaaa => [A, A, A, A],
            SchemePattern::Abab => [A, B, A, B],
            SchemePattern::Axbx => [A, X, B, X],
            SchemePattern::Xaxb => [X, A, X, B],
        }
    }

    /// Tag at a pattern position (wraps)
    pub fn tag_at(self, index: usize) -> RowTag {
        self.tags()[index % BOARD_ROWS]
    }

    pub fn uses(self, tag: RowTag) -> bool {
        self.tags().contains(&tag)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemePattern::Aabb => "AABB",
            SchemePattern::Aaaa => "AAAA",
            SchemePattern::Abab => "ABAB",
            SchemePattern::Axbx => "AXBX",
            SchemePattern::Xaxb => "XAXB",
        }
    }
}

impl fmt::Display for SchemePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemePattern {
    type Err = RhymeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        SchemePattern::ALL
            .into_iter()
            .find(|p| p.as_str() == upper)
            .ok_or_else(|| RhymeError::UnknownScheme(s.to_string()))
    }
}
