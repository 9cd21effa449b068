use std::fmt;

use serde::{Deserialize, Serialize};

/// Qualitative confidence in a blended estimate
///
/// The tier depends only on the share of the sample's fiber categories that produced a model:
///
/// | share used     | tier     |
/// |----------------|----------|
/// | all            | high     |
/// | at least 3/4   | moderate |
/// | at least 1/2   | low      |
/// | more than none | very low |
/// | none           | none     |
///
/// For a four-fiber blend this is four, three, two, one and zero categories respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    None,
    VeryLow,
    Low,
    Moderate,
    High,
}

impl ConfidenceTier {
    #[must_use]
    pub const fn from_counts(used: usize, total_possible: usize) -> Self {
        // Integer comparisons of used / total against the tier boundaries
        if used == 0 || total_possible == 0 {
            Self::None
        } else if used >= total_possible {
            Self::High
        } else if 4 * used >= 3 * total_possible {
            Self::Moderate
        } else if 2 * used >= total_possible {
            Self::Low
        } else {
            Self::VeryLow
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::VeryLow => "very low",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        };
        f.write_str(label)
    }
}

/// How many of a sample's fiber categories contributed to its estimate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub used: usize,
    pub total_possible: usize,
    pub tier: ConfidenceTier,
}

impl ConfidenceReport {
    #[must_use]
    pub const fn new(used: usize, total_possible: usize) -> Self {
        Self {
            used,
            total_possible,
            tier: ConfidenceTier::from_counts(used, total_possible),
        }
    }
}

impl fmt::Display for ConfidenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} of {} fiber categories modelled)",
            self.tier, self.used, self.total_possible
        )
    }
}
