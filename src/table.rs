use std::cmp::Ordering;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::sample::ReferenceSample;

/// Numeric columns of the reference table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Natural,
    Black,
    White,
    Denim,
    MastermixDosage,
    LuminescentContent,
    MarkedFiberShare,
    MarkerConcentrationPpm,
    EffectiveDosagePpm,
    EmissionCount,
}

impl Column {
    /// Read this column from a sample, `None` where the cell is missing
    #[must_use]
    pub fn value(self, sample: &ReferenceSample) -> Option<f64> {
        match self {
            Self::Natural => sample.natural,
            Self::Black => sample.black,
            Self::White => sample.white,
            Self::Denim => sample.denim,
            Self::MastermixDosage => sample.mastermix_dosage,
            Self::LuminescentContent => sample.luminescent_content,
            Self::MarkedFiberShare => sample.marked_fiber_share,
            Self::MarkerConcentrationPpm => sample.marker_concentration_ppm,
            Self::EffectiveDosagePpm => sample.effective_dosage_ppm,
            Self::EmissionCount => sample.emission_count.map(f64::from),
        }
    }
}

/// The full set of reference samples, in the order they were recorded
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceTable {
    rows: Vec<ReferenceSample>,
}

impl From<Vec<ReferenceSample>> for ReferenceTable {
    fn from(rows: Vec<ReferenceSample>) -> Self {
        Self { rows }
    }
}

impl FromIterator<ReferenceSample> for ReferenceTable {
    fn from_iter<T: IntoIterator<Item = ReferenceSample>>(iter: T) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl ReferenceTable {
    #[must_use]
    pub fn rows(&self) -> &[ReferenceSample] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceSample> {
        self.rows.iter()
    }

    /// Rows whose value in `column` is present and satisfies `predicate`
    #[must_use]
    pub fn filter(&self, column: Column, predicate: impl Fn(f64) -> bool) -> Self {
        self.rows
            .iter()
            .filter(|row| column.value(row).is_some_and(&predicate))
            .cloned()
            .collect()
    }

    /// The `n` rows ranked highest (or lowest) by `column`
    ///
    /// Rows missing the column are dropped. The sort is stable, so ties keep their recorded
    /// order.
    #[must_use]
    pub fn top_n_by(&self, column: Column, n: usize, descending: bool) -> Self {
        self.rows
            .iter()
            .filter_map(|row| column.value(row).map(|value| (value, row)))
            .sorted_by(|(a, _), (b, _)| {
                let ordering = a.partial_cmp(b).unwrap_or(Ordering::Equal);
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .take(n)
            .map(|(_, row)| row.clone())
            .collect()
    }

    /// Distinct LOT identifiers, in order of first appearance
    #[must_use]
    pub fn lots(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.lot_id.as_str()).unique().collect()
    }
}
