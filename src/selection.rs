use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fiber::FiberCategory;
use crate::table::ReferenceTable;
use crate::{Error, Result};

/// Thresholds governing which reference rows train a fiber category's model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// How far from 100% a fraction may be for the row to count as pure
    pub exact_tolerance: f64,
    /// Pure rows needed before they are used on their own
    pub min_exact_rows: usize,
    /// Rows taken, by highest fraction, when too few pure rows exist
    pub fallback_rows: usize,
    /// Fewest rows a model is trained on
    pub min_training_rows: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            exact_tolerance: 0.1,
            min_exact_rows: 3,
            fallback_rows: 3,
            min_training_rows: crate::regression::MIN_POINTS,
        }
    }
}

/// How a training set was chosen
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Only samples made entirely of the category's fiber
    Exact,
    /// The samples with the highest share of the category's fiber
    Fallback,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub category: FiberCategory,
    pub tier: Tier,
    pub rows: ReferenceTable,
}

/// Choose the rows used to model `category`
///
/// Pure samples are preferred whenever at least `min_exact_rows` exist. Otherwise the
/// `fallback_rows` samples containing the most of the category's fiber are used, highest first.
/// Samples without any of the fiber are never fallback candidates.
///
/// # Errors
/// [`Error::InsufficientData`] if fewer than `min_training_rows` rows are selected. The
/// category then yields no model.
pub fn select(
    table: &ReferenceTable,
    category: FiberCategory,
    config: &SelectionConfig,
) -> Result<Selection> {
    let column = category.column();
    let exact = table.filter(column, |fraction| {
        (fraction - 100.0).abs() <= config.exact_tolerance
    });

    let (tier, rows) = if exact.len() >= config.min_exact_rows {
        (Tier::Exact, exact)
    } else {
        let fallback = table
            .filter(column, |fraction| fraction > 0.0)
            .top_n_by(column, config.fallback_rows, true);
        debug!(
            %category,
            exact = exact.len(),
            fallback = fallback.len(),
            "too few pure samples, using fallback"
        );
        (Tier::Fallback, fallback)
    };

    if rows.len() < config.min_training_rows {
        return Err(Error::InsufficientData {
            required: config.min_training_rows,
            available: rows.len(),
        });
    }

    Ok(Selection {
        category,
        tier,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{select, SelectionConfig, Tier};
    use crate::fiber::FiberCategory;
    use crate::sample::ReferenceSample;
    use crate::table::ReferenceTable;
    use crate::Error;

    fn row(lot: &str, black: f64) -> ReferenceSample {
        ReferenceSample {
            lot_id: lot.into(),
            black: Some(black),
            natural: Some(100.0 - black),
            white: Some(0.0),
            denim: Some(0.0),
            ..ReferenceSample::default()
        }
    }

    fn lots(table: &ReferenceTable) -> Vec<&str> {
        table.iter().map(|r| r.lot_id.as_str()).collect()
    }

    #[test]
    fn enough_pure_rows_are_used_exclusively() {
        let table: ReferenceTable = vec![
            row("p1", 100.0),
            row("m1", 90.0),
            row("p2", 99.95),
            row("p3", 100.0),
            row("m2", 99.8),
        ]
        .into();

        let selection = select(&table, FiberCategory::Black, &SelectionConfig::default()).unwrap();
        assert_eq!(selection.tier, Tier::Exact);
        assert_eq!(lots(&selection.rows), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn too_few_pure_rows_fall_back_to_highest_fractions() {
        let table: ReferenceTable = vec![
            row("a", 10.0),
            row("b", 100.0),
            row("c", 60.0),
            row("d", 0.0),
            row("e", 70.0),
        ]
        .into();

        let selection = select(&table, FiberCategory::Black, &SelectionConfig::default()).unwrap();
        assert_eq!(selection.tier, Tier::Fallback);
        assert_eq!(lots(&selection.rows), vec!["b", "e", "c"]);
    }

    #[test]
    fn fallback_may_return_fewer_rows_than_requested() {
        let table: ReferenceTable = vec![row("a", 30.0), row("b", 0.0), row("c", 40.0)].into();

        let selection = select(&table, FiberCategory::Black, &SelectionConfig::default()).unwrap();
        assert_eq!(selection.tier, Tier::Fallback);
        assert_eq!(lots(&selection.rows), vec!["c", "a"]);
    }

    #[test]
    fn single_candidate_row_yields_no_selection() {
        let table: ReferenceTable = vec![row("a", 0.0), row("b", 100.0), row("c", 0.0)].into();

        let result = select(&table, FiberCategory::Black, &SelectionConfig::default());
        assert!(matches!(
            result,
            Err(Error::InsufficientData {
                required: 2,
                available: 1
            })
        ));
    }

    #[test]
    fn rows_missing_the_fraction_are_ignored() {
        let mut incomplete = row("x", 100.0);
        incomplete.black = None;
        let table: ReferenceTable = vec![incomplete, row("a", 100.0), row("b", 50.0)].into();

        let selection = select(&table, FiberCategory::Black, &SelectionConfig::default()).unwrap();
        assert_eq!(lots(&selection.rows), vec!["a", "b"]);
    }

    proptest! {
        #[test]
        fn selection_follows_exact_then_fallback_policy(
            fractions in proptest::collection::vec(
                prop_oneof![Just(100.0f64), 0.0..100.0f64], 0..12)
        ) {
            let table: ReferenceTable = fractions
                .iter()
                .enumerate()
                .map(|(i, f)| row(&i.to_string(), *f))
                .collect();
            let config = SelectionConfig::default();
            let pure = fractions.iter().filter(|f| (**f - 100.0).abs() <= 0.1).count();
            let candidates = fractions.iter().filter(|f| **f > 0.0).count();

            match select(&table, FiberCategory::Black, &config) {
                Ok(selection) if pure >= 3 => {
                    prop_assert_eq!(selection.tier, Tier::Exact);
                    prop_assert_eq!(selection.rows.len(), pure);
                    prop_assert!(selection.rows.iter().all(|r| r.black.is_some_and(|b| (b - 100.0).abs() <= 0.1)));
                }
                Ok(selection) => {
                    prop_assert_eq!(selection.tier, Tier::Fallback);
                    prop_assert_eq!(selection.rows.len(), candidates.min(3));
                    let selected: Vec<f64> = selection.rows.iter().filter_map(|r| r.black).collect();
                    prop_assert!(selected.windows(2).all(|w| w[0] >= w[1]));
                }
                Err(Error::InsufficientData { .. }) => {
                    prop_assert!(pure < 3 && candidates < 2);
                }
                Err(other) => {
                    prop_assert!(false, "unexpected error {}", other);
                }
            }
        }
    }
}
