use std::fmt;

use serde::{Deserialize, Serialize};

use crate::table::Column;
use crate::{Error, Result};

/// The axes along which a textile blend is described
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiberCategory {
    Natural,
    Black,
    White,
    /// Indigo dyed or denim fiber
    Denim,
}

impl FiberCategory {
    pub const ALL: [Self; 4] = [Self::Natural, Self::Black, Self::White, Self::Denim];

    /// The reference table column holding this category's fraction
    #[must_use]
    pub const fn column(self) -> Column {
        match self {
            Self::Natural => Column::Natural,
            Self::Black => Column::Black,
            Self::White => Column::White,
            Self::Denim => Column::Denim,
        }
    }
}

impl fmt::Display for FiberCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Natural => "natural",
            Self::Black => "black",
            Self::White => "white",
            Self::Denim => "indigo/denim",
        };
        f.write_str(name)
    }
}

/// Fiber blend of a sample, each fraction a percentage
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub natural: f64,
    pub black: f64,
    pub white: f64,
    pub denim: f64,
}

impl Composition {
    /// Allowed deviation of the summed fractions from 100%
    pub const TOLERANCE: f64 = 0.1;

    #[must_use]
    pub const fn new(natural: f64, black: f64, white: f64, denim: f64) -> Self {
        Self {
            natural,
            black,
            white,
            denim,
        }
    }

    /// A sample made entirely of one fiber
    #[must_use]
    pub fn pure(category: FiberCategory) -> Self {
        let mut composition = Self::default();
        *composition.fraction_mut(category) = 100.0;
        composition
    }

    #[must_use]
    pub const fn fraction(&self, category: FiberCategory) -> f64 {
        match category {
            FiberCategory::Natural => self.natural,
            FiberCategory::Black => self.black,
            FiberCategory::White => self.white,
            FiberCategory::Denim => self.denim,
        }
    }

    fn fraction_mut(&mut self, category: FiberCategory) -> &mut f64 {
        match category {
            FiberCategory::Natural => &mut self.natural,
            FiberCategory::Black => &mut self.black,
            FiberCategory::White => &mut self.white,
            FiberCategory::Denim => &mut self.denim,
        }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        FiberCategory::ALL.iter().map(|c| self.fraction(*c)).sum()
    }

    /// Check every fraction lies in [0, 100] and the fractions sum to 100
    ///
    /// # Errors
    /// Returns [`Error::CompositionInvalid`] describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        for category in FiberCategory::ALL {
            let fraction = self.fraction(category);
            if !fraction.is_finite() || !(0.0..=100.0).contains(&fraction) {
                return Err(Error::CompositionInvalid {
                    reason: format!("{category} fraction {fraction} is outside [0, 100]"),
                });
            }
        }

        let total = self.total();
        if (total - 100.0).abs() > Self::TOLERANCE {
            return Err(Error::CompositionInvalid {
                reason: format!("fractions sum to {total:.2}%, expected 100%"),
            });
        }
        Ok(())
    }

    /// The blend weight of each category present in the sample
    ///
    /// Fractions are normalised by their total so the weights sum to one. Categories with a
    /// zero fraction are omitted entirely.
    #[must_use]
    pub fn weights(&self) -> Vec<(FiberCategory, f64)> {
        let total = self.total();
        if total <= 0.0 {
            return vec![];
        }
        FiberCategory::ALL
            .into_iter()
            .map(|category| (category, self.fraction(category) / total))
            .filter(|(_, weight)| *weight > 0.0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{Composition, FiberCategory};
    use crate::Error;

    #[test]
    fn pure_composition_has_single_unit_weight() {
        for category in FiberCategory::ALL {
            let weights = Composition::pure(category).weights();
            assert_eq!(weights.len(), 1);
            assert_eq!(weights[0].0, category);
            approx::assert_relative_eq!(weights[0].1, 1.0);
        }
    }

    #[test]
    fn zero_fractions_are_omitted_from_weights() {
        let composition = Composition::new(50.0, 50.0, 0.0, 0.0);
        let weights = composition.weights();

        assert_eq!(
            weights.iter().map(|(c, _)| *c).collect::<Vec<_>>(),
            vec![FiberCategory::Natural, FiberCategory::Black]
        );
        approx::assert_relative_eq!(weights[0].1, 0.5);
        approx::assert_relative_eq!(weights[1].1, 0.5);
    }

    #[test]
    fn composition_within_tolerance_is_accepted() {
        assert!(Composition::new(33.3, 33.3, 33.3, 0.05).validate().is_ok());
    }

    #[test]
    fn composition_not_summing_to_one_hundred_is_rejected() {
        let result = Composition::new(50.0, 30.0, 10.0, 0.0).validate();
        assert!(matches!(result, Err(Error::CompositionInvalid { .. })));
    }

    #[test]
    fn negative_fraction_is_rejected() {
        let result = Composition::new(110.0, -10.0, 0.0, 0.0).validate();
        assert!(matches!(result, Err(Error::CompositionInvalid { .. })));
    }

    #[test]
    fn non_finite_fraction_is_rejected() {
        let result = Composition::new(f64::NAN, 100.0, 0.0, 0.0).validate();
        assert!(matches!(result, Err(Error::CompositionInvalid { .. })));
    }

    proptest! {
        #[test]
        fn weights_of_valid_compositions_sum_to_one(
            natural in 0.0..100.0f64,
            split in 0.0..1.0f64,
            white_share in 0.0..1.0f64,
        ) {
            let rest = 100.0 - natural;
            let black = rest * split;
            let white = (rest - black) * white_share;
            let denim = rest - black - white;
            let composition = Composition::new(natural, black, white, denim);

            let total: f64 = composition.weights().iter().map(|(_, w)| w).sum();
            approx::assert_relative_eq!(total, 1.0, max_relative = 1e-12);
        }
    }
}
