use serde::Serialize;
use tracing::debug;

use crate::fiber::FiberCategory;
use crate::regression::{fit, LinearFit, Prediction};
use crate::selection::{select, SelectionConfig, Tier};
use crate::table::{Column, ReferenceTable};
use crate::{Error, Result};

/// Closed interval a blended estimate is clipped into, either end may be open
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Domain {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Domain {
    pub const NON_NEGATIVE: Self = Self {
        lower: Some(0.0),
        upper: None,
    };
    pub const PERCENTAGE: Self = Self {
        lower: Some(0.0),
        upper: Some(100.0),
    };

    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        let value = self.lower.map_or(value, |lower| value.max(lower));
        self.upper.map_or(value, |upper| value.min(upper))
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower.map_or(true, |lower| value >= lower)
            && self.upper.map_or(true, |upper| value <= upper)
    }
}

/// A straight line fit for one fiber category, rebuilt on every request
#[derive(Clone, Debug, PartialEq)]
pub struct TrainedGroupModel {
    pub category: FiberCategory,
    pub tier: Tier,
    /// `(predictor, response)` in the order the selector returned them
    pub pairs: Vec<(f64, f64)>,
    pub fit: LinearFit<f64>,
}

impl TrainedGroupModel {
    /// Select training rows for `category` and fit `response` against `predictor`
    ///
    /// Rows missing either column are ignored before selection.
    ///
    /// # Errors
    /// [`Error::InsufficientData`] or [`Error::DegenerateFit`] when the category cannot be
    /// modelled. Both only concern this category.
    pub fn train(
        table: &ReferenceTable,
        category: FiberCategory,
        config: &SelectionConfig,
        predictor: Column,
        response: Column,
    ) -> Result<Self> {
        let usable = table
            .filter(predictor, |_| true)
            .filter(response, |_| true);
        let selection = select(&usable, category, config)?;

        let pairs: Vec<(f64, f64)> = selection
            .rows
            .iter()
            .filter_map(|row| Some((predictor.value(row)?, response.value(row)?)))
            .collect();
        let fit = fit(&pairs)?;

        Ok(Self {
            category,
            tier: selection.tier,
            pairs,
            fit,
        })
    }
}

/// A category present in the query, with the outcome of training its model
#[derive(Debug)]
pub struct WeightedModel {
    pub category: FiberCategory,
    pub weight: f64,
    pub model: Result<TrainedGroupModel>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CategoryOutcome {
    Used {
        tier: Tier,
        training_rows: usize,
        slope: f64,
        intercept: f64,
        /// Value of the fitted line at the query input
        prediction: f64,
        /// `prediction` clipped into the training responses, the centre of `lower..=upper`
        clipped: f64,
        lower: f64,
        upper: f64,
        rmse: f64,
        /// `weight * prediction`
        contribution: f64,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryDetail {
    pub category: FiberCategory,
    pub weight: f64,
    pub outcome: CategoryOutcome,
}

impl CategoryDetail {
    #[must_use]
    pub const fn is_used(&self) -> bool {
        matches!(self.outcome, CategoryOutcome::Used { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Blend {
    /// The weighted estimate after clipping into the output domain
    pub value: f64,
    /// The weighted sum before clipping
    pub unclipped: f64,
    /// Weighted sum of the per-category residual errors
    pub uncertainty: f64,
    pub details: Vec<CategoryDetail>,
}

impl Blend {
    pub fn used(&self) -> impl Iterator<Item = &CategoryDetail> {
        self.details.iter().filter(|detail| detail.is_used())
    }
}

/// Combine per-category predictions at `input` using the query's own composition as weights
///
/// Each category contributes the value of its fitted line, extrapolated where the input lies
/// beyond the training data. Categories whose model could not be trained contribute nothing,
/// and the weights of the remaining categories are left as they are. Missing coverage therefore
/// pulls the estimate towards zero instead of being renormalised away.
///
/// # Errors
/// [`Error::NoModelAvailable`] if no category has a model.
pub fn blend(candidates: Vec<WeightedModel>, input: f64, domain: Domain) -> Result<Blend> {
    let mut sum = 0.0;
    let mut uncertainty = 0.0;
    let mut details = Vec::with_capacity(candidates.len());

    for WeightedModel {
        category,
        weight,
        model,
    } in candidates
    {
        let outcome = match model {
            Ok(model) => {
                let prediction = model.fit.predict(input);
                let Prediction {
                    value: clipped,
                    lower,
                    upper,
                    rmse,
                    ..
                } = model.fit.predict_with_confidence(input);
                let contribution = weight * prediction;
                sum += contribution;
                uncertainty += weight * rmse;
                CategoryOutcome::Used {
                    tier: model.tier,
                    training_rows: model.pairs.len(),
                    slope: model.fit.slope(),
                    intercept: model.fit.intercept(),
                    prediction,
                    clipped,
                    lower,
                    upper,
                    rmse,
                    contribution,
                }
            }
            Err(err) => {
                debug!(%category, %err, "category skipped");
                CategoryOutcome::Skipped {
                    reason: err.to_string(),
                }
            }
        };
        details.push(CategoryDetail {
            category,
            weight,
            outcome,
        });
    }

    if !details.iter().any(CategoryDetail::is_used) {
        return Err(Error::NoModelAvailable);
    }

    Ok(Blend {
        value: domain.clamp(sum),
        unclipped: sum,
        uncertainty,
        details,
    })
}
