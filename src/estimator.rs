//! Estimation of an unknown sample from the reference table
//!
//! Each fiber category present in the query is modelled separately from the reference samples
//! most representative of that fiber. The per-category predictions are then blended using the
//! query's own composition as weights.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::blend::{blend, CategoryDetail, CategoryOutcome, Domain, TrainedGroupModel, WeightedModel};
use crate::config::Config;
use crate::confidence::ConfidenceReport;
use crate::fiber::{Composition, FiberCategory};
use crate::sample::BodyColor;
use crate::selection::Tier;
use crate::store::TableSource;
use crate::table::{Column, ReferenceTable};
use crate::{Error, Result};

/// The quantity being estimated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Marker dosage of the finished sample, ppm
    #[default]
    EffectiveDosagePpm,
    /// Marker concentration in the dosed fiber, ppm
    MarkerConcentrationPpm,
    /// Share of marked fiber in the sample, percent
    MarkedFiberShare,
}

impl Target {
    #[must_use]
    pub const fn column(self) -> Column {
        match self {
            Self::EffectiveDosagePpm => Column::EffectiveDosagePpm,
            Self::MarkerConcentrationPpm => Column::MarkerConcentrationPpm,
            Self::MarkedFiberShare => Column::MarkedFiberShare,
        }
    }

    /// Range estimates of this quantity are clipped into
    ///
    /// Percentages are bounded to `[0, 100]` and concentrations to `[0, ∞)`. Extrapolated
    /// lines may otherwise leave either range.
    #[must_use]
    pub const fn domain(self) -> Domain {
        match self {
            Self::EffectiveDosagePpm | Self::MarkerConcentrationPpm => Domain::NON_NEGATIVE,
            Self::MarkedFiberShare => Domain::PERCENTAGE,
        }
    }

    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::EffectiveDosagePpm | Self::MarkerConcentrationPpm => "ppm",
            Self::MarkedFiberShare => "%",
        }
    }
}

/// Which way round the reference data is read
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Estimate the target quantity from an observed emission count
    #[default]
    SignalToTarget,
    /// Estimate the emission count expected for a known target quantity
    TargetToSignal,
}

/// How the reference data is modelled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One straight line per fiber category, blended by composition
    #[default]
    PerFiberGroup,
    /// A single least squares model over emission, composition and body color
    Joint,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    pub target: Target,
    pub direction: Direction,
    pub strategy: Strategy,
}

impl EstimationConfig {
    /// Column the fitted lines take as input
    #[must_use]
    pub const fn predictor(&self) -> Column {
        match self.direction {
            Direction::SignalToTarget => Column::EmissionCount,
            Direction::TargetToSignal => self.target.column(),
        }
    }

    /// Column the fitted lines predict
    #[must_use]
    pub const fn response(&self) -> Column {
        match self.direction {
            Direction::SignalToTarget => self.target.column(),
            Direction::TargetToSignal => Column::EmissionCount,
        }
    }

    #[must_use]
    pub const fn output_domain(&self) -> Domain {
        match self.direction {
            Direction::SignalToTarget => self.target.domain(),
            Direction::TargetToSignal => Domain::NON_NEGATIVE,
        }
    }

    #[must_use]
    pub const fn output_unit(&self) -> &'static str {
        match self.direction {
            Direction::SignalToTarget => self.target.unit(),
            Direction::TargetToSignal => "counts",
        }
    }
}

/// The sample being estimated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryComposition {
    pub composition: Composition,
    /// Emission count, or the target quantity when estimating the expected signal. Never negative.
    pub input: f64,
    /// Only used by the joint strategy
    pub body_color: Option<BodyColor>,
}

impl QueryComposition {
    /// # Errors
    /// [`Error::CompositionInvalid`] for an invalid blend, [`Error::InvalidEntry`] for a
    /// negative or non-finite input.
    pub fn validate(&self) -> Result<()> {
        self.composition.validate()?;
        if !self.input.is_finite() || self.input < 0.0 {
            return Err(Error::InvalidEntry {
                field: "input",
                reason: format!("{} is not a non-negative number", self.input),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EstimationResult {
    pub value: f64,
    /// Composition weighted residual error of the contributing models
    pub uncertainty: f64,
    pub unit: &'static str,
    pub per_category: Vec<CategoryDetail>,
    pub confidence: ConfidenceReport,
    /// Categories whose model was trained on fallback rows
    pub used_fallback: BTreeSet<FiberCategory>,
}

/// Load the reference table from `source`, failing on an empty table
///
/// # Errors
/// [`Error::DataUnavailable`] from the source, or [`Error::NoData`] if it holds no rows.
pub fn load_reference<S: TableSource + ?Sized>(source: &S) -> Result<ReferenceTable> {
    let table = source.load()?;
    if table.is_empty() {
        return Err(Error::NoData);
    }
    Ok(table)
}

/// Estimate `query` from the reference samples currently held by `source`
///
/// The table is reloaded and every model rebuilt on each call.
///
/// # Errors
/// - [`Error::CompositionInvalid`] if the query composition is rejected, before any data is read
/// - [`Error::DataUnavailable`] or [`Error::NoData`] if there is nothing to learn from
/// - [`Error::NoModelAvailable`] if none of the query's fiber categories could be modelled
pub fn estimate<S: TableSource + ?Sized>(
    source: &S,
    query: &QueryComposition,
    config: &Config,
) -> Result<EstimationResult> {
    query.validate()?;
    let table = load_reference(source)?;
    estimate_from_table(&table, query, config)
}

/// As [`estimate`], against an already loaded table
///
/// # Errors
/// See [`estimate`].
pub fn estimate_from_table(
    table: &ReferenceTable,
    query: &QueryComposition,
    config: &Config,
) -> Result<EstimationResult> {
    query.validate()?;
    let estimation = &config.estimation;

    let candidates: Vec<WeightedModel> = query
        .composition
        .weights()
        .into_iter()
        .map(|(category, weight)| WeightedModel {
            category,
            weight,
            model: TrainedGroupModel::train(
                table,
                category,
                &config.selection,
                estimation.predictor(),
                estimation.response(),
            ),
        })
        .collect();

    let total_possible = candidates.len();
    let blended = blend(candidates, query.input, estimation.output_domain())?;

    let used_fallback: BTreeSet<FiberCategory> = blended
        .details
        .iter()
        .filter_map(|detail| match detail.outcome {
            CategoryOutcome::Used {
                tier: Tier::Fallback,
                ..
            } => Some(detail.category),
            _ => None,
        })
        .collect();
    let confidence = ConfidenceReport::new(blended.used().count(), total_possible);

    if !estimation.output_domain().contains(blended.unclipped) {
        warn!(
            unclipped = blended.unclipped,
            clipped = blended.value,
            "estimate clipped into output domain"
        );
    }
    info!(
        value = blended.value,
        unit = estimation.output_unit(),
        confidence = %confidence.tier,
        used = confidence.used,
        possible = confidence.total_possible,
        fallback = used_fallback.len(),
        "estimated sample"
    );

    Ok(EstimationResult {
        value: blended.value,
        uncertainty: blended.uncertainty,
        unit: estimation.output_unit(),
        per_category: blended.details,
        confidence,
        used_fallback,
    })
}
