//! A single least squares model over every descriptor of a sample
//!
//! Rather than one line per fiber category, the response is regressed jointly on the model
//! input (emission count, or the target quantity in reverse), the four fiber fractions and the
//! body color channels. Features are standardised and the normal equations solved with the
//! sweep operator. A feature that is constant, or a linear combination of features already
//! swept in, is left out with a zero coefficient. The fiber fractions always sum to 100, so one
//! of them is always dropped this way; predictions for compositions that also sum to 100 do
//! not depend on which.
use ndarray::{Array1, Array2};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::estimator::{load_reference, EstimationConfig, QueryComposition};
use crate::sample::{BodyColor, ReferenceSample};
use crate::store::TableSource;
use crate::table::{Column, ReferenceTable};
use crate::{Error, Result};

pub const FEATURES: [&str; 8] = ["input", "natural", "black", "white", "denim", "r", "g", "b"];

/// Residual variance, relative to a standardised column, below which a column is dependent
const PIVOT_TOLERANCE: f64 = 1e-9;

type Features = [f64; FEATURES.len()];

fn features(input: f64, fractions: [f64; 4], color: BodyColor) -> Features {
    [
        input,
        fractions[0],
        fractions[1],
        fractions[2],
        fractions[3],
        f64::from(color.r),
        f64::from(color.g),
        f64::from(color.b),
    ]
}

fn row_features(row: &ReferenceSample, predictor: Column) -> Option<Features> {
    let composition = row.composition()?;
    Some(features(
        predictor.value(row)?,
        [
            composition.natural,
            composition.black,
            composition.white,
            composition.denim,
        ],
        row.body_color?,
    ))
}

/// Sweep pivot `k` of the symmetric matrix `m` in place
fn sweep(m: &mut Array2<f64>, k: usize) {
    let pivot = m[[k, k]];
    let size = m.nrows();
    for j in 0..size {
        m[[k, j]] /= pivot;
    }
    for i in (0..size).filter(|i| *i != k) {
        let factor = m[[i, k]];
        for j in 0..size {
            m[[i, j]] -= factor * m[[k, j]];
        }
        m[[i, k]] = -factor / pivot;
    }
    m[[k, k]] = 1.0 / pivot;
}

#[derive(Clone, Debug, PartialEq)]
pub struct JointModel {
    means: Array1<f64>,
    scales: Array1<f64>,
    /// Coefficients of the standardised features, zero where a feature was dropped
    coefficients: Array1<f64>,
    kept: Vec<bool>,
    response_mean: f64,
    rmse: f64,
    rows: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JointTerm {
    pub feature: &'static str,
    /// Coefficient in the feature's own units
    pub coefficient: f64,
    pub kept: bool,
}

impl JointModel {
    /// Fit the joint model on every reference row with all features and the response present
    ///
    /// # Errors
    /// - [`Error::InsufficientData`] for fewer than two complete rows
    /// - [`Error::DegenerateFit`] if every feature is constant
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(table: &ReferenceTable, config: &EstimationConfig) -> Result<Self> {
        let predictor = config.predictor();
        let response = config.response();
        let (rows, ys): (Vec<Features>, Vec<f64>) = table
            .iter()
            .filter_map(|row| Some((row_features(row, predictor)?, response.value(row)?)))
            .unzip();

        if rows.len() < 2 {
            return Err(Error::InsufficientData {
                required: 2,
                available: rows.len(),
            });
        }

        let n = rows.len();
        let p = FEATURES.len();
        let x = Array2::from_shape_fn((n, p), |(i, j)| rows[i][j]);
        let y = Array1::from(ys);

        let count = n as f64;
        let means = x.sum_axis(ndarray::Axis(0)) / count;
        let centered = &x - &means;
        let scales = centered
            .mapv(|v| v * v)
            .sum_axis(ndarray::Axis(0))
            .mapv(|ss| (ss / count).sqrt());
        let standardised = Array2::from_shape_fn((n, p), |(i, j)| {
            if scales[j] > 0.0 {
                centered[[i, j]] / scales[j]
            } else {
                0.0
            }
        });
        let response_mean = y.sum() / count;
        let dy = y.mapv(|v| v - response_mean);

        // Augmented cross product matrix [[ZᵀZ, Zᵀy], [yᵀZ, yᵀy]]
        let mut m: Array2<f64> = Array2::zeros((p + 1, p + 1));
        m.slice_mut(ndarray::s![..p, ..p])
            .assign(&standardised.t().dot(&standardised));
        let zy = standardised.t().dot(&dy);
        m.slice_mut(ndarray::s![..p, p]).assign(&zy);
        m.slice_mut(ndarray::s![p, ..p]).assign(&zy);
        m[[p, p]] = dy.dot(&dy);

        let mut kept = vec![false; p];
        for k in 0..p {
            if scales[k] > 0.0 && m[[k, k]] > PIVOT_TOLERANCE * count {
                sweep(&mut m, k);
                kept[k] = true;
            }
        }
        if !kept.iter().any(|k| *k) {
            return Err(Error::DegenerateFit { points: n });
        }
        let dropped: Vec<&str> = FEATURES
            .iter()
            .zip(&kept)
            .filter(|(_, k)| !**k)
            .map(|(feature, _)| *feature)
            .collect();
        debug!(?dropped, "joint features left out");

        let coefficients = Array1::from_shape_fn(p, |k| if kept[k] { m[[k, p]] } else { 0.0 });
        let residuals = &dy - &standardised.dot(&coefficients);
        let rmse = (residuals.dot(&residuals) / count).sqrt();

        Ok(Self {
            means,
            scales,
            coefficients,
            kept,
            response_mean,
            rmse,
            rows: n,
        })
    }

    #[must_use]
    pub fn predict(&self, features: &Features) -> f64 {
        self.response_mean
            + features
                .iter()
                .enumerate()
                .filter(|(k, _)| self.kept[*k])
                .map(|(k, value)| self.coefficients[k] * (value - self.means[k]) / self.scales[k])
                .sum::<f64>()
    }

    #[must_use]
    pub const fn rmse(&self) -> f64 {
        self.rmse
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Intercept and coefficients expressed in the units of the raw features
    #[must_use]
    pub fn terms(&self) -> (f64, Vec<JointTerm>) {
        let terms: Vec<JointTerm> = FEATURES
            .iter()
            .enumerate()
            .map(|(k, feature)| JointTerm {
                feature: *feature,
                coefficient: if self.kept[k] {
                    self.coefficients[k] / self.scales[k]
                } else {
                    0.0
                },
                kept: self.kept[k],
            })
            .collect();
        let intercept = self.response_mean
            - terms
                .iter()
                .zip(&self.means)
                .map(|(term, mean)| term.coefficient * mean)
                .sum::<f64>();
        (intercept, terms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JointEstimate {
    pub value: f64,
    pub unclipped: f64,
    pub unit: &'static str,
    pub rmse: f64,
    pub training_rows: usize,
    pub intercept: f64,
    pub terms: Vec<JointTerm>,
}

/// Estimate `query` with a single model over all reference samples
///
/// # Errors
/// - [`Error::CompositionInvalid`] or [`Error::MissingBodyColor`] for an unusable query
/// - [`Error::DataUnavailable`] or [`Error::NoData`] if there is nothing to learn from
/// - [`Error::InsufficientData`] or [`Error::DegenerateFit`] if no model can be fit
pub fn estimate_joint<S: TableSource + ?Sized>(
    source: &S,
    query: &QueryComposition,
    config: &Config,
) -> Result<JointEstimate> {
    query.validate()?;
    let color = query.body_color.ok_or(Error::MissingBodyColor)?;
    let table = load_reference(source)?;

    let estimation = &config.estimation;
    let model = JointModel::fit(&table, estimation)?;
    let composition = query.composition;
    let unclipped = model.predict(&features(
        query.input,
        [
            composition.natural,
            composition.black,
            composition.white,
            composition.denim,
        ],
        color,
    ));
    let value = estimation.output_domain().clamp(unclipped);
    let (intercept, terms) = model.terms();

    info!(
        value,
        unit = estimation.output_unit(),
        rows = model.rows(),
        rmse = model.rmse(),
        "estimated sample with joint model"
    );

    Ok(JointEstimate {
        value,
        unclipped,
        unit: estimation.output_unit(),
        rmse: model.rmse(),
        training_rows: model.rows(),
        intercept,
        terms,
    })
}
