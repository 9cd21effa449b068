use ndarray::Array1;
use num_traits::Float;

use crate::{Error, Result};

/// Fewest points a straight line can be fit through
pub const MIN_POINTS: usize = 2;

/// An ordinary least squares straight line `y = slope * x + intercept`
#[derive(Clone, Debug, PartialEq)]
pub struct LinearFit<E> {
    slope: E,
    intercept: E,
    /// Root mean square of the training residuals
    rmse: E,
    /// Smallest and largest response seen in training
    response_window: (E, E),
    points: usize,
}

/// A point prediction with a residual based uncertainty band
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction<E> {
    pub value: E,
    pub lower: E,
    pub upper: E,
    pub rmse: E,
    /// Whether the raw line value fell outside the training responses and was clipped
    pub clipped: bool,
}

/// Fit a straight line through `(x, y)` pairs by ordinary least squares
///
/// # Errors
/// - [`Error::InsufficientData`] for fewer than two pairs
/// - [`Error::DegenerateFit`] if every `x` is identical. There is no slope to recover in that
///   case, and the caller is expected to skip the data set rather than use a constant.
pub fn fit<E: Float>(pairs: &[(E, E)]) -> Result<LinearFit<E>> {
    if pairs.len() < MIN_POINTS {
        return Err(Error::InsufficientData {
            required: MIN_POINTS,
            available: pairs.len(),
        });
    }

    let x: Array1<E> = pairs.iter().map(|(x, _)| *x).collect();
    let y: Array1<E> = pairs.iter().map(|(_, y)| *y).collect();

    if x.iter().all(|xi| *xi == x[0]) {
        return Err(Error::DegenerateFit {
            points: pairs.len(),
        });
    }

    let n = E::from(pairs.len()).expect("usize must fit in `E`");
    let x_mean = x.sum() / n;
    let y_mean = y.sum() / n;

    let dx = x.mapv(|xi| xi - x_mean);
    let dy = y.mapv(|yi| yi - y_mean);
    let sxx = (&dx * &dx).sum();
    if sxx <= E::zero() || !sxx.is_finite() {
        return Err(Error::DegenerateFit {
            points: pairs.len(),
        });
    }

    let slope = (&dx * &dy).sum() / sxx;
    let intercept = y_mean - slope * x_mean;

    let residuals = &y - &x.mapv(|xi| slope * xi + intercept);
    let rmse = (residuals.mapv(|r| r * r).sum() / n).sqrt();

    let response_window = y.iter().fold(
        (E::infinity(), E::neg_infinity()),
        |(lo, hi), yi| (lo.min(*yi), hi.max(*yi)),
    );

    Ok(LinearFit {
        slope,
        intercept,
        rmse,
        response_window,
        points: pairs.len(),
    })
}

impl<E: Float> LinearFit<E> {
    pub const fn slope(&self) -> E {
        self.slope
    }

    pub const fn intercept(&self) -> E {
        self.intercept
    }

    pub const fn rmse(&self) -> E {
        self.rmse
    }

    pub const fn response_window(&self) -> (E, E) {
        self.response_window
    }

    pub const fn points(&self) -> usize {
        self.points
    }

    pub fn window_contains(&self, y: E) -> bool {
        let (lo, hi) = self.response_window;
        lo <= y && y <= hi
    }

    /// Evaluate the fitted line
    pub fn predict(&self, x: E) -> E {
        self.slope * x + self.intercept
    }

    /// Evaluate the line, clipped into the observed response range, with a `± rmse` band
    ///
    /// Clipping stops extrapolated inputs leaving the range the training data covers. For
    /// inputs that genuinely lie beyond it the prediction is biased towards the nearest edge.
    pub fn predict_with_confidence(&self, x: E) -> Prediction<E> {
        let raw = self.predict(x);
        let (lo, hi) = self.response_window;
        let value = raw.max(lo).min(hi);
        Prediction {
            value,
            lower: value - self.rmse,
            upper: value + self.rmse,
            rmse: self.rmse,
            clipped: !self.window_contains(raw),
        }
    }
}
