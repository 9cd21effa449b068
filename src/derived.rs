//! Quantities derived from the raw entry fields of a reference sample
//!
//! The mastermix dosage is a fraction of one (the entry form bounds it to `[0, 1]`), while the
//! luminescent content and marked fiber share are percentages. With those units the marker
//! concentration in the dosed fiber is
//!
//! $$
//!     c_{marker} = d \cdot \frac{l}{100} \cdot 10^4 \quad \text{ppm}
//! $$
//!
//! and the effective dosage in the finished sample scales that by the marked share
//!
//! $$
//!     c_{effective} = c_{marker} \cdot \frac{s}{100} \quad \text{ppm}.
//! $$

use crate::{Error, Result};

/// Decimal places kept when derived quantities are stored
pub const STORED_DECIMALS: i32 = 2;

/// Marker concentration in the dosed fiber in ppm
#[must_use]
pub fn marker_concentration_ppm(dosage_fraction: f64, luminescent_content_percent: f64) -> f64 {
    dosage_fraction * (luminescent_content_percent / 100.0) * 10_000.0
}

/// Effective marker dosage of the finished sample in ppm
#[must_use]
pub fn effective_dosage_ppm(marker_concentration_ppm: f64, marked_fiber_share_percent: f64) -> f64 {
    marker_concentration_ppm * (marked_fiber_share_percent / 100.0)
}

/// Round to the precision derived quantities are stored with
#[must_use]
pub fn round_stored(value: f64) -> f64 {
    let scale = 10f64.powi(STORED_DECIMALS);
    (value * scale).round() / scale
}

/// Check the raw fields lie within the bounds of the entry form
///
/// The dosage is a fraction of one, the content and share are percentages.
///
/// # Errors
/// [`Error::InvalidEntry`] naming the first field out of range.
pub fn validate_inputs(
    dosage_fraction: f64,
    luminescent_content_percent: f64,
    marked_fiber_share_percent: f64,
) -> Result<()> {
    let check = |field: &'static str, value: f64, upper: f64| {
        if value.is_finite() && (0.0..=upper).contains(&value) {
            Ok(())
        } else {
            Err(Error::InvalidEntry {
                field,
                reason: format!("{value} is outside [0, {upper}]"),
            })
        }
    };
    check("mastermix_dosage", dosage_fraction, 1.0)?;
    check("luminescent_content", luminescent_content_percent, 100.0)?;
    check("marked_fiber_share", marked_fiber_share_percent, 100.0)
}

/// Both derived quantities, rounded for storage
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivedQuantities {
    pub marker_concentration_ppm: f64,
    pub effective_dosage_ppm: f64,
}

impl DerivedQuantities {
    /// Compute the stored quantities from the raw entry fields
    ///
    /// The effective dosage is computed from the unrounded marker concentration, only the
    /// stored values are rounded.
    #[must_use]
    pub fn compute(
        dosage_fraction: f64,
        luminescent_content_percent: f64,
        marked_fiber_share_percent: f64,
    ) -> Self {
        let marker = marker_concentration_ppm(dosage_fraction, luminescent_content_percent);
        let effective = effective_dosage_ppm(marker, marked_fiber_share_percent);
        Self {
            marker_concentration_ppm: round_stored(marker),
            effective_dosage_ppm: round_stored(effective),
        }
    }

    /// As [`DerivedQuantities::compute`], after checking the inputs with [`validate_inputs`]
    ///
    /// # Errors
    /// [`Error::InvalidEntry`] if an input is out of range.
    pub fn checked(
        dosage_fraction: f64,
        luminescent_content_percent: f64,
        marked_fiber_share_percent: f64,
    ) -> Result<Self> {
        validate_inputs(
            dosage_fraction,
            luminescent_content_percent,
            marked_fiber_share_percent,
        )?;
        Ok(Self::compute(
            dosage_fraction,
            luminescent_content_percent,
            marked_fiber_share_percent,
        ))
    }
}
