use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::derived::{self, DerivedQuantities};
use crate::fiber::Composition;
use crate::{Error, Result};

/// Largest emission count the reader reports
pub const MAX_EMISSION_COUNT: u32 = 100_000;

/// Color of the ashed sample body
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl BodyColor {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Hex notation, `#rrggbb`
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    fn parse_hex(digits: &str) -> Option<Self> {
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    fn parse_rgb(channels: &str) -> Option<Self> {
        let mut values = channels.split(',').map(|value| value.trim().parse::<u8>());
        let color = Self::new(
            values.next()?.ok()?,
            values.next()?.ok()?,
            values.next()?.ok()?,
        );
        values.next().is_none().then_some(color)
    }
}

/// Stored representation, `rgb(r,g,b)`
impl fmt::Display for BodyColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

/// Accepts both `rgb(r,g,b)` and `#rrggbb`
impl FromStr for BodyColor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parsed = if let Some(digits) = s.strip_prefix('#') {
            Self::parse_hex(digits)
        } else {
            s.strip_prefix("rgb(")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(Self::parse_rgb)
        };
        parsed.ok_or_else(|| Error::InvalidEntry {
            field: "body_color",
            reason: format!("`{s}` is neither rgb(r,g,b) nor #rrggbb"),
        })
    }
}

/// One recorded calibration row
///
/// Numeric fields are optional because imported rows may hold empty or malformed cells; those
/// are coerced to `None` on load rather than failing the whole table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceSample {
    pub lot_id: String,
    pub natural: Option<f64>,
    pub black: Option<f64>,
    pub white: Option<f64>,
    pub denim: Option<f64>,
    /// Fraction of one
    pub mastermix_dosage: Option<f64>,
    /// Percentage of marker in the dosed fiber
    pub luminescent_content: Option<f64>,
    /// Percentage of marked material in the finished sample
    pub marked_fiber_share: Option<f64>,
    pub marker_concentration_ppm: Option<f64>,
    pub effective_dosage_ppm: Option<f64>,
    pub emission_count: Option<u32>,
    pub body_color: Option<BodyColor>,
}

impl ReferenceSample {
    /// The fiber blend, if every fraction is present
    #[must_use]
    pub fn composition(&self) -> Option<Composition> {
        Some(Composition::new(
            self.natural?,
            self.black?,
            self.white?,
            self.denim?,
        ))
    }
}

/// A reference measurement as entered by a technician, before derived fields exist
#[derive(Clone, Debug, PartialEq)]
pub struct NewEntry {
    pub lot_id: String,
    pub composition: Composition,
    pub mastermix_dosage: f64,
    pub luminescent_content: f64,
    pub marked_fiber_share: f64,
    pub emission_count: u32,
    pub body_color: BodyColor,
}

impl NewEntry {
    /// Check the entry against the bounds of the entry form
    ///
    /// # Errors
    /// [`Error::CompositionInvalid`] if the fiber fractions do not sum to 100%, otherwise
    /// [`Error::InvalidEntry`] naming the first out of range field.
    pub fn validate(&self) -> Result<()> {
        self.composition.validate()?;
        derived::validate_inputs(
            self.mastermix_dosage,
            self.luminescent_content,
            self.marked_fiber_share,
        )?;

        if self.emission_count > MAX_EMISSION_COUNT {
            return Err(Error::InvalidEntry {
                field: "emission_count",
                reason: format!("{} exceeds {MAX_EMISSION_COUNT}", self.emission_count),
            });
        }
        Ok(())
    }

    /// Validate the entry and compute its derived quantities
    ///
    /// # Errors
    /// Propagates validation failures from [`NewEntry::validate`].
    pub fn into_sample(self) -> Result<ReferenceSample> {
        self.validate()?;
        let derived = DerivedQuantities::compute(
            self.mastermix_dosage,
            self.luminescent_content,
            self.marked_fiber_share,
        );
        Ok(ReferenceSample {
            lot_id: self.lot_id,
            natural: Some(self.composition.natural),
            black: Some(self.composition.black),
            white: Some(self.composition.white),
            denim: Some(self.composition.denim),
            mastermix_dosage: Some(self.mastermix_dosage),
            luminescent_content: Some(self.luminescent_content),
            marked_fiber_share: Some(self.marked_fiber_share),
            marker_concentration_ppm: Some(derived.marker_concentration_ppm),
            effective_dosage_ppm: Some(derived.effective_dosage_ppm),
            emission_count: Some(self.emission_count),
            body_color: Some(self.body_color),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{BodyColor, NewEntry};
    use crate::fiber::Composition;
    use crate::Error;

    fn entry() -> NewEntry {
        NewEntry {
            lot_id: "L-001".into(),
            composition: Composition::new(60.0, 0.0, 40.0, 0.0),
            mastermix_dosage: 0.005,
            luminescent_content: 4.0,
            marked_fiber_share: 20.0,
            emission_count: 1200,
            body_color: BodyColor::new(211, 211, 211),
        }
    }

    #[test]
    fn body_colors_parse_from_both_notations() {
        let from_rgb: BodyColor = "rgb(211,211,211)".parse().unwrap();
        let from_spaced: BodyColor = "rgb(211, 211, 211)".parse().unwrap();
        let from_hex: BodyColor = "#D3D3D3".parse().unwrap();

        assert_eq!(from_rgb, BodyColor::new(211, 211, 211));
        assert_eq!(from_rgb, from_spaced);
        assert_eq!(from_rgb, from_hex);
    }

    #[test]
    fn body_color_displays_in_stored_notation() {
        let color = BodyColor::new(1, 22, 255);
        assert_eq!(color.to_string(), "rgb(1,22,255)");
        assert_eq!(color.to_hex(), "#0116ff");
    }

    #[test]
    fn malformed_body_colors_are_rejected() {
        for input in ["", "#12345", "#gggggg", "rgb(1,2)", "rgb(1,2,3,4)", "rgb(1,2,300)", "red"] {
            assert!(input.parse::<BodyColor>().is_err(), "{input} should not parse");
        }
    }

    #[test]
    fn valid_entry_becomes_sample_with_derived_fields() {
        let sample = entry().into_sample().unwrap();

        assert_eq!(sample.lot_id, "L-001");
        assert_eq!(sample.white, Some(40.0));
        approx::assert_relative_eq!(sample.marker_concentration_ppm.unwrap(), 2.0);
        approx::assert_relative_eq!(sample.effective_dosage_ppm.unwrap(), 0.4);
        assert_eq!(sample.composition(), Some(Composition::new(60.0, 0.0, 40.0, 0.0)));
    }

    #[test]
    fn entry_with_bad_composition_is_rejected() {
        let mut entry = entry();
        entry.composition.white = 10.0;
        assert!(matches!(entry.into_sample(), Err(Error::CompositionInvalid { .. })));
    }

    #[test]
    fn entry_with_percentage_dosage_is_rejected() {
        let mut entry = entry();
        entry.mastermix_dosage = 5.0;
        assert!(matches!(
            entry.validate(),
            Err(Error::InvalidEntry {
                field: "mastermix_dosage",
                ..
            })
        ));
    }

    #[test]
    fn entry_with_excessive_emission_count_is_rejected() {
        let mut entry = entry();
        entry.emission_count = 100_001;
        assert!(matches!(
            entry.validate(),
            Err(Error::InvalidEntry {
                field: "emission_count",
                ..
            })
        ));
    }
}
