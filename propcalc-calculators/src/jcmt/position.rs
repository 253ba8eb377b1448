//! Source position descriptions for JCMT calculators.
//!
//! A source position may be entered in one of four ways, each with its own
//! valid range:
//!
//! | Code | Meaning | Range |
//! |------|---------|-------|
//! | `dec` | Declination (source assumed at transit) | -90 ≤ δ ≤ 90 |
//! | `el` | Elevation | 0 < el ≤ 90 |
//! | `zen` | Zenith angle | 0 ≤ za < 90 |
//! | `am` | Airmass | 1 ≤ A ≤ 5 |

use propcalc_core::errors::{CalcError, CalcResult};
use propcalc_core::parse::validate_airmass;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Geodetic latitude of the JCMT.
/// unit: degrees
pub const JCMT_LATITUDE: f64 = 19.8225;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
pub enum PositionType {
    #[strum(serialize = "dec")]
    #[serde(rename = "dec")]
    Declination,
    #[strum(serialize = "el")]
    #[serde(rename = "el")]
    Elevation,
    #[strum(serialize = "zen")]
    #[serde(rename = "zen")]
    ZenithAngle,
    #[strum(serialize = "am")]
    #[serde(rename = "am")]
    Airmass,
}

impl PositionType {
    /// Parse a position type code as submitted by a form.
    pub fn from_code(code: &str) -> CalcResult<Self> {
        code.parse()
            .map_err(|_| CalcError::user(format!("Unknown source position type '{code}'.")))
    }

    pub fn name(&self) -> &'static str {
        match self {
            PositionType::Declination => "Declination",
            PositionType::Elevation => "Elevation",
            PositionType::ZenithAngle => "Zenith angle",
            PositionType::Airmass => "Airmass",
        }
    }

    pub fn unit(&self) -> Option<&'static str> {
        match self {
            PositionType::Airmass => None,
            _ => Some("\u{b0}"),
        }
    }

    /// Check that a position value is within the range for this type.
    pub fn validate(&self, value: f64) -> CalcResult<()> {
        let (valid, range) = match self {
            PositionType::Declination => (
                (-90.0..=90.0).contains(&value),
                "between -90 and 90 degrees",
            ),
            PositionType::Elevation => (
                value > 0.0 && value <= 90.0,
                "greater than 0 and at most 90 degrees",
            ),
            PositionType::ZenithAngle => (
                (0.0..90.0).contains(&value),
                "at least 0 and less than 90 degrees",
            ),
            PositionType::Airmass => return validate_airmass(value),
        };
        if valid {
            return Ok(());
        }
        Err(CalcError::user(format!("{} should be {}.", self.name(), range)))
    }

    /// Zenith angle in degrees for a position of this type.
    ///
    /// A declination is taken to be observed at transit.
    pub fn zenith_angle(&self, value: f64) -> CalcResult<f64> {
        self.validate(value)?;
        let zenith_angle = match self {
            PositionType::Declination => (value - JCMT_LATITUDE).abs(),
            PositionType::Elevation => 90.0 - value,
            PositionType::ZenithAngle => value,
            PositionType::Airmass => (1.0 / value).acos().to_degrees(),
        };

        if zenith_angle >= 90.0 {
            return Err(CalcError::user(
                "The source does not rise above the horizon at the JCMT.",
            ));
        }
        Ok(zenith_angle)
    }

    /// Airmass for a position of this type, using the plane-parallel approximation.
    pub fn airmass(&self, value: f64) -> CalcResult<f64> {
        match self {
            PositionType::Airmass => {
                self.validate(value)?;
                Ok(value)
            }
            _ => Ok(1.0 / self.zenith_angle(value)?.to_radians().cos()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use strum::IntoEnumIterator;

    #[test]
    fn test_codes() {
        let codes: Vec<_> = PositionType::iter().map(|p| p.to_string()).collect();
        assert_eq!(codes, ["dec", "el", "zen", "am"]);
        assert_eq!(PositionType::from_code("am").unwrap(), PositionType::Airmass);
        assert!(PositionType::from_code("ra").unwrap_err().is_user_error());
    }

    #[test]
    fn test_declination_boundaries() {
        let dec = PositionType::Declination;
        assert!(dec.validate(-90.0).is_ok());
        assert!(dec.validate(90.0).is_ok());
        assert!(dec.validate(-90.0001).is_err());
        assert!(dec.validate(90.0001).is_err());
        assert_eq!(
            dec.validate(91.0).unwrap_err().to_string(),
            "Declination should be between -90 and 90 degrees."
        );
    }

    #[test]
    fn test_airmass_boundaries() {
        let am = PositionType::Airmass;
        assert!(am.validate(1.0).is_ok());
        assert!(am.validate(5.0).is_ok());
        assert!(am.validate(0.999).is_err());
        assert!(am.validate(5.001).is_err());
    }

    #[test]
    fn test_elevation_and_zenith_boundaries() {
        assert!(PositionType::Elevation.validate(0.0).is_err());
        assert!(PositionType::Elevation.validate(90.0).is_ok());
        assert!(PositionType::ZenithAngle.validate(0.0).is_ok());
        assert!(PositionType::ZenithAngle.validate(90.0).is_err());
    }

    #[test]
    fn test_zenith_angle() {
        assert!(is_close!(
            PositionType::Declination.zenith_angle(JCMT_LATITUDE).unwrap(),
            0.0
        ));
        assert!(is_close!(
            PositionType::Declination.zenith_angle(-10.0).unwrap(),
            29.8225
        ));
        assert!(is_close!(PositionType::Elevation.zenith_angle(30.0).unwrap(), 60.0));
        assert!(is_close!(PositionType::Airmass.zenith_angle(2.0).unwrap(), 60.0));
    }

    #[test]
    fn test_source_below_horizon() {
        let err = PositionType::Declination.zenith_angle(-75.0).unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_airmass() {
        assert!(is_close!(PositionType::ZenithAngle.airmass(60.0).unwrap(), 2.0));
        assert!(is_close!(PositionType::Airmass.airmass(1.5).unwrap(), 1.5));
        assert!(is_close!(
            PositionType::Declination.airmass(JCMT_LATITUDE).unwrap(),
            1.0
        ));
    }
}
