//! Physical units used by calculator fields.
//!
//! A small registry of the units that appear in instrument calculators
//! (frequencies, velocities, times and angles), each with its dimension and
//! its conversion factor to the SI base unit.
//!
//! # Conversion Factor Convention
//!
//! All conversion factors are the multiplier to convert FROM the registered
//! unit TO the SI base unit, e.g. `GHz` has factor 1e9 and `h` has 3600.
//!
//! # Example
//!
//! ```
//! use propcalc_core::units::{convert, Unit};
//!
//! let mhz = Unit::parse("MHz").unwrap();
//! let ghz = Unit::parse("GHz").unwrap();
//! assert_eq!(mhz.conversion_factor(&ghz).unwrap(), 1e-3);
//!
//! assert_eq!(convert(1.5, "h", "s").unwrap(), 5400.0);
//! assert!(convert(1.0, "km/s", "MHz").is_err());
//! ```

use serde::Serialize;
use strum_macros::Display;
use thiserror::Error;

/// Speed of light in km/s.
pub const SPEED_OF_LIGHT_KMS: f64 = 299_792.458;

/// Seconds per hour.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Physical dimension of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
pub enum Dimension {
    Frequency,
    Velocity,
    Time,
    Angle,
}

/// Error type for unit lookup and conversion failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("unknown unit: '{0}'")]
    UnknownUnit(String),
    #[error("cannot convert from '{from_unit}' to '{to_unit}': incompatible dimensions ({from} vs {to})")]
    IncompatibleDimensions {
        from: Dimension,
        to: Dimension,
        from_unit: String,
        to_unit: String,
    },
}

/// A known unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Unit {
    /// Canonical symbol
    pub symbol: &'static str,
    /// Other accepted spellings
    #[serde(skip)]
    pub aliases: &'static [&'static str],
    pub dimension: Dimension,
    /// Conversion factor to SI base units
    pub to_si_factor: f64,
}

/// All registered units.
pub static UNITS: &[Unit] = &[
    Unit {
        symbol: "Hz",
        aliases: &["hz"],
        dimension: Dimension::Frequency,
        to_si_factor: 1.0,
    },
    Unit {
        symbol: "kHz",
        aliases: &["khz"],
        dimension: Dimension::Frequency,
        to_si_factor: 1e3,
    },
    Unit {
        symbol: "MHz",
        aliases: &["mhz"],
        dimension: Dimension::Frequency,
        to_si_factor: 1e6,
    },
    Unit {
        symbol: "GHz",
        aliases: &["ghz"],
        dimension: Dimension::Frequency,
        to_si_factor: 1e9,
    },
    Unit {
        symbol: "THz",
        aliases: &["thz"],
        dimension: Dimension::Frequency,
        to_si_factor: 1e12,
    },
    Unit {
        symbol: "m/s",
        aliases: &["m s^-1"],
        dimension: Dimension::Velocity,
        to_si_factor: 1.0,
    },
    Unit {
        symbol: "km/s",
        aliases: &["km s^-1", "kms"],
        dimension: Dimension::Velocity,
        to_si_factor: 1e3,
    },
    Unit {
        symbol: "s",
        aliases: &["sec", "secs", "second", "seconds"],
        dimension: Dimension::Time,
        to_si_factor: 1.0,
    },
    Unit {
        symbol: "min",
        aliases: &["m", "mins", "minute", "minutes"],
        dimension: Dimension::Time,
        to_si_factor: 60.0,
    },
    Unit {
        symbol: "h",
        aliases: &["hr", "hrs", "hour", "hours"],
        dimension: Dimension::Time,
        to_si_factor: SECONDS_PER_HOUR,
    },
    Unit {
        symbol: "arcsec",
        aliases: &["\""],
        dimension: Dimension::Angle,
        to_si_factor: std::f64::consts::PI / (180.0 * 3600.0),
    },
    Unit {
        symbol: "deg",
        aliases: &["degree", "degrees"],
        dimension: Dimension::Angle,
        to_si_factor: std::f64::consts::PI / 180.0,
    },
];

impl Unit {
    /// Look up a unit by symbol or alias.
    ///
    /// Surrounding whitespace and whitespace around `/` are ignored.
    pub fn parse(s: &str) -> Result<Unit, UnitError> {
        let normalized: String = s
            .trim()
            .split('/')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("/");

        UNITS
            .iter()
            .find(|u| u.symbol == normalized || u.aliases.contains(&normalized.as_str()))
            .copied()
            .ok_or(UnitError::UnknownUnit(s.to_string()))
    }

    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
    }

    /// Multiplier converting a value in this unit to `other`.
    pub fn conversion_factor(&self, other: &Unit) -> Result<f64, UnitError> {
        if !self.is_compatible(other) {
            return Err(UnitError::IncompatibleDimensions {
                from: self.dimension,
                to: other.dimension,
                from_unit: self.symbol.to_string(),
                to_unit: other.symbol.to_string(),
            });
        }
        Ok(self.to_si_factor / other.to_si_factor)
    }
}

/// Convert a value between two units given by symbol.
pub fn convert(value: f64, from: &str, to: &str) -> Result<f64, UnitError> {
    let factor = Unit::parse(from)?.conversion_factor(&Unit::parse(to)?)?;
    Ok(value * factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Unit::parse("km / s").unwrap().symbol, "km/s");
        assert_eq!(Unit::parse(" hours ").unwrap().symbol, "h");
        assert_eq!(Unit::parse("ghz").unwrap().symbol, "GHz");
        assert_eq!(
            Unit::parse("furlong"),
            Err(UnitError::UnknownUnit("furlong".to_string()))
        );
    }

    #[test]
    fn test_frequency_conversion() {
        assert!(is_close!(convert(345.796, "GHz", "MHz").unwrap(), 345796.0));
        assert!(is_close!(convert(500.0, "kHz", "MHz").unwrap(), 0.5));
    }

    #[test]
    fn test_time_conversion() {
        assert!(is_close!(convert(90.0, "min", "h").unwrap(), 1.5));
        assert!(is_close!(convert(2.0, "h", "s").unwrap(), 7200.0));
        assert!(is_close!(convert(30.0, "m", "hrs").unwrap(), 0.5));
    }

    #[test]
    fn test_frequency_range() {
        assert!(is_close!(convert(0.3457, "THz", "GHz").unwrap(), 345.7));
        assert_eq!(Unit::parse("m").unwrap().dimension, Dimension::Time);
    }

    #[test]
    fn test_angle_conversion() {
        assert!(is_close!(convert(1.0, "deg", "arcsec").unwrap(), 3600.0));
    }

    #[test]
    fn test_incompatible_dimensions() {
        let err = convert(1.0, "km/s", "GHz").unwrap_err();
        assert!(matches!(
            err,
            UnitError::IncompatibleDimensions {
                from: Dimension::Velocity,
                to: Dimension::Frequency,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "cannot convert from 'km/s' to 'GHz': incompatible dimensions (Velocity vs Frequency)"
        );
    }
}
