//! JCMT weather bands.
//!
//! Weather is graded by the 225 GHz zenith opacity:
//!
//! | Band | 225 GHz opacity | Representative |
//! |------|-----------------|----------------|
//! | 1 | < 0.05 | 0.045 |
//! | 2 | 0.05 – 0.08 | 0.065 |
//! | 3 | 0.08 – 0.12 | 0.1 |
//! | 4 | 0.12 – 0.2 | 0.16 |
//! | 5 | 0.2 – 0.32 | 0.25 |

use propcalc_core::errors::CalcResult;
use propcalc_core::result::{BandComparison, WeatherComparison};
use serde::Serialize;

/// Absolute tolerance when matching an opacity to a band's representative value.
pub const TAU_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeatherBand {
    pub id: u32,
    pub name: &'static str,
    /// Representative 225 GHz opacity
    pub rep: f64,
    /// Lower limit, if any
    pub min: Option<f64>,
    /// Upper limit, if any
    pub max: Option<f64>,
    /// Whether the band is offered for observing requests
    pub available: bool,
}

pub static WEATHER_BANDS: [WeatherBand; 5] = [
    WeatherBand {
        id: 1,
        name: "Band 1",
        rep: 0.045,
        min: None,
        max: Some(0.05),
        available: true,
    },
    WeatherBand {
        id: 2,
        name: "Band 2",
        rep: 0.065,
        min: Some(0.05),
        max: Some(0.08),
        available: true,
    },
    WeatherBand {
        id: 3,
        name: "Band 3",
        rep: 0.1,
        min: Some(0.08),
        max: Some(0.12),
        available: true,
    },
    WeatherBand {
        id: 4,
        name: "Band 4",
        rep: 0.16,
        min: Some(0.12),
        max: Some(0.2),
        available: true,
    },
    WeatherBand {
        id: 5,
        name: "Band 5",
        rep: 0.25,
        min: Some(0.2),
        max: Some(0.32),
        available: true,
    },
];

pub fn band(id: u32) -> Option<&'static WeatherBand> {
    WEATHER_BANDS.iter().find(|band| band.id == id)
}

/// The first band whose representative opacity matches `tau`.
///
/// `None` means the opacity is a custom value.
pub fn band_for_tau(tau: f64) -> Option<&'static WeatherBand> {
    WEATHER_BANDS
        .iter()
        .find(|band| (band.rep - tau).abs() <= TAU_TOLERANCE)
}

/// Evaluate a metric at the representative and limiting opacities of every
/// available band.
///
/// A failed evaluation is recorded as `None` and does not stop the sweep.
pub fn weather_comparison<F>(mut metric: F) -> WeatherComparison
where
    F: FnMut(f64) -> CalcResult<f64>,
{
    let mut evaluate = |band: &WeatherBand, tau: Option<f64>| -> Option<f64> {
        let tau = tau?;
        match metric(tau) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!(
                    "Weather comparison failed for {} at tau {}: {}",
                    band.name,
                    tau,
                    err
                );
                None
            }
        }
    };

    let mut comparison = WeatherComparison::new();
    for band in WEATHER_BANDS.iter().filter(|band| band.available) {
        let entry = BandComparison {
            rep: evaluate(band, Some(band.rep)),
            min: evaluate(band, band.min),
            max: evaluate(band, band.max),
        };
        comparison.insert(band.id, entry);
    }
    comparison
}

#[cfg(test)]
mod tests {
    use super::*;
    use propcalc_core::errors::CalcError;

    #[test]
    fn test_band_for_tau_tolerance() {
        assert_eq!(band_for_tau(0.065).unwrap().id, 2);
        assert_eq!(band_for_tau(0.065 + 0.9e-4).unwrap().id, 2);
        assert_eq!(band_for_tau(0.1 - 0.5e-4).unwrap().id, 3);
        assert!(band_for_tau(0.065 + 1.1e-4).is_none());
        assert!(band_for_tau(0.07).is_none());
    }

    #[test]
    fn test_band_lookup() {
        assert_eq!(band(4).unwrap().rep, 0.16);
        assert!(band(6).is_none());
    }

    #[test]
    fn test_band_limits_are_contiguous() {
        for pair in WEATHER_BANDS.windows(2) {
            assert_eq!(pair[0].max, pair[1].min);
            assert!(pair[0].rep < pair[1].rep);
        }
    }

    #[test]
    fn test_comparison_covers_limits() {
        let comparison = weather_comparison(Ok);
        assert_eq!(comparison.len(), WEATHER_BANDS.len());

        let band_1 = comparison.get(1).unwrap();
        assert_eq!(band_1.rep, Some(0.045));
        assert_eq!(band_1.min, None);
        assert_eq!(band_1.max, Some(0.05));
    }

    #[test]
    fn test_comparison_tolerates_failures() {
        let comparison = weather_comparison(|tau| {
            if tau > 0.15 {
                Err(CalcError::user("Too wet"))
            } else {
                Ok(1.0 / tau)
            }
        });

        let band_3 = comparison.get(3).unwrap();
        assert!(band_3.rep.is_some());
        assert!(band_3.max.is_some());

        let band_4 = comparison.get(4).unwrap();
        assert!(band_4.min.is_some());
        assert_eq!(band_4.rep, None);
        assert_eq!(band_4.max, None);

        let band_5 = comparison.get(5).unwrap();
        assert_eq!(*band_5, BandComparison::default());
    }
}
