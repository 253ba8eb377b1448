//! Built-in SCUBA-2 integration time calculator.
//!
//! The noise reached in a map after an elapsed time $t$ is
//!
//! $$\sigma = \frac{\mathrm{NEFD} \, f_{map}}{T \sqrt{t \, s}}$$
//!
//! where $f_{map}$ is a factor for the observing pattern, $s$ the sampling
//! factor for the chosen pixel size and $T = e^{-\tau A}$ the atmospheric
//! transmission at airmass $A$.
//!
//! The zenith opacity in each filter is derived from the 225 GHz opacity:
//!
//! $$\tau_{850} = 4.6 (\tau_{225} - 0.0043) \qquad \tau_{450} = 26 (\tau_{225} - 0.01923)$$

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

use propcalc_core::errors::CalcError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Scuba2Error {
    #[error("Unknown map mode '{0}'.")]
    UnknownMapMode(String),
    #[error("The {0} must be positive.")]
    NotPositive(&'static str),
    #[error("The {filter} transmission ({transmission:.4}) is too low for a useful estimate.")]
    TransmissionTooLow { filter: Filter, transmission: f64 },
}

impl From<Scuba2Error> for CalcError {
    fn from(err: Scuba2Error) -> Self {
        CalcError::User(err.to_string())
    }
}

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
pub enum Filter {
    #[strum(serialize = "850")]
    #[serde(rename = "850")]
    F850,
    #[strum(serialize = "450")]
    #[serde(rename = "450")]
    F450,
}

impl Filter {
    pub fn name(&self) -> &'static str {
        match self {
            Filter::F850 => "850 \u{b5}m",
            Filter::F450 => "450 \u{b5}m",
        }
    }
}

/// How the map pixel size is chosen.
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
pub enum Sampling {
    /// Beam-sized pixels, as after applying a matched filter
    #[strum(serialize = "mf")]
    #[serde(rename = "mf")]
    MatchedFilter,
    /// The default pixel size of the map mode
    #[strum(serialize = "default")]
    #[serde(rename = "default")]
    MapDefault,
    #[strum(serialize = "custom")]
    #[serde(rename = "custom")]
    Custom,
}

impl Sampling {
    pub fn name(&self) -> &'static str {
        match self {
            Sampling::MatchedFilter => "Matched filter",
            Sampling::MapDefault => "Map default",
            Sampling::Custom => "Custom",
        }
    }
}

/// A SCUBA-2 observing pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMode {
    pub code: String,
    pub name: String,
    /// NEFD multiplier at 850 µm
    /// unit: dimensionless
    pub factor_850: f64,
    /// NEFD multiplier at 450 µm
    /// unit: dimensionless
    pub factor_450: f64,
    /// Default pixel size at 850 µm
    /// unit: arcsec
    pub pixel_850: f64,
    /// Default pixel size at 450 µm
    /// unit: arcsec
    pub pixel_450: f64,
}

fn map_mode(code: &str, name: &str, factor: f64, pixel_850: f64, pixel_450: f64) -> MapMode {
    MapMode {
        code: code.to_string(),
        name: name.to_string(),
        factor_850: factor,
        factor_450: factor,
        pixel_850,
        pixel_450,
    }
}

/// Parameters for the built-in SCUBA-2 calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scuba2Parameters {
    /// Noise equivalent flux density at 850 µm
    /// unit: mJy s^(1/2)
    /// default: 160.0
    pub nefd_850: f64,

    /// Noise equivalent flux density at 450 µm
    /// unit: mJy s^(1/2)
    /// default: 800.0
    pub nefd_450: f64,

    /// Scale of the 850 µm to 225 GHz opacity relation
    /// default: 4.6
    pub tau_850_scale: f64,

    /// 225 GHz opacity at which the 850 µm opacity vanishes
    /// default: 0.0043
    pub tau_850_offset: f64,

    /// Scale of the 450 µm to 225 GHz opacity relation
    /// default: 26.0
    pub tau_450_scale: f64,

    /// 225 GHz opacity at which the 450 µm opacity vanishes
    /// default: 0.01923
    pub tau_450_offset: f64,

    /// Pixel size at which the NEFD is quoted, 850 µm
    /// unit: arcsec
    /// default: 4.0
    pub reference_pixel_850: f64,

    /// Pixel size at which the NEFD is quoted, 450 µm
    /// unit: arcsec
    /// default: 2.0
    pub reference_pixel_450: f64,

    /// Effective pixel size after matched filtering, 850 µm
    /// unit: arcsec
    /// default: 14.5
    pub matched_filter_pixel_850: f64,

    /// Effective pixel size after matched filtering, 450 µm
    /// unit: arcsec
    /// default: 9.8
    pub matched_filter_pixel_450: f64,

    /// Lowest atmospheric transmission for which an estimate is given
    /// unit: dimensionless
    /// default: 0.01
    pub min_transmission: f64,

    pub map_modes: Vec<MapMode>,
}

impl Default for Scuba2Parameters {
    fn default() -> Self {
        Self {
            nefd_850: 160.0,
            nefd_450: 800.0,
            tau_850_scale: 4.6,
            tau_850_offset: 0.0043,
            tau_450_scale: 26.0,
            tau_450_offset: 0.01923,
            reference_pixel_850: 4.0,
            reference_pixel_450: 2.0,
            matched_filter_pixel_850: 14.5,
            matched_filter_pixel_450: 9.8,
            min_transmission: 0.01,
            map_modes: vec![
                map_mode("daisy", "Daisy", 1.0, 4.0, 2.0),
                map_mode("pong900", "Pong 900", 1.9, 4.0, 2.0),
                map_mode("pong1800", "Pong 1800", 2.9, 4.0, 2.0),
                map_mode("pong3600", "Pong 3600", 5.2, 8.0, 4.0),
                map_mode("pong7200", "Pong 7200", 9.6, 8.0, 4.0),
            ],
        }
    }
}

impl Scuba2Parameters {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

/// Everything the engine needs to know about an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scuba2Observation {
    pub map_mode: String,
    /// 225 GHz zenith opacity
    pub tau_225: f64,
    pub airmass: f64,
    /// unit: arcsec
    pub pixel_850: f64,
    /// unit: arcsec
    pub pixel_450: f64,
}

impl Scuba2Observation {
    pub fn pixel_size(&self, filter: Filter) -> f64 {
        match filter {
            Filter::F850 => self.pixel_850,
            Filter::F450 => self.pixel_450,
        }
    }
}

/// The interface of a SCUBA-2 sensitivity engine.
pub trait Scuba2Engine: Send + Sync {
    fn version(&self) -> String;

    fn map_modes(&self) -> &[MapMode];

    fn map_mode(&self, code: &str) -> Result<&MapMode, Scuba2Error> {
        self.map_modes()
            .iter()
            .find(|mode| mode.code == code)
            .ok_or_else(|| Scuba2Error::UnknownMapMode(code.to_string()))
    }

    /// Pixel size (arcsec) for a sampling choice, `None` if it is custom.
    fn pixel_size(
        &self,
        sampling: Sampling,
        map_mode: &str,
        filter: Filter,
    ) -> Result<Option<f64>, Scuba2Error>;

    /// Zenith opacity in a filter.
    fn opacity(&self, filter: Filter, tau_225: f64) -> f64;

    fn transmission(&self, obs: &Scuba2Observation, filter: Filter) -> f64 {
        (-self.opacity(filter, obs.tau_225) * obs.airmass).exp()
    }

    /// Elapsed time in seconds to reach an RMS (mJy/beam).
    fn time_for_rms(
        &self,
        obs: &Scuba2Observation,
        filter: Filter,
        rms: f64,
    ) -> Result<f64, Scuba2Error>;

    /// RMS (mJy/beam) reached after an elapsed time in seconds.
    fn rms_for_time(
        &self,
        obs: &Scuba2Observation,
        filter: Filter,
        time: f64,
    ) -> Result<f64, Scuba2Error>;
}

#[derive(Debug, Clone, Default)]
pub struct Scuba2Itc {
    parameters: Scuba2Parameters,
}

impl Scuba2Itc {
    pub fn from_parameters(parameters: Scuba2Parameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &Scuba2Parameters {
        &self.parameters
    }

    /// Dimensionless sampling factor of a pixel size relative to the
    /// reference pixel size.
    pub fn sampling_factor(&self, filter: Filter, pixel_size: f64) -> f64 {
        let reference = match filter {
            Filter::F850 => self.parameters.reference_pixel_850,
            Filter::F450 => self.parameters.reference_pixel_450,
        };
        (pixel_size / reference).powi(2)
    }

    /// NEFD of the map pattern, divided by transmission.
    fn effective_nefd(&self, obs: &Scuba2Observation, filter: Filter) -> Result<f64, Scuba2Error> {
        let mode = self.map_mode(&obs.map_mode)?;
        if obs.airmass <= 0.0 {
            return Err(Scuba2Error::NotPositive("airmass"));
        }
        if obs.pixel_size(filter) <= 0.0 {
            return Err(Scuba2Error::NotPositive("pixel size"));
        }

        let transmission = self.transmission(obs, filter);
        if transmission < self.parameters.min_transmission {
            return Err(Scuba2Error::TransmissionTooLow {
                filter,
                transmission,
            });
        }

        let (nefd, factor) = match filter {
            Filter::F850 => (self.parameters.nefd_850, mode.factor_850),
            Filter::F450 => (self.parameters.nefd_450, mode.factor_450),
        };
        Ok(nefd * factor / transmission)
    }
}

impl Scuba2Engine for Scuba2Itc {
    fn version(&self) -> String {
        format!("built-in {}", env!("CARGO_PKG_VERSION"))
    }

    fn map_modes(&self) -> &[MapMode] {
        &self.parameters.map_modes
    }

    fn pixel_size(
        &self,
        sampling: Sampling,
        map_mode: &str,
        filter: Filter,
    ) -> Result<Option<f64>, Scuba2Error> {
        let p = &self.parameters;
        Ok(match (sampling, filter) {
            (Sampling::MatchedFilter, Filter::F850) => Some(p.matched_filter_pixel_850),
            (Sampling::MatchedFilter, Filter::F450) => Some(p.matched_filter_pixel_450),
            (Sampling::MapDefault, Filter::F850) => Some(self.map_mode(map_mode)?.pixel_850),
            (Sampling::MapDefault, Filter::F450) => Some(self.map_mode(map_mode)?.pixel_450),
            (Sampling::Custom, _) => None,
        })
    }

    fn opacity(&self, filter: Filter, tau_225: f64) -> f64 {
        let p = &self.parameters;
        let tau = match filter {
            Filter::F850 => p.tau_850_scale * (tau_225 - p.tau_850_offset),
            Filter::F450 => p.tau_450_scale * (tau_225 - p.tau_450_offset),
        };
        tau.max(0.0)
    }

    fn time_for_rms(
        &self,
        obs: &Scuba2Observation,
        filter: Filter,
        rms: f64,
    ) -> Result<f64, Scuba2Error> {
        if rms <= 0.0 {
            return Err(Scuba2Error::NotPositive("target RMS"));
        }
        let nefd = self.effective_nefd(obs, filter)?;
        let sampling = self.sampling_factor(filter, obs.pixel_size(filter));
        Ok((nefd / rms).powi(2) / sampling)
    }

    fn rms_for_time(
        &self,
        obs: &Scuba2Observation,
        filter: Filter,
        time: f64,
    ) -> Result<f64, Scuba2Error> {
        if time <= 0.0 {
            return Err(Scuba2Error::NotPositive("time"));
        }
        let nefd = self.effective_nefd(obs, filter)?;
        let sampling = self.sampling_factor(filter, obs.pixel_size(filter));
        Ok(nefd / (time * sampling).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn observation() -> Scuba2Observation {
        Scuba2Observation {
            map_mode: "daisy".to_string(),
            tau_225: 0.065,
            airmass: 1.1,
            pixel_850: 4.0,
            pixel_450: 2.0,
        }
    }

    #[test]
    fn test_opacity_relations() {
        let itc = Scuba2Itc::default();
        assert_relative_eq!(
            itc.opacity(Filter::F850, 0.1),
            4.6 * (0.1 - 0.0043),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            itc.opacity(Filter::F450, 0.1),
            26.0 * (0.1 - 0.01923),
            max_relative = 1e-12
        );
        assert_eq!(itc.opacity(Filter::F450, 0.01), 0.0);
    }

    #[test]
    fn test_time_and_rms_are_consistent() {
        let itc = Scuba2Itc::default();
        let obs = observation();
        for filter in [Filter::F850, Filter::F450] {
            let time = itc.time_for_rms(&obs, filter, 2.0).unwrap();
            let rms = itc.rms_for_time(&obs, filter, time).unwrap();
            assert_relative_eq!(rms, 2.0, max_relative = 1e-10);
        }
    }

    #[test]
    fn test_sampling_reduces_time() {
        let itc = Scuba2Itc::default();
        let mut obs = observation();
        let fine = itc.time_for_rms(&obs, Filter::F850, 2.0).unwrap();
        obs.pixel_850 = 8.0;
        let coarse = itc.time_for_rms(&obs, Filter::F850, 2.0).unwrap();
        assert_relative_eq!(fine / coarse, 4.0, max_relative = 1e-10);
        assert_relative_eq!(itc.sampling_factor(Filter::F450, 9.8), 24.01, max_relative = 1e-12);
    }

    #[test]
    fn test_pixel_size() {
        let itc = Scuba2Itc::default();
        assert_eq!(
            itc.pixel_size(Sampling::MatchedFilter, "daisy", Filter::F850),
            Ok(Some(14.5))
        );
        assert_eq!(
            itc.pixel_size(Sampling::MapDefault, "pong3600", Filter::F450),
            Ok(Some(4.0))
        );
        assert_eq!(itc.pixel_size(Sampling::Custom, "daisy", Filter::F850), Ok(None));
        assert_eq!(
            itc.pixel_size(Sampling::MapDefault, "lissajous", Filter::F850),
            Err(Scuba2Error::UnknownMapMode("lissajous".to_string()))
        );
    }

    #[test]
    fn test_transmission_floor() {
        let itc = Scuba2Itc::default();
        let mut obs = observation();
        obs.tau_225 = 0.3;
        obs.airmass = 2.0;
        assert!(matches!(
            itc.rms_for_time(&obs, Filter::F450, 3600.0),
            Err(Scuba2Error::TransmissionTooLow {
                filter: Filter::F450,
                ..
            })
        ));
        assert!(itc.rms_for_time(&obs, Filter::F850, 3600.0).is_ok());
    }

    #[test]
    fn test_parameters_from_toml() {
        let params = Scuba2Parameters::from_toml_str(
            r#"
            nefd_850 = 200.0

            [[map_modes]]
            code = "daisy"
            name = "Daisy"
            factor_850 = 1.0
            factor_450 = 1.2
            pixel_850 = 4.0
            pixel_450 = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(params.nefd_850, 200.0);
        assert_eq!(params.nefd_450, 800.0);
        assert_eq!(params.map_modes.len(), 1);

        let text = Scuba2Parameters::default().to_toml_string().unwrap();
        assert_eq!(
            Scuba2Parameters::from_toml_str(&text).unwrap(),
            Scuba2Parameters::default()
        );
    }
}
