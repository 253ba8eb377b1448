//! Built-in heterodyne integration time calculator.
//!
//! Estimates the relationship between integration time and antenna
//! temperature noise for the JCMT heterodyne receivers using the radiometer
//! equation:
//!
//! $$\Delta T = \frac{K_{be} K_{sw} T_{sys}}{\sqrt{n_{pol} \Delta\nu \, t}}$$
//!
//! where the system temperature includes the receiver, the atmosphere and
//! the warm telescope surroundings:
//!
//! $$T_{sys} = \frac{T_{rx} + \eta_{tel} T_{atm} (1 - e^{-\tau A}) + (1 - \eta_{tel}) T_{amb}}{\eta_{tel} e^{-\tau A}}$$
//!
//! The opacity $\tau$ at the observing frequency is scaled from the 225 GHz
//! zenith opacity by an interpolated ratio table.
//!
//! Elapsed time is the integration time per point multiplied by the number of
//! points observed separately, the time spent off source and an overhead
//! factor for each mapping mode.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

use propcalc_core::errors::CalcError;
use propcalc_core::units::{convert, UnitError, SPEED_OF_LIGHT_KMS};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeterodyneError {
    #[error("Unknown receiver '{0}'.")]
    UnknownReceiver(String),
    #[error("The {mapping} mapping mode can not be used with {switching} switching.")]
    IncompatibleModes {
        mapping: MappingMode,
        switching: SwitchingMode,
    },
    #[error("Jiggle mapping requires an array receiver.")]
    JiggleRequiresArray,
    #[error("Dual polarization observations are not available with {0}.")]
    DualPolarizationUnavailable(String),
    #[error("The {0} must be positive.")]
    NotPositive(&'static str),
    #[error("The velocity must be less than the speed of light.")]
    VelocityTooHigh,
    #[error("The atmospheric transmission ({0:.3}) is too low for a useful estimate.")]
    TransmissionTooLow(f64),
    #[error(transparent)]
    Unit(#[from] UnitError),
}

impl From<HeterodyneError> for CalcError {
    fn from(err: HeterodyneError) -> Self {
        match err {
            HeterodyneError::Unit(err) => err.into(),
            err => CalcError::User(err.to_string()),
        }
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
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    Grid,
    Jiggle,
    Raster,
}

impl MappingMode {
    pub fn name(&self) -> &'static str {
        match self {
            MappingMode::Grid => "Grid",
            MappingMode::Jiggle => "Jiggle",
            MappingMode::Raster => "Raster",
        }
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
pub enum SwitchingMode {
    #[strum(serialize = "pssw")]
    #[serde(rename = "pssw")]
    Position,
    #[strum(serialize = "bmsw")]
    #[serde(rename = "bmsw")]
    Beam,
    #[strum(serialize = "frsw")]
    #[serde(rename = "frsw")]
    Frequency,
}

impl SwitchingMode {
    pub fn name(&self) -> &'static str {
        match self {
            SwitchingMode::Position => "Position switch",
            SwitchingMode::Beam => "Beam switch",
            SwitchingMode::Frequency => "Frequency switch",
        }
    }

    /// Noise penalty from the reference measurement.
    fn noise_factor(&self) -> f64 {
        match self {
            SwitchingMode::Position | SwitchingMode::Beam => std::f64::consts::SQRT_2,
            SwitchingMode::Frequency => 1.0,
        }
    }
}

/// Convention in which a radial velocity is given.
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
pub enum RvSystem {
    #[strum(serialize = "z")]
    #[serde(rename = "z")]
    Redshift,
    #[strum(serialize = "opt")]
    #[serde(rename = "opt")]
    Optical,
    #[strum(serialize = "rad")]
    #[serde(rename = "rad")]
    Radio,
}

impl RvSystem {
    pub fn name(&self) -> &'static str {
        match self {
            RvSystem::Redshift => "redshift",
            RvSystem::Optical => "optical velocity",
            RvSystem::Radio => "radio velocity",
        }
    }

    pub fn unit(&self) -> Option<&'static str> {
        match self {
            RvSystem::Redshift => None,
            _ => Some("km/s"),
        }
    }
}

/// Unit in which a spectral resolution is given.
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
pub enum ResolutionUnit {
    #[strum(serialize = "MHz")]
    #[serde(rename = "MHz")]
    Frequency,
    #[strum(serialize = "km/s")]
    #[serde(rename = "km/s")]
    Velocity,
}

/// A heterodyne receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    /// Identifier used in calculator input
    pub code: String,
    /// Display name
    pub name: String,
    /// Lowest sky frequency
    /// unit: GHz
    pub f_min: f64,
    /// Highest sky frequency
    /// unit: GHz
    pub f_max: f64,
    /// Receiver noise temperature
    /// unit: K
    pub t_rx: f64,
    /// Forward efficiency
    /// unit: dimensionless
    pub eta_tel: f64,
    /// Whether both polarizations can be combined
    pub dual_polarization: bool,
    /// Receptors along one side of the array (1 for single pixel receivers)
    pub array_size: u32,
}

impl Receiver {
    pub fn is_array(&self) -> bool {
        self.array_size > 1
    }
}

/// Parameters for the built-in heterodyne calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeterodyneParameters {
    /// Effective temperature of the atmosphere
    /// unit: K
    /// default: 260.0
    pub t_atm: f64,

    /// Ambient temperature of the telescope surroundings
    /// unit: K
    /// default: 270.0
    pub t_amb: f64,

    /// Noise degradation of the spectrometer
    /// unit: dimensionless
    /// default: 1.15
    pub backend_factor: f64,

    /// Lowest atmospheric transmission for which an estimate is given
    /// unit: dimensionless
    /// default: 0.05
    pub min_transmission: f64,

    /// Elapsed time overhead for grid observations
    /// default: 1.2
    pub grid_overhead: f64,

    /// Elapsed time overhead for jiggle observations
    /// default: 1.15
    pub jiggle_overhead: f64,

    /// Elapsed time overhead for raster observations
    /// default: 1.1
    pub raster_overhead: f64,

    /// Additional overhead for the faster switching of continuum mode
    /// default: 1.1
    pub continuum_overhead: f64,

    /// Additional overhead for the turnarounds of a basket weave
    /// default: 1.05
    pub basket_weave_overhead: f64,

    /// Ratio of zenith opacity to 225 GHz opacity as (frequency GHz, ratio)
    /// pairs in increasing frequency order
    pub opacity_ratios: Vec<(f64, f64)>,

    pub receivers: Vec<Receiver>,
}

impl Default for HeterodyneParameters {
    fn default() -> Self {
        Self {
            t_atm: 260.0,
            t_amb: 270.0,
            backend_factor: 1.15,
            min_transmission: 0.05,
            grid_overhead: 1.2,
            jiggle_overhead: 1.15,
            raster_overhead: 1.1,
            continuum_overhead: 1.1,
            basket_weave_overhead: 1.05,
            opacity_ratios: vec![
                (210.0, 0.95),
                (225.0, 1.0),
                (240.0, 1.15),
                (260.0, 1.45),
                (280.0, 1.85),
                (300.0, 2.6),
                (320.0, 3.0),
                (335.0, 3.3),
                (345.0, 3.55),
                (355.0, 4.1),
                (365.0, 5.1),
                (375.0, 7.0),
            ],
            receivers: vec![
                Receiver {
                    code: "HARP".to_string(),
                    name: "HARP".to_string(),
                    f_min: 325.0,
                    f_max: 375.0,
                    t_rx: 120.0,
                    eta_tel: 0.88,
                    dual_polarization: false,
                    array_size: 4,
                },
                Receiver {
                    code: "RxA3m".to_string(),
                    name: "RxA3m".to_string(),
                    f_min: 212.0,
                    f_max: 274.0,
                    t_rx: 70.0,
                    eta_tel: 0.88,
                    dual_polarization: false,
                    array_size: 1,
                },
                Receiver {
                    code: "Uu".to_string(),
                    name: "\u{2018}\u{16a}\u{2018}\u{16b}".to_string(),
                    f_min: 215.0,
                    f_max: 275.0,
                    t_rx: 50.0,
                    eta_tel: 0.9,
                    dual_polarization: true,
                    array_size: 1,
                },
                Receiver {
                    code: "Aweoweo".to_string(),
                    name: "\u{2018}\u{100}weoweo".to_string(),
                    f_min: 283.0,
                    f_max: 365.0,
                    t_rx: 65.0,
                    eta_tel: 0.88,
                    dual_polarization: true,
                    array_size: 1,
                },
            ],
        }
    }
}

impl HeterodyneParameters {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

/// A rectangular raster map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterMap {
    /// unit: arcsec
    pub width: f64,
    /// unit: arcsec
    pub height: f64,
    /// Pixel size along the scan
    /// unit: arcsec
    pub dx: f64,
    /// Pixel size across the scan
    /// unit: arcsec
    pub dy: f64,
    pub basket_weave: bool,
}

/// Map area, either as a number of separately observed points or a raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MapArea {
    Points(u32),
    Raster(RasterMap),
}

/// Everything the engine needs to know about an observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub receiver: String,
    pub mapping: MappingMode,
    pub switching: SwitchingMode,
    pub separate_offset: bool,
    pub continuum: bool,
    pub dual_polarization: bool,
    pub area: MapArea,
    /// Sky frequency
    /// unit: GHz
    pub frequency: f64,
    /// unit: MHz
    pub resolution: f64,
    /// 225 GHz zenith opacity
    pub tau_225: f64,
    /// unit: degrees
    pub zenith_angle: f64,
}

/// A consistent set of time and noise values for an observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    /// Integration time per point
    /// unit: s
    pub int_time: f64,
    /// Total elapsed time including overheads
    /// unit: s
    pub elapsed: f64,
    /// unit: K (TA*)
    pub rms: f64,
    /// unit: K
    pub t_sys: f64,
    /// Zenith opacity at the observing frequency
    pub tau: f64,
}

/// The interface of a heterodyne sensitivity engine.
pub trait HeterodyneEngine: Send + Sync {
    fn version(&self) -> String;

    fn receivers(&self) -> &[Receiver];

    fn receiver(&self, code: &str) -> Result<&Receiver, HeterodyneError> {
        self.receivers()
            .iter()
            .find(|rx| rx.code == code)
            .ok_or_else(|| HeterodyneError::UnknownReceiver(code.to_string()))
    }

    /// Supported combinations of mapping and switching mode.
    fn valid_modes(&self) -> Vec<(MappingMode, SwitchingMode)>;

    /// Convert a radial velocity (km/s) or redshift to redshift.
    fn velocity_to_redshift(&self, system: RvSystem, value: f64) -> Result<f64, HeterodyneError>;

    /// Velocity width (km/s) of a frequency resolution (MHz) at a frequency (GHz).
    fn frequency_to_velocity(&self, resolution: f64, frequency: f64)
        -> Result<f64, HeterodyneError>;

    /// Frequency width (MHz) of a velocity resolution (km/s) at a frequency (GHz).
    fn velocity_to_frequency(&self, resolution: f64, frequency: f64)
        -> Result<f64, HeterodyneError>;

    fn time_for_rms(&self, obs: &Observation, rms: f64) -> Result<Estimate, HeterodyneError>;

    /// `elapsed` is in seconds.
    fn rms_for_elapsed_time(
        &self,
        obs: &Observation,
        elapsed: f64,
    ) -> Result<Estimate, HeterodyneError>;

    /// `int_time` is the integration time per point in seconds.
    fn rms_for_int_time(
        &self,
        obs: &Observation,
        int_time: f64,
    ) -> Result<Estimate, HeterodyneError>;
}

#[derive(Debug, Clone, Default)]
pub struct HeterodyneItc {
    parameters: HeterodyneParameters,
}

/// Noise and time scaling for one observation.
struct Scaling {
    /// rms * sqrt(int_time)
    noise: f64,
    /// elapsed / int_time
    time: f64,
    t_sys: f64,
    tau: f64,
}

impl HeterodyneItc {
    pub fn from_parameters(parameters: HeterodyneParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &HeterodyneParameters {
        &self.parameters
    }

    /// Ratio of opacity at a frequency (GHz) to the 225 GHz opacity.
    ///
    /// Linear interpolation of the ratio table, clamped at its ends.
    pub fn opacity_ratio(&self, frequency: f64) -> f64 {
        let table = &self.parameters.opacity_ratios;
        match (table.first(), table.last()) {
            (None, _) | (_, None) => 1.0,
            (Some(&(f0, r0)), _) if frequency <= f0 => r0,
            (_, Some(&(f1, r1))) if frequency >= f1 => r1,
            _ => table
                .windows(2)
                .find(|w| frequency <= w[1].0)
                .map(|w| {
                    let ((f0, r0), (f1, r1)) = (w[0], w[1]);
                    r0 + (r1 - r0) * (frequency - f0) / (f1 - f0)
                })
                .unwrap_or(1.0),
        }
    }

    /// System temperature (K) and zenith opacity at the observing frequency.
    pub fn system_temperature(
        &self,
        receiver: &Receiver,
        obs: &Observation,
    ) -> Result<(f64, f64), HeterodyneError> {
        let p = &self.parameters;
        let tau = obs.tau_225 * self.opacity_ratio(obs.frequency);
        let airmass = 1.0 / obs.zenith_angle.to_radians().cos();
        let transmission = (-tau * airmass).exp();

        if transmission < p.min_transmission {
            return Err(HeterodyneError::TransmissionTooLow(transmission));
        }

        let eta = receiver.eta_tel;
        let t_sys = (receiver.t_rx + eta * p.t_atm * (1.0 - transmission) + (1.0 - eta) * p.t_amb)
            / (eta * transmission);
        Ok((t_sys, tau))
    }

    /// Ratio of elapsed time to integration time per point.
    fn time_factor(&self, receiver: &Receiver, obs: &Observation) -> Result<f64, HeterodyneError> {
        let p = &self.parameters;

        let off_fraction = |shared_by: f64| match obs.switching {
            SwitchingMode::Position if obs.separate_offset => 1.0,
            SwitchingMode::Position => 1.0 / shared_by.sqrt(),
            SwitchingMode::Beam => 1.0,
            SwitchingMode::Frequency => 0.0,
        };

        let mut factor = match (obs.mapping, obs.area) {
            (MappingMode::Raster, MapArea::Raster(raster)) => {
                if raster.width <= 0.0 || raster.height <= 0.0 {
                    return Err(HeterodyneError::NotPositive("map size"));
                }
                if raster.dx <= 0.0 || raster.dy <= 0.0 {
                    return Err(HeterodyneError::NotPositive("pixel size"));
                }
                let per_row = (raster.width / raster.dx).ceil();
                let rows = (raster.height / raster.dy).ceil();
                let scans = (rows / f64::from(receiver.array_size)).ceil();
                let mut factor = per_row * scans * (1.0 + off_fraction(per_row)) * p.raster_overhead;
                if raster.basket_weave {
                    factor *= p.basket_weave_overhead;
                }
                factor
            }
            (MappingMode::Grid | MappingMode::Jiggle, MapArea::Points(n)) => {
                if n == 0 {
                    return Err(HeterodyneError::NotPositive("number of points"));
                }
                let n = f64::from(n);
                let overhead = match obs.mapping {
                    MappingMode::Jiggle => p.jiggle_overhead,
                    _ => p.grid_overhead,
                };
                n * (1.0 + off_fraction(n)) * overhead
            }
            _ => {
                return Err(HeterodyneError::IncompatibleModes {
                    mapping: obs.mapping,
                    switching: obs.switching,
                })
            }
        };

        if obs.continuum {
            factor *= p.continuum_overhead;
        }
        Ok(factor)
    }

    fn scaling(&self, obs: &Observation) -> Result<Scaling, HeterodyneError> {
        let receiver = self.receiver(&obs.receiver)?;

        if !self.valid_modes().contains(&(obs.mapping, obs.switching)) {
            return Err(HeterodyneError::IncompatibleModes {
                mapping: obs.mapping,
                switching: obs.switching,
            });
        }
        if obs.mapping == MappingMode::Jiggle && !receiver.is_array() {
            return Err(HeterodyneError::JiggleRequiresArray);
        }
        if obs.dual_polarization && !receiver.dual_polarization {
            return Err(HeterodyneError::DualPolarizationUnavailable(
                receiver.name.clone(),
            ));
        }
        if obs.frequency <= 0.0 {
            return Err(HeterodyneError::NotPositive("frequency"));
        }
        if obs.resolution <= 0.0 {
            return Err(HeterodyneError::NotPositive("resolution"));
        }

        let (t_sys, tau) = self.system_temperature(receiver, obs)?;
        let n_pol = if obs.dual_polarization { 2.0 } else { 1.0 };
        let bandwidth = convert(obs.resolution, "MHz", "Hz")?;
        let noise = self.parameters.backend_factor * obs.switching.noise_factor() * t_sys
            / (n_pol * bandwidth).sqrt();

        Ok(Scaling {
            noise,
            time: self.time_factor(receiver, obs)?,
            t_sys,
            tau,
        })
    }
}

impl HeterodyneEngine for HeterodyneItc {
    fn version(&self) -> String {
        format!("built-in {}", env!("CARGO_PKG_VERSION"))
    }

    fn receivers(&self) -> &[Receiver] {
        &self.parameters.receivers
    }

    fn valid_modes(&self) -> Vec<(MappingMode, SwitchingMode)> {
        vec![
            (MappingMode::Grid, SwitchingMode::Position),
            (MappingMode::Grid, SwitchingMode::Beam),
            (MappingMode::Grid, SwitchingMode::Frequency),
            (MappingMode::Jiggle, SwitchingMode::Position),
            (MappingMode::Jiggle, SwitchingMode::Beam),
            (MappingMode::Raster, SwitchingMode::Position),
        ]
    }

    fn velocity_to_redshift(&self, system: RvSystem, value: f64) -> Result<f64, HeterodyneError> {
        match system {
            RvSystem::Redshift => Ok(value),
            RvSystem::Optical => Ok(value / SPEED_OF_LIGHT_KMS),
            RvSystem::Radio => {
                let beta = value / SPEED_OF_LIGHT_KMS;
                if beta >= 1.0 {
                    return Err(HeterodyneError::VelocityTooHigh);
                }
                Ok(beta / (1.0 - beta))
            }
        }
    }

    fn frequency_to_velocity(
        &self,
        resolution: f64,
        frequency: f64,
    ) -> Result<f64, HeterodyneError> {
        Ok(SPEED_OF_LIGHT_KMS * convert(resolution, "MHz", "GHz")? / frequency)
    }

    fn velocity_to_frequency(
        &self,
        resolution: f64,
        frequency: f64,
    ) -> Result<f64, HeterodyneError> {
        Ok(convert(resolution * frequency / SPEED_OF_LIGHT_KMS, "GHz", "MHz")?)
    }

    fn time_for_rms(&self, obs: &Observation, rms: f64) -> Result<Estimate, HeterodyneError> {
        if rms <= 0.0 {
            return Err(HeterodyneError::NotPositive("target RMS"));
        }
        let s = self.scaling(obs)?;
        let int_time = (s.noise / rms).powi(2);
        Ok(Estimate {
            int_time,
            elapsed: int_time * s.time,
            rms,
            t_sys: s.t_sys,
            tau: s.tau,
        })
    }

    fn rms_for_elapsed_time(
        &self,
        obs: &Observation,
        elapsed: f64,
    ) -> Result<Estimate, HeterodyneError> {
        if elapsed <= 0.0 {
            return Err(HeterodyneError::NotPositive("elapsed time"));
        }
        let s = self.scaling(obs)?;
        let int_time = elapsed / s.time;
        Ok(Estimate {
            int_time,
            elapsed,
            rms: s.noise / int_time.sqrt(),
            t_sys: s.t_sys,
            tau: s.tau,
        })
    }

    fn rms_for_int_time(
        &self,
        obs: &Observation,
        int_time: f64,
    ) -> Result<Estimate, HeterodyneError> {
        if int_time <= 0.0 {
            return Err(HeterodyneError::NotPositive("integration time"));
        }
        let s = self.scaling(obs)?;
        Ok(Estimate {
            int_time,
            elapsed: int_time * s.time,
            rms: s.noise / int_time.sqrt(),
            t_sys: s.t_sys,
            tau: s.tau,
        })
    }
}
