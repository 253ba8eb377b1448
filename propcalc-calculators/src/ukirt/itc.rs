//! Built-in imaging photometry calculator for UKIRT.
//!
//! Uses the CCD equation for the signal to noise ratio of a source
//! producing $S$ electrons per second, measured in an aperture of $n$ pixels
//! each receiving $B$ electrons per second of sky background and dark
//! current, with read noise $R$:
//!
//! $$\mathrm{SNR} = \frac{S t}{\sqrt{S t + n (B t + R^2)}}$$
//!
//! Given any two of integration time, magnitude and SNR the third follows by
//! solving this equation, quadratic in $t$ and in $S t$.
//!
//! The source rate is derived from the magnitude above the atmosphere:
//!
//! $$S = 10^{-0.4 (m + k A - m_0)}$$
//!
//! with zero point $m_0$ and extinction coefficient $k$ for the filter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use propcalc_core::errors::CalcError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImagingError {
    #[error("Unknown filter '{0}'.")]
    UnknownFilter(String),
    #[error("The {0} must be positive.")]
    NotPositive(&'static str),
}

impl From<ImagingError> for CalcError {
    fn from(err: ImagingError) -> Self {
        CalcError::User(err.to_string())
    }
}

/// A broad band imaging filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandFilter {
    pub code: String,
    /// Central wavelength
    /// unit: µm
    pub wavelength: f64,
    /// Magnitude giving one electron per second
    /// unit: mag
    pub zero_point: f64,
    /// Sky surface brightness
    /// unit: mag / arcsec^2
    pub sky: f64,
    /// Extinction coefficient
    /// unit: mag / airmass
    pub extinction: f64,
}

fn band(code: &str, wavelength: f64, zero_point: f64, sky: f64, extinction: f64) -> BandFilter {
    BandFilter {
        code: code.to_string(),
        wavelength,
        zero_point,
        sky,
        extinction,
    }
}

/// Parameters for the built-in imaging calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagingParameters {
    /// Detector read noise
    /// unit: electrons
    /// default: 20.0
    pub read_noise: f64,

    /// Detector dark current
    /// unit: electrons / s / pixel
    /// default: 0.2
    pub dark_current: f64,

    /// unit: arcsec
    /// default: 0.4
    pub pixel_scale: f64,

    pub filters: Vec<BandFilter>,
}

impl Default for ImagingParameters {
    fn default() -> Self {
        Self {
            read_noise: 20.0,
            dark_current: 0.2,
            pixel_scale: 0.4,
            filters: vec![
                band("Z", 0.88, 22.85, 18.6, 0.05),
                band("Y", 1.03, 22.70, 17.3, 0.05),
                band("J", 1.25, 23.00, 15.6, 0.10),
                band("H", 1.63, 23.30, 13.6, 0.05),
                band("K", 2.20, 22.60, 13.4, 0.07),
            ],
        }
    }
}

impl ImagingParameters {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

/// Observing conditions common to every imaging calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagingObservation {
    pub filter: String,
    /// Seeing FWHM, also used as the aperture radius
    /// unit: arcsec
    pub seeing: f64,
    pub airmass: f64,
}

/// The interface of an imaging sensitivity engine.
pub trait ImagingEngine: Send + Sync {
    fn version(&self) -> String;

    fn filters(&self) -> &[BandFilter];

    fn filter(&self, code: &str) -> Result<&BandFilter, ImagingError> {
        self.filters()
            .iter()
            .find(|f| f.code == code)
            .ok_or_else(|| ImagingError::UnknownFilter(code.to_string()))
    }

    /// Number of pixels in the photometric aperture.
    fn aperture_pixels(&self, obs: &ImagingObservation) -> Result<f64, ImagingError>;

    /// Background per pixel from sky and dark current (electrons / s).
    fn background(&self, obs: &ImagingObservation) -> Result<f64, ImagingError>;

    /// SNR reached for a magnitude in an integration time (s).
    fn snr(&self, obs: &ImagingObservation, mag: f64, time: f64) -> Result<f64, ImagingError>;

    /// Integration time (s) to reach an SNR for a magnitude.
    fn time(&self, obs: &ImagingObservation, mag: f64, snr: f64) -> Result<f64, ImagingError>;

    /// Faintest magnitude reaching an SNR in an integration time (s).
    fn mag(&self, obs: &ImagingObservation, snr: f64, time: f64) -> Result<f64, ImagingError>;
}

#[derive(Debug, Clone, Default)]
pub struct ImagingItc {
    parameters: ImagingParameters,
}

impl ImagingItc {
    pub fn from_parameters(parameters: ImagingParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &ImagingParameters {
        &self.parameters
    }

    fn check(obs: &ImagingObservation) -> Result<(), ImagingError> {
        if obs.seeing <= 0.0 {
            return Err(ImagingError::NotPositive("seeing"));
        }
        if obs.airmass <= 0.0 {
            return Err(ImagingError::NotPositive("airmass"));
        }
        Ok(())
    }

    /// Source rate (electrons / s) for a magnitude.
    pub fn source_rate(&self, obs: &ImagingObservation, mag: f64) -> Result<f64, ImagingError> {
        let filter = self.filter(&obs.filter)?;
        Ok(10.0_f64.powf(-0.4 * (mag + filter.extinction * obs.airmass - filter.zero_point)))
    }

    /// Aperture pixels, background rate and read noise variance term.
    fn noise_terms(&self, obs: &ImagingObservation) -> Result<(f64, f64, f64), ImagingError> {
        let n = self.aperture_pixels(obs)?;
        let b = self.background(obs)?;
        Ok((n, b, self.parameters.read_noise.powi(2)))
    }
}

impl ImagingEngine for ImagingItc {
    fn version(&self) -> String {
        format!("built-in {}", env!("CARGO_PKG_VERSION"))
    }

    fn filters(&self) -> &[BandFilter] {
        &self.parameters.filters
    }

    fn aperture_pixels(&self, obs: &ImagingObservation) -> Result<f64, ImagingError> {
        Self::check(obs)?;
        Ok(std::f64::consts::PI * (obs.seeing / self.parameters.pixel_scale).powi(2))
    }

    fn background(&self, obs: &ImagingObservation) -> Result<f64, ImagingError> {
        let filter = self.filter(&obs.filter)?;
        let sky = 10.0_f64.powf(-0.4 * (filter.sky - filter.zero_point))
            * self.parameters.pixel_scale.powi(2);
        Ok(sky + self.parameters.dark_current)
    }

    fn snr(&self, obs: &ImagingObservation, mag: f64, time: f64) -> Result<f64, ImagingError> {
        if time <= 0.0 {
            return Err(ImagingError::NotPositive("integration time"));
        }
        let s = self.source_rate(obs, mag)?;
        let (n, b, r2) = self.noise_terms(obs)?;
        Ok(s * time / (s * time + n * (b * time + r2)).sqrt())
    }

    fn time(&self, obs: &ImagingObservation, mag: f64, snr: f64) -> Result<f64, ImagingError> {
        if snr <= 0.0 {
            return Err(ImagingError::NotPositive("signal-to-noise ratio"));
        }
        let s = self.source_rate(obs, mag)?;
        let (n, b, r2) = self.noise_terms(obs)?;

        // s^2 t^2 - snr^2 (s + n b) t - snr^2 n r^2 = 0
        let snr2 = snr.powi(2);
        let linear = snr2 * (s + n * b);
        let discriminant = linear.powi(2) + 4.0 * s.powi(2) * snr2 * n * r2;
        Ok((linear + discriminant.sqrt()) / (2.0 * s.powi(2)))
    }

    fn mag(&self, obs: &ImagingObservation, snr: f64, time: f64) -> Result<f64, ImagingError> {
        if snr <= 0.0 {
            return Err(ImagingError::NotPositive("signal-to-noise ratio"));
        }
        if time <= 0.0 {
            return Err(ImagingError::NotPositive("integration time"));
        }
        let filter = self.filter(&obs.filter)?;
        let (n, b, r2) = self.noise_terms(obs)?;

        // (s t)^2 - snr^2 (s t) - snr^2 n (b t + r^2) = 0
        let snr2 = snr.powi(2);
        let counts = (snr2 + (snr2.powi(2) + 4.0 * snr2 * n * (b * time + r2)).sqrt()) / 2.0;
        let s = counts / time;
        Ok(filter.zero_point - 2.5 * s.log10() - filter.extinction * obs.airmass)
    }
}
