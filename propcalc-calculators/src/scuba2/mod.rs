//! SCUBA-2 continuum sensitivity calculator.
//!
//! | Mode | Requirement | Output |
//! |------|-------------|--------|
//! | `time` | target RMS in one filter (mJy/beam) | elapsed time (hours) |
//! | `rms` | elapsed time (hours) | RMS at 850 and 450 µm (mJy/beam) |
//!
//! SCUBA-2 observes both filters simultaneously, so the RMS mode reports
//! both. The 450 µm value is left empty when the atmosphere is too opaque
//! for an estimate.

pub mod itc;

use propcalc_core::errors::{CalcError, CalcResult};
use propcalc_core::parse::{
    choice, parse_duration, parse_fields, parse_float, parse_text, validate_input_keys,
};
use propcalc_core::result::{Calculation, CalculatorResult, Extra, WEATHER_COMPARISON};
use propcalc_core::sectioned_list::SectionedList;
use propcalc_core::units::convert;
use propcalc_core::value::{CalculatorMode, CalculatorValue, FieldFormat, Mode, Value, Values};
use propcalc_core::{values, Calculator};

use crate::jcmt::position::PositionType;
use crate::jcmt::weather::weather_comparison;
use crate::jcmt::{condense_drop_null, condense_merge_values, condense_tau_band, position_type_label};

pub use itc::{
    Filter, MapMode, Sampling, Scuba2Engine, Scuba2Error, Scuba2Itc, Scuba2Observation,
    Scuba2Parameters,
};

pub const TIME: Mode = 1;
pub const RMS: Mode = 2;

pub const VERSION: u32 = 1;

static MODES: [(Mode, CalculatorMode); 2] = [
    (TIME, CalculatorMode::new("time", "Time required")),
    (RMS, CalculatorMode::new("rms", "Sensitivity")),
];

const MAP: CalculatorValue = CalculatorValue::new("map", "Map type", "Map", FieldFormat::Text, None);
const SAMP: CalculatorValue =
    CalculatorValue::new("samp", "Sampling", "Sampling", FieldFormat::Text, None);
const PIX_850: CalculatorValue = CalculatorValue::new(
    "pix850",
    "Pixel size at 850 \u{b5}m",
    "Pix. 850",
    FieldFormat::Fixed(1),
    Some("arcsec"),
);
const PIX_450: CalculatorValue = CalculatorValue::new(
    "pix450",
    "Pixel size at 450 \u{b5}m",
    "Pix. 450",
    FieldFormat::Fixed(1),
    Some("arcsec"),
);
const POS: CalculatorValue =
    CalculatorValue::new("pos", "Source position", "Pos.", FieldFormat::Fixed(1), None);
const POS_TYPE: CalculatorValue =
    CalculatorValue::new("pos_type", "Position type", "Pos. type", FieldFormat::Text, None);
const TAU: CalculatorValue =
    CalculatorValue::new("tau", "225 GHz opacity", "tau225", FieldFormat::Fixed(3), None);
const WL: CalculatorValue =
    CalculatorValue::new("wl", "Wavelength", "Wavelength", FieldFormat::Text, Some("\u{b5}m"));
const IN_RMS: CalculatorValue = CalculatorValue::new(
    "rms",
    "Target sensitivity",
    "RMS",
    FieldFormat::Fixed(3),
    Some("mJy/beam"),
);
const IN_TIME: CalculatorValue =
    CalculatorValue::new("time", "Time", "Time", FieldFormat::Fixed(3), Some("hours"));

const OUT_TIME: CalculatorValue =
    CalculatorValue::new("time", "Time required", "Time", FieldFormat::Fixed(3), Some("hours"));
const OUT_RMS_850: CalculatorValue = CalculatorValue::new(
    "rms_850",
    "Sensitivity at 850 \u{b5}m",
    "RMS 850",
    FieldFormat::Fixed(3),
    Some("mJy/beam"),
);
const OUT_RMS_450: CalculatorValue = CalculatorValue::new(
    "rms_450",
    "Sensitivity at 450 \u{b5}m",
    "RMS 450",
    FieldFormat::Fixed(3),
    Some("mJy/beam"),
);

#[derive(Debug, Clone)]
pub struct Scuba2Calculator<E = Scuba2Itc> {
    engine: E,
}

impl Scuba2Calculator {
    pub fn new() -> Self {
        Self::with_engine(Scuba2Itc::default())
    }

    pub fn from_parameters(parameters: Scuba2Parameters) -> Self {
        Self::with_engine(Scuba2Itc::from_parameters(parameters))
    }
}

impl Default for Scuba2Calculator {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Scuba2Engine> Scuba2Calculator<E> {
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn check_mode(mode: Mode) -> CalcResult<()> {
        match mode {
            TIME | RMS => Ok(()),
            _ => Err(CalcError::UnknownMode(mode)),
        }
    }

    fn observation(&self, input: &Values, extra: &mut Extra) -> CalcResult<Scuba2Observation> {
        let map_mode = self.engine.map_mode(input.str("map")?)?.code.clone();
        let sampling: Sampling = choice(input.str("samp")?, "sampling")?;

        let mut pixel = |filter: Filter, code: &str| -> CalcResult<f64> {
            match self.engine.pixel_size(sampling, &map_mode, filter)? {
                Some(size) => {
                    extra.insert(format!("pix_{filter}"), size.into());
                    Ok(size)
                }
                None => Ok(input.float(code)?),
            }
        };
        let pixel_850 = pixel(Filter::F850, "pix850")?;
        let pixel_450 = pixel(Filter::F450, "pix450")?;

        let position_type = PositionType::from_code(input.str("pos_type")?)?;
        let airmass = position_type.airmass(input.float("pos")?)?;
        if position_type != PositionType::Airmass {
            extra.insert("airmass".to_string(), airmass.into());
        }

        let tau_225 = input.float("tau")?;
        if tau_225 < 0.0 {
            return Err(CalcError::user("The opacity must not be negative."));
        }

        Ok(Scuba2Observation {
            map_mode,
            tau_225,
            airmass,
            pixel_850,
            pixel_450,
        })
    }

    /// The primary output of a mode.
    fn primary(&self, mode: Mode, obs: &Scuba2Observation, input: &Values) -> CalcResult<f64> {
        match mode {
            TIME => {
                let filter: Filter = choice(input.str("wl")?, "wavelength")?;
                let time = self.engine.time_for_rms(obs, filter, input.float("rms")?)?;
                Ok(convert(time, "s", "h")?)
            }
            RMS => {
                let time = convert(input.float("time")?, "h", "s")?;
                Ok(self.engine.rms_for_time(obs, Filter::F850, time)?)
            }
            _ => Err(CalcError::UnknownMode(mode)),
        }
    }
}

fn wavelength_label(_code: &str, value: &Value) -> String {
    format!("mJy/beam at {value} \u{b5}m")
}

impl<E: Scuba2Engine> Calculator for Scuba2Calculator<E> {
    fn code(&self) -> &'static str {
        "scuba2"
    }

    fn name(&self) -> &'static str {
        "SCUBA-2"
    }

    fn calc_version(&self) -> String {
        self.engine.version()
    }

    fn modes(&self) -> &'static [(Mode, CalculatorMode)] {
        &MODES
    }

    fn version(&self) -> u32 {
        VERSION
    }

    fn inputs(&self, mode: Mode, version: Option<u32>) -> CalcResult<SectionedList<CalculatorValue>> {
        Self::check_mode(mode)?;
        self.resolve_version(version)?;

        let mut inputs = SectionedList::new();
        inputs.extend([MAP, SAMP, PIX_850, PIX_450], Some("obs"), Some("Observation"));
        inputs.extend([POS, POS_TYPE, TAU], Some("src"), Some("Source and Conditions"));
        match mode {
            TIME => inputs.extend([WL, IN_RMS], Some("req"), Some("Requirement")),
            _ => inputs.append(IN_TIME, Some("req"), Some("Requirement")),
        }
        Ok(inputs)
    }

    fn outputs(&self, mode: Mode, version: Option<u32>) -> CalcResult<Vec<CalculatorValue>> {
        Self::check_mode(mode)?;
        self.resolve_version(version)?;
        match mode {
            TIME => Ok(vec![OUT_TIME]),
            _ => Ok(vec![OUT_RMS_850, OUT_RMS_450]),
        }
    }

    fn default_input(&self, mode: Mode) -> CalcResult<Values> {
        Self::check_mode(mode)?;
        let mut defaults = values! {
            "map" => "daisy",
            "samp" => Sampling::MapDefault.to_string(),
            "pix850" => Value::Null,
            "pix450" => Value::Null,
            "pos" => 40.0,
            "pos_type" => PositionType::Declination.to_string(),
            "tau" => 0.065,
        };
        match mode {
            TIME => {
                defaults.insert("wl", Filter::F850.to_string());
                defaults.insert("rms", 1.5);
            }
            _ => {
                defaults.insert("time", 1.0);
            }
        }
        Ok(defaults)
    }

    fn parse_input(
        &self,
        mode: Mode,
        raw: &Values,
        defaults: Option<&Values>,
    ) -> CalcResult<Values> {
        let inputs = self.inputs(mode, None)?;

        let is_custom = raw
            .get("samp")
            .filter(|value| !value.is_blank())
            .or_else(|| defaults.and_then(|d| d.get("samp")))
            .and_then(Value::as_str)
            .and_then(|samp| samp.trim().parse::<Sampling>().ok())
            == Some(Sampling::Custom);

        let parsed = parse_fields(&inputs, raw, defaults, |field, value| match field.code {
            "pix850" | "pix450" if !is_custom => Ok(Value::Null),
            "time" => parse_duration(value),
            "pix850" | "pix450" | "pos" | "tau" | "rms" => parse_float(value),
            _ => parse_text(value),
        })?;

        self.engine.map_mode(parsed.str("map")?)?;
        choice::<Sampling>(parsed.str("samp")?, "sampling")?;
        if mode == TIME {
            choice::<Filter>(parsed.str("wl")?, "wavelength")?;
        }

        PositionType::from_code(parsed.str("pos_type")?)?.validate(parsed.float("pos")?)?;
        if parsed.float("tau")? < 0.0 {
            return Err(CalcError::user("The opacity must not be negative."));
        }
        for code in ["pix850", "pix450"] {
            if let Some(size) = parsed.opt_float(code)? {
                if size <= 0.0 {
                    return Err(CalcError::user("The pixel size must be positive."));
                }
            }
        }

        Ok(parsed)
    }

    fn convert_input_mode(&self, mode: Mode, new_mode: Mode, input: &Values) -> CalcResult<Values> {
        Self::check_mode(mode)?;
        Self::check_mode(new_mode)?;
        if mode == new_mode {
            return Ok(input.clone());
        }
        log::debug!("Converting SCUBA-2 input from mode {mode} to {new_mode}");

        let result = self.calculate(mode, input)?;
        let mut converted = input.clone();
        match (mode, new_mode) {
            (TIME, RMS) => {
                converted.remove("wl");
                converted.remove("rms");
                converted.insert("time", result.output.float("time")?);
            }
            (RMS, TIME) => {
                converted.remove("time");
                converted.insert("wl", Filter::F850.to_string());
                converted.insert("rms", result.output.float("rms_850")?);
            }
            _ => {
                return Err(CalcError::internal(format!(
                    "Conversion from mode {mode} to {new_mode} is not supported"
                )))
            }
        }
        Ok(converted)
    }

    fn convert_input_version(
        &self,
        mode: Mode,
        old_version: u32,
        input: &Values,
    ) -> CalcResult<Values> {
        Self::check_mode(mode)?;
        match old_version {
            VERSION => Ok(input.clone()),
            _ => Err(CalcError::UnknownVersion(old_version)),
        }
    }

    fn calculate(&self, mode: Mode, input: &Values) -> CalcResult<CalculatorResult> {
        log::debug!("SCUBA-2 calculation in mode {mode}");
        validate_input_keys(&self.inputs(mode, None)?, input)?;

        let mut extra = Extra::new();
        let obs = self.observation(input, &mut extra)?;
        let primary = self.primary(mode, &obs, input)?;

        let output = match mode {
            TIME => {
                // The other filter is observed simultaneously.
                let filter: Filter = choice(input.str("wl")?, "wavelength")?;
                let other = match filter {
                    Filter::F850 => Filter::F450,
                    Filter::F450 => Filter::F850,
                };
                match self
                    .engine
                    .rms_for_time(&obs, other, convert(primary, "h", "s")?)
                {
                    Ok(rms) => {
                        extra.insert(format!("rms_{other}"), rms.into());
                    }
                    Err(err) => log::debug!("No {} estimate: {}", other.name(), err),
                }
                values! { OUT_TIME.code => primary }
            }
            _ => {
                let time = convert(input.float("time")?, "h", "s")?;
                let rms_450 = match self.engine.rms_for_time(&obs, Filter::F450, time) {
                    Ok(rms) => Value::Float(rms),
                    Err(Scuba2Error::TransmissionTooLow { .. }) => Value::Null,
                    Err(err) => return Err(err.into()),
                };
                values! { OUT_RMS_850.code => primary, OUT_RMS_450.code => rms_450 }
            }
        };

        for filter in [Filter::F850, Filter::F450] {
            extra.insert(
                format!("tau_{filter}"),
                self.engine.opacity(filter, obs.tau_225).into(),
            );
            extra.insert(
                format!("trans_{filter}"),
                self.engine.transmission(&obs, filter).into(),
            );
        }

        let comparison = weather_comparison(|tau| {
            let obs = Scuba2Observation {
                tau_225: tau,
                ..obs.clone()
            };
            self.primary(mode, &obs, input)
        });
        extra.insert(WEATHER_COMPARISON.to_string(), comparison.into());

        Ok(CalculatorResult::new(output, extra))
    }

    fn condense_calculation(
        &self,
        mode: Mode,
        version: u32,
        calculation: &mut Calculation,
    ) -> CalcResult<()> {
        Self::check_mode(mode)?;
        self.resolve_version(Some(version))?;

        condense_drop_null(calculation)?;
        condense_merge_values(calculation, &[("pos", "pos_type")], position_type_label)?;
        condense_merge_values(calculation, &[("rms", "wl")], wavelength_label)?;
        condense_tau_band(calculation, "tau")
    }
}
