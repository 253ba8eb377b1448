//! Heterodyne spectral line calculator.
//!
//! Relates the target noise of a spectral line observation to the time
//! required, for the JCMT heterodyne receivers.
//!
//! | Mode | Requirement | Output |
//! |------|-------------|--------|
//! | `time` | target RMS (K) | elapsed time (hours) |
//! | `rms_el` | elapsed time (hours) | RMS (K) |
//! | `rms_int` | integration time per point (s) | RMS (K) |
//!
//! The rest frequency is given either directly or by selecting a species and
//! transition from the [line catalog](lines). It is shifted to the sky
//! frequency by a radial velocity or redshift, which must fall within the
//! receiver's tuning range.
//!
//! # Schema versions
//!
//! | Version | Change |
//! |---------|--------|
//! | 1 | Initial version |
//! | 2 | Added radial velocity (`rv`, `rv_sys`) |

pub mod itc;
pub mod lines;

use propcalc_core::errors::{CalcError, CalcResult};
use propcalc_core::parse::{
    choice, extract_form_values, parse_bool, parse_duration, parse_fields, parse_float, parse_int,
    parse_optional_float, parse_optional_text, parse_text, validate_input_keys,
};
use propcalc_core::result::{Calculation, CalculatorResult, Extra, WEATHER_COMPARISON};
use propcalc_core::sectioned_list::SectionedList;
use propcalc_core::units::convert;
use propcalc_core::value::{CalculatorMode, CalculatorValue, FieldFormat, Mode, Value, Values};
use propcalc_core::{values, Calculator};

use crate::jcmt::position::PositionType;
use crate::jcmt::weather::weather_comparison;
use crate::jcmt::{
    condense_drop_null, condense_merge_values, condense_tau_band, position_type_label,
};

pub use itc::{
    Estimate, HeterodyneEngine, HeterodyneError, HeterodyneItc, HeterodyneParameters, MapArea,
    MappingMode, Observation, RasterMap, Receiver, ResolutionUnit, RvSystem, SwitchingMode,
};

pub const TIME: Mode = 1;
pub const RMS_ELAPSED: Mode = 2;
pub const RMS_INT_TIME: Mode = 3;

pub const VERSION: u32 = 2;

static MODES: [(Mode, CalculatorMode); 3] = [
    (TIME, CalculatorMode::new("time", "Time required")),
    (
        RMS_ELAPSED,
        CalculatorMode::new("rms_el", "Sensitivity from elapsed time"),
    ),
    (
        RMS_INT_TIME,
        CalculatorMode::new("rms_int", "Sensitivity from integration time"),
    ),
];

const RX: CalculatorValue = CalculatorValue::new("rx", "Receiver", "Receiver", FieldFormat::Text, None);
const MM: CalculatorValue =
    CalculatorValue::new("mm", "Mapping mode", "Mapping", FieldFormat::Text, None);
const SW: CalculatorValue =
    CalculatorValue::new("sw", "Switching mode", "Switching", FieldFormat::Text, None);
const SEP_OFF: CalculatorValue =
    CalculatorValue::new("sep_off", "Separate offset", "Sep. off.", FieldFormat::YesNo, None);
const CONT: CalculatorValue =
    CalculatorValue::new("cont", "Continuum mode", "Cont.", FieldFormat::YesNo, None);
const DUAL_POL: CalculatorValue =
    CalculatorValue::new("dual_pol", "Dual polarization", "Dual pol.", FieldFormat::YesNo, None);
const N_PT: CalculatorValue =
    CalculatorValue::new("n_pt", "Number of points", "Points", FieldFormat::Integer, None);
const DIM_X: CalculatorValue =
    CalculatorValue::new("dim_x", "Map width", "Width", FieldFormat::Fixed(0), Some("arcsec"));
const DIM_Y: CalculatorValue =
    CalculatorValue::new("dim_y", "Map height", "Height", FieldFormat::Fixed(0), Some("arcsec"));
const DX: CalculatorValue =
    CalculatorValue::new("dx", "Pixel width", "Pixel x", FieldFormat::Fixed(1), Some("arcsec"));
const DY: CalculatorValue =
    CalculatorValue::new("dy", "Pixel height", "Pixel y", FieldFormat::Fixed(1), Some("arcsec"));
const BASKET: CalculatorValue =
    CalculatorValue::new("basket", "Basket weave", "Basket", FieldFormat::YesNo, None);
const SPECIES: CalculatorValue =
    CalculatorValue::new("species", "Species", "Species", FieldFormat::Text, None);
const TRANS: CalculatorValue =
    CalculatorValue::new("trans", "Transition", "Trans.", FieldFormat::Text, None);
const FREQ: CalculatorValue =
    CalculatorValue::new("freq", "Rest frequency", "Freq.", FieldFormat::Fixed(3), Some("GHz"));
const RV: CalculatorValue =
    CalculatorValue::new("rv", "Radial velocity", "RV", FieldFormat::Fixed(3), None);
const RV_SYS: CalculatorValue =
    CalculatorValue::new("rv_sys", "Velocity system", "RV sys.", FieldFormat::Text, None);
const RES: CalculatorValue =
    CalculatorValue::new("res", "Resolution", "Res.", FieldFormat::Fixed(3), None);
const RES_UNIT: CalculatorValue =
    CalculatorValue::new("res_unit", "Resolution unit", "Res. unit", FieldFormat::Text, None);
const POS: CalculatorValue =
    CalculatorValue::new("pos", "Source position", "Pos.", FieldFormat::Fixed(1), None);
const POS_TYPE: CalculatorValue =
    CalculatorValue::new("pos_type", "Position type", "Pos. type", FieldFormat::Text, None);
const TAU: CalculatorValue =
    CalculatorValue::new("tau", "225 GHz opacity", "tau225", FieldFormat::Fixed(3), None);
const RMS: CalculatorValue =
    CalculatorValue::new("rms", "Target sensitivity", "RMS", FieldFormat::Fixed(3), Some("K TA*"));
const ELAPSED: CalculatorValue =
    CalculatorValue::new("elapsed", "Elapsed time", "Elapsed", FieldFormat::Fixed(3), Some("hours"));
const INT_TIME: CalculatorValue = CalculatorValue::new(
    "int_time",
    "Integration time per point",
    "Int. time",
    FieldFormat::Fixed(1),
    Some("seconds"),
);

const OUT_TIME: CalculatorValue =
    CalculatorValue::new("t", "Time required", "Time", FieldFormat::Fixed(3), Some("hours"));
const OUT_RMS: CalculatorValue =
    CalculatorValue::new("rms", "Sensitivity", "RMS", FieldFormat::Fixed(3), Some("K TA*"));

const RASTER_CODES: [&str; 5] = ["dim_x", "dim_y", "dx", "dy", "basket"];

/// Calculator for heterodyne spectral line observations.
///
/// The valid combinations of mapping and switching mode are read from the
/// engine once, on construction.
#[derive(Debug, Clone)]
pub struct HeterodyneCalculator<E = HeterodyneItc> {
    engine: E,
    valid_modes: Vec<(MappingMode, SwitchingMode)>,
}

impl HeterodyneCalculator {
    pub fn new() -> Self {
        Self::with_engine(HeterodyneItc::default())
    }

    pub fn from_parameters(parameters: HeterodyneParameters) -> Self {
        Self::with_engine(HeterodyneItc::from_parameters(parameters))
    }
}

impl Default for HeterodyneCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: HeterodyneEngine> HeterodyneCalculator<E> {
    pub fn with_engine(engine: E) -> Self {
        let valid_modes = engine.valid_modes();
        Self {
            engine,
            valid_modes,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn valid_modes(&self) -> &[(MappingMode, SwitchingMode)] {
        &self.valid_modes
    }

    fn requirement(mode: Mode) -> CalcResult<CalculatorValue> {
        match mode {
            TIME => Ok(RMS),
            RMS_ELAPSED => Ok(ELAPSED),
            RMS_INT_TIME => Ok(INT_TIME),
            _ => Err(CalcError::UnknownMode(mode)),
        }
    }

    fn check_modes(&self, mapping: MappingMode, switching: SwitchingMode) -> CalcResult<()> {
        if self.valid_modes.contains(&(mapping, switching)) {
            Ok(())
        } else {
            Err(CalcError::user(format!(
                "{} mapping can not be used with {}.",
                mapping.name(),
                switching.name().to_lowercase()
            )))
        }
    }

    /// Derive the engine's description of an observation from the input,
    /// recording intermediate values worth displaying in `extra`.
    fn observation(&self, input: &Values, extra: &mut Extra) -> CalcResult<Observation> {
        let receiver = self.engine.receiver(input.str("rx")?)?;
        let mapping: MappingMode = choice(input.str("mm")?, "mapping mode")?;
        let switching: SwitchingMode = choice(input.str("sw")?, "switching mode")?;
        self.check_modes(mapping, switching)?;

        let freq_rest = match input.opt_float("freq")? {
            Some(freq) => freq,
            None => match (input.opt_str("species")?, input.opt_str("trans")?) {
                (Some(species), Some(transition)) => {
                    let freq = lines::rest_frequency(species, transition)
                        .map_err(|err| CalcError::user(err.to_string()))?;
                    extra.insert("freq_rest".to_string(), freq.into());
                    freq
                }
                _ => {
                    return Err(CalcError::user(
                        "Please specify either a rest frequency or a species and transition.",
                    ))
                }
            },
        };

        let rv_sys: RvSystem = choice(input.str("rv_sys")?, "velocity system")?;
        let redshift = self.engine.velocity_to_redshift(rv_sys, input.float("rv")?)?;
        if redshift <= -1.0 {
            return Err(CalcError::user("The redshift must be greater than -1."));
        }
        let freq_sky = freq_rest / (1.0 + redshift);
        if redshift != 0.0 {
            if rv_sys != RvSystem::Redshift {
                extra.insert("redshift".to_string(), redshift.into());
            }
            extra.insert("freq_sky".to_string(), freq_sky.into());
        }

        if freq_sky < receiver.f_min {
            return Err(CalcError::user(format!(
                "The sky frequency ({:.3} GHz) is below the minimum frequency of {} ({} GHz).",
                freq_sky, receiver.name, receiver.f_min
            )));
        }
        if freq_sky > receiver.f_max {
            return Err(CalcError::user(format!(
                "The sky frequency ({:.3} GHz) is above the maximum frequency of {} ({} GHz).",
                freq_sky, receiver.name, receiver.f_max
            )));
        }

        let res = input.float("res")?;
        let resolution = match choice(input.str("res_unit")?, "resolution unit")? {
            ResolutionUnit::Frequency => {
                let velocity = self.engine.frequency_to_velocity(res, freq_sky)?;
                extra.insert("res_velocity".to_string(), velocity.into());
                res
            }
            ResolutionUnit::Velocity => {
                let frequency = self.engine.velocity_to_frequency(res, freq_sky)?;
                extra.insert("res_freq".to_string(), frequency.into());
                frequency
            }
        };

        let position_type = PositionType::from_code(input.str("pos_type")?)?;
        let zenith_angle = position_type.zenith_angle(input.float("pos")?)?;
        if position_type != PositionType::ZenithAngle {
            extra.insert("zenith_angle".to_string(), zenith_angle.into());
        }

        let tau_225 = input.float("tau")?;
        if tau_225 < 0.0 {
            return Err(CalcError::user("The opacity must not be negative."));
        }

        let area = match mapping {
            MappingMode::Raster => MapArea::Raster(RasterMap {
                width: input.float("dim_x")?,
                height: input.float("dim_y")?,
                dx: input.float("dx")?,
                dy: input.float("dy")?,
                basket_weave: input.bool("basket")?,
            }),
            _ => MapArea::Points(
                u32::try_from(input.int("n_pt")?)
                    .map_err(|_| CalcError::user("The number of points must be positive."))?,
            ),
        };

        Ok(Observation {
            receiver: receiver.code.clone(),
            mapping,
            switching,
            separate_offset: input.bool("sep_off")?,
            continuum: input.bool("cont")?,
            dual_polarization: input.bool("dual_pol")?,
            area,
            frequency: freq_sky,
            resolution,
            tau_225,
            zenith_angle,
        })
    }

    fn estimate(&self, mode: Mode, obs: &Observation, input: &Values) -> CalcResult<Estimate> {
        let estimate = match mode {
            TIME => self.engine.time_for_rms(obs, input.float("rms")?)?,
            RMS_ELAPSED => self
                .engine
                .rms_for_elapsed_time(obs, convert(input.float("elapsed")?, "h", "s")?)?,
            RMS_INT_TIME => self.engine.rms_for_int_time(obs, input.float("int_time")?)?,
            _ => return Err(CalcError::UnknownMode(mode)),
        };
        Ok(estimate)
    }

    /// The primary output of a mode.
    fn primary(mode: Mode, estimate: &Estimate) -> CalcResult<f64> {
        match mode {
            TIME => Ok(convert(estimate.elapsed, "s", "h")?),
            _ => Ok(estimate.rms),
        }
    }
}

fn rv_system_label(_code: &str, value: &Value) -> String {
    match value.as_str().map(|s| s.parse::<RvSystem>()) {
        Some(Ok(RvSystem::Redshift)) => "(redshift)".to_string(),
        Some(Ok(system)) => format!("km/s ({})", system.name()),
        _ => value.to_string(),
    }
}

impl<E: HeterodyneEngine> Calculator for HeterodyneCalculator<E> {
    fn code(&self) -> &'static str {
        "heterodyne"
    }

    fn name(&self) -> &'static str {
        "Heterodyne"
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
        let requirement = Self::requirement(mode)?;
        let version = self.resolve_version(version)?;

        let mut inputs = SectionedList::new();
        inputs.extend(
            [RX, MM, SW, SEP_OFF, CONT, DUAL_POL, N_PT, DIM_X, DIM_Y, DX, DY, BASKET],
            Some("obs"),
            Some("Observation"),
        );
        inputs.extend(
            [SPECIES, TRANS, FREQ, RV, RV_SYS, RES, RES_UNIT]
                .into_iter()
                .filter(|field| version >= 2 || !matches!(field.code, "rv" | "rv_sys")),
            Some("line"),
            Some("Line"),
        );
        inputs.extend([POS, POS_TYPE, TAU], Some("src"), Some("Source and Conditions"));
        inputs.append(requirement, Some("req"), Some("Requirement"));
        Ok(inputs)
    }

    fn outputs(&self, mode: Mode, version: Option<u32>) -> CalcResult<Vec<CalculatorValue>> {
        self.resolve_version(version)?;
        match mode {
            TIME => Ok(vec![OUT_TIME]),
            RMS_ELAPSED | RMS_INT_TIME => Ok(vec![OUT_RMS]),
            _ => Err(CalcError::UnknownMode(mode)),
        }
    }

    fn default_input(&self, mode: Mode) -> CalcResult<Values> {
        let requirement = match mode {
            TIME => 0.1,
            RMS_ELAPSED => 1.0,
            RMS_INT_TIME => 60.0,
            _ => return Err(CalcError::UnknownMode(mode)),
        };

        let mut defaults = values! {
            "rx" => "HARP",
            "mm" => MappingMode::Grid.to_string(),
            "sw" => SwitchingMode::Position.to_string(),
            "sep_off" => false,
            "cont" => false,
            "dual_pol" => false,
            "n_pt" => 1_i64,
            "dim_x" => 180.0,
            "dim_y" => 180.0,
            "dx" => 6.0,
            "dy" => 6.0,
            "basket" => false,
            "species" => "CO",
            "trans" => "3 - 2",
            "freq" => Value::Null,
            "rv" => 0.0,
            "rv_sys" => RvSystem::Redshift.to_string(),
            "res" => 0.488,
            "res_unit" => ResolutionUnit::Frequency.to_string(),
            "pos" => 40.0,
            "pos_type" => PositionType::Declination.to_string(),
            "tau" => 0.1,
        };
        defaults.insert(Self::requirement(mode)?.code, requirement);
        Ok(defaults)
    }

    fn parse_input(
        &self,
        mode: Mode,
        raw: &Values,
        defaults: Option<&Values>,
    ) -> CalcResult<Values> {
        let inputs = self.inputs(mode, None)?;

        let is_raster = raw
            .get("mm")
            .filter(|value| !value.is_blank())
            .or_else(|| defaults.and_then(|d| d.get("mm")))
            .and_then(Value::as_str)
            .and_then(|mm| mm.trim().parse::<MappingMode>().ok())
            == Some(MappingMode::Raster);

        let mut parsed = parse_fields(&inputs, raw, defaults, |field, value| {
            match field.code {
                code if RASTER_CODES.contains(&code) && !is_raster => Ok(Value::Null),
                "n_pt" if is_raster => Ok(Value::Null),
                "n_pt" => parse_int(value),
                "sep_off" | "cont" | "dual_pol" | "basket" => parse_bool(value),
                "freq" => parse_optional_float(value),
                "species" | "trans" => parse_optional_text(value),
                "elapsed" => parse_duration(value),
                "dim_x" | "dim_y" | "dx" | "dy" | "rv" | "res" | "pos" | "tau" | "rms"
                | "int_time" => parse_float(value),
                _ => parse_text(value),
            }
        })?;

        self.engine.receiver(parsed.str("rx")?)?;
        let mapping: MappingMode = choice(parsed.str("mm")?, "mapping mode")?;
        let switching: SwitchingMode = choice(parsed.str("sw")?, "switching mode")?;
        self.check_modes(mapping, switching)?;
        choice::<RvSystem>(parsed.str("rv_sys")?, "velocity system")?;
        choice::<ResolutionUnit>(parsed.str("res_unit")?, "resolution unit")?;

        if parsed.opt_float("freq")?.is_some() {
            parsed.insert("species", Value::Null);
            parsed.insert("trans", Value::Null);
        } else {
            match (parsed.opt_str("species")?, parsed.opt_str("trans")?) {
                (Some(species), Some(transition)) => {
                    lines::rest_frequency(species, transition)
                        .map_err(|err| CalcError::user(err.to_string()))?;
                }
                _ => {
                    return Err(CalcError::user(
                        "Please specify either a rest frequency or a species and transition.",
                    ))
                }
            }
        }

        PositionType::from_code(parsed.str("pos_type")?)?.validate(parsed.float("pos")?)?;

        if parsed.float("tau")? < 0.0 {
            return Err(CalcError::user("The opacity must not be negative."));
        }
        if let Some(n) = parsed.opt_int("n_pt")? {
            if n < 1 {
                return Err(CalcError::user("The number of points must be positive."));
            }
        }

        Ok(parsed)
    }

    fn form_input(&self, inputs: &SectionedList<CalculatorValue>, form: &Values) -> Values {
        let mut values = extract_form_values(inputs, form);

        // The dual polarization checkbox is hidden for single polarization receivers.
        let dual_available = values
            .get("rx")
            .and_then(Value::as_str)
            .and_then(|code| self.engine.receiver(code.trim()).ok())
            .map(|receiver| receiver.dual_polarization);
        if dual_available == Some(false) {
            values.insert("dual_pol", false);
        }
        values
    }

    fn convert_input_mode(&self, mode: Mode, new_mode: Mode, input: &Values) -> CalcResult<Values> {
        let requirement = Self::requirement(mode)?;
        let new_requirement = Self::requirement(new_mode)?;
        if mode == new_mode {
            return Ok(input.clone());
        }
        log::debug!("Converting heterodyne input from mode {mode} to {new_mode}");

        // Every conversion goes through the time calculation, which gives
        // both the elapsed time and the integration time for a target RMS.
        let mut converted = input.clone();
        if mode != TIME {
            let result = self.calculate(mode, input)?;
            converted.remove(requirement.code);
            converted.insert(RMS.code, result.output.float(OUT_RMS.code)?);
        }
        let time_result = self.calculate(TIME, &converted)?;

        let value = match new_mode {
            TIME => return Ok(converted),
            RMS_ELAPSED => time_result.output.float(OUT_TIME.code)?,
            _ => time_result.extra_float("int_time").ok_or_else(|| {
                CalcError::internal("Time calculation did not give the integration time")
            })?,
        };
        converted.remove(RMS.code);
        converted.insert(new_requirement.code, value);
        Ok(converted)
    }

    fn convert_input_version(
        &self,
        mode: Mode,
        old_version: u32,
        input: &Values,
    ) -> CalcResult<Values> {
        Self::requirement(mode)?;
        match old_version {
            1 => {
                log::debug!("Upgrading heterodyne input from version 1");
                let mut converted = input.clone();
                converted.insert("rv", 0.0);
                converted.insert("rv_sys", RvSystem::Redshift.to_string());
                Ok(converted)
            }
            VERSION => Ok(input.clone()),
            _ => Err(CalcError::UnknownVersion(old_version)),
        }
    }

    fn calculate(&self, mode: Mode, input: &Values) -> CalcResult<CalculatorResult> {
        log::debug!("Heterodyne calculation in mode {mode}");
        validate_input_keys(&self.inputs(mode, None)?, input)?;

        let mut extra = Extra::new();
        let obs = self.observation(input, &mut extra)?;
        let estimate = self.estimate(mode, &obs, input)?;

        let output = match mode {
            TIME => values! { OUT_TIME.code => Self::primary(mode, &estimate)? },
            _ => values! { OUT_RMS.code => Self::primary(mode, &estimate)? },
        };

        match mode {
            RMS_INT_TIME => {
                extra.insert(
                    "elapsed".to_string(),
                    convert(estimate.elapsed, "s", "h")?.into(),
                );
            }
            _ => {
                extra.insert("int_time".to_string(), estimate.int_time.into());
            }
        }
        extra.insert("t_sys".to_string(), estimate.t_sys.into());
        extra.insert("tau".to_string(), estimate.tau.into());

        let comparison = weather_comparison(|tau| {
            let obs = Observation {
                tau_225: tau,
                ..obs.clone()
            };
            let estimate = self.estimate(mode, &obs, input)?;
            Self::primary(mode, &estimate)
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
        Self::requirement(mode)?;
        self.resolve_version(Some(version))?;

        condense_drop_null(calculation)?;
        condense_merge_values(calculation, &[("species", "trans")], |_, v| v.to_string())?;
        condense_merge_values(calculation, &[("res", "res_unit")], |_, v| v.to_string())?;
        condense_merge_values(calculation, &[("rv", "rv_sys")], rv_system_label)?;
        condense_merge_values(calculation, &[("pos", "pos_type")], position_type_label)?;
        condense_tau_band(calculation, "tau")
    }
}
