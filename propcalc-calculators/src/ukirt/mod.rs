//! UKIRT imaging photometry calculator.
//!
//! Each mode solves for one of integration time, magnitude and
//! signal-to-noise ratio given the other two.

pub mod itc;

use propcalc_core::errors::{CalcError, CalcResult};
use propcalc_core::parse::{
    parse_fields, parse_float, parse_text, validate_airmass, validate_input_keys,
};
use propcalc_core::result::{CalculatorResult, Extra};
use propcalc_core::sectioned_list::SectionedList;
use propcalc_core::value::{CalculatorMode, CalculatorValue, FieldFormat, Mode, Values};
use propcalc_core::{values, Calculator};

pub use itc::{
    BandFilter, ImagingEngine, ImagingError, ImagingItc, ImagingObservation, ImagingParameters,
};

pub const TIME: Mode = 1;
pub const MAG: Mode = 2;
pub const SNR: Mode = 3;

pub const VERSION: u32 = 1;

static MODES: [(Mode, CalculatorMode); 3] = [
    (TIME, CalculatorMode::new("time", "Integration time")),
    (MAG, CalculatorMode::new("mag", "Limiting magnitude")),
    (SNR, CalculatorMode::new("snr", "Signal-to-noise ratio")),
];

const FILTER: CalculatorValue =
    CalculatorValue::new("filter", "Filter", "Filter", FieldFormat::Text, None);
const SEEING: CalculatorValue =
    CalculatorValue::new("seeing", "Seeing", "Seeing", FieldFormat::Fixed(2), Some("arcsec"));
const AIRMASS: CalculatorValue =
    CalculatorValue::new("airmass", "Airmass", "Airmass", FieldFormat::Fixed(2), None);

const TIME_FIELD: CalculatorValue = CalculatorValue::new(
    "time",
    "Integration time",
    "Time",
    FieldFormat::Fixed(1),
    Some("seconds"),
);
const MAG_FIELD: CalculatorValue =
    CalculatorValue::new("mag", "Magnitude", "Mag.", FieldFormat::Fixed(2), Some("mag"));
const SNR_FIELD: CalculatorValue =
    CalculatorValue::new("snr", "Signal-to-noise ratio", "SNR", FieldFormat::Fixed(1), None);

/// The quantity solved for in each mode, in display order.
const QUANTITIES: [(Mode, CalculatorValue); 3] =
    [(TIME, TIME_FIELD), (MAG, MAG_FIELD), (SNR, SNR_FIELD)];

#[derive(Debug, Clone)]
pub struct ImagingCalculator<E = ImagingItc> {
    engine: E,
}

impl ImagingCalculator {
    pub fn new() -> Self {
        Self::with_engine(ImagingItc::default())
    }

    pub fn from_parameters(parameters: ImagingParameters) -> Self {
        Self::with_engine(ImagingItc::from_parameters(parameters))
    }
}

impl Default for ImagingCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ImagingEngine> ImagingCalculator<E> {
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn check_mode(mode: Mode) -> CalcResult<()> {
        match QUANTITIES.iter().any(|(m, _)| *m == mode) {
            true => Ok(()),
            false => Err(CalcError::UnknownMode(mode)),
        }
    }

    /// The single output field of a mode.
    fn single_output(&self, mode: Mode) -> CalcResult<CalculatorValue> {
        match self.outputs(mode, None)?.as_slice() {
            [output] => Ok(*output),
            outputs => Err(CalcError::internal(format!(
                "Imaging mode {mode} has {} outputs",
                outputs.len()
            ))),
        }
    }
}

impl<E: ImagingEngine> Calculator for ImagingCalculator<E> {
    fn code(&self) -> &'static str {
        "imaging"
    }

    fn name(&self) -> &'static str {
        "Imaging"
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
        inputs.append(FILTER, Some("obs"), Some("Observation"));
        inputs.extend([SEEING, AIRMASS], Some("cond"), Some("Conditions"));
        inputs.extend(
            QUANTITIES
                .iter()
                .filter(|(m, _)| *m != mode)
                .map(|(_, field)| *field),
            Some("req"),
            Some("Requirement"),
        );
        Ok(inputs)
    }

    fn outputs(&self, mode: Mode, version: Option<u32>) -> CalcResult<Vec<CalculatorValue>> {
        self.resolve_version(version)?;
        QUANTITIES
            .iter()
            .find(|(m, _)| *m == mode)
            .map(|(_, field)| vec![*field])
            .ok_or(CalcError::UnknownMode(mode))
    }

    fn default_input(&self, mode: Mode) -> CalcResult<Values> {
        Self::check_mode(mode)?;
        let mut defaults = values! {
            "filter" => "K",
            "seeing" => 0.8,
            "airmass" => 1.2,
            "time" => 60.0,
            "mag" => 18.0,
            "snr" => 10.0,
        };
        defaults.remove(self.single_output(mode)?.code);
        Ok(defaults)
    }

    fn parse_input(
        &self,
        mode: Mode,
        raw: &Values,
        defaults: Option<&Values>,
    ) -> CalcResult<Values> {
        let inputs = self.inputs(mode, None)?;
        let parsed = parse_fields(&inputs, raw, defaults, |field, value| match field.code {
            "filter" => parse_text(value),
            _ => parse_float(value),
        })?;

        self.engine.filter(parsed.str("filter")?)?;
        if parsed.float("seeing")? <= 0.0 {
            return Err(CalcError::user("The seeing must be positive."));
        }
        validate_airmass(parsed.float("airmass")?)?;
        for (code, description) in [("time", "integration time"), ("snr", "signal-to-noise ratio")] {
            if parsed.contains_key(code) && parsed.float(code)? <= 0.0 {
                return Err(CalcError::user(format!("The {description} must be positive.")));
            }
        }

        Ok(parsed)
    }

    fn convert_input_mode(&self, mode: Mode, new_mode: Mode, input: &Values) -> CalcResult<Values> {
        let old_output = self.single_output(mode)?;
        let new_output = self.single_output(new_mode)?;
        if mode == new_mode {
            return Ok(input.clone());
        }
        log::debug!("Converting imaging input from mode {mode} to {new_mode}");

        let result = self.calculate(mode, input)?;
        let mut converted = input.clone();
        converted.remove(new_output.code);
        converted.insert(old_output.code, result.output.float(old_output.code)?);
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
        log::debug!("Imaging calculation in mode {mode}");
        validate_input_keys(&self.inputs(mode, None)?, input)?;

        let airmass = input.float("airmass")?;
        validate_airmass(airmass)?;
        let obs = ImagingObservation {
            filter: input.str("filter")?.to_string(),
            seeing: input.float("seeing")?,
            airmass,
        };

        let value = match mode {
            TIME => self
                .engine
                .time(&obs, input.float("mag")?, input.float("snr")?)?,
            MAG => self
                .engine
                .mag(&obs, input.float("snr")?, input.float("time")?)?,
            SNR => self
                .engine
                .snr(&obs, input.float("mag")?, input.float("time")?)?,
            _ => return Err(CalcError::UnknownMode(mode)),
        };

        let mut extra = Extra::new();
        extra.insert("n_pix".to_string(), self.engine.aperture_pixels(&obs)?.into());
        extra.insert("background".to_string(), self.engine.background(&obs)?.into());

        let output = values! { self.single_output(mode)?.code => value };
        Ok(CalculatorResult::new(output, extra))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use propcalc_core::value::Value;

    #[test]
    fn test_schema() {
        let calc = ImagingCalculator::new();
        for &(mode, _) in calc.modes() {
            let output = calc.single_output(mode).unwrap();
            let inputs = calc.inputs(mode, None).unwrap();
            assert!(inputs.find_item(|f| f.code == output.code).is_none());
            assert_eq!(inputs.len(), 5);
            validate_input_keys(&inputs, &calc.default_input(mode).unwrap()).unwrap();
        }
        assert!(calc.outputs(4, None).unwrap_err().is_schema_error());
    }

    #[test]
    fn test_parse_input() {
        let calc = ImagingCalculator::new();
        let defaults = calc.default_input(SNR).unwrap();
        let raw = values! {
            "filter" => " J ",
            "seeing" => "1.0",
            "airmass" => "",
            "time" => "120",
            "mag" => "19.5",
        };
        let parsed = calc.parse_input(SNR, &raw, Some(&defaults)).unwrap();
        assert_eq!(parsed.str("filter").unwrap(), "J");
        assert_eq!(parsed.float("airmass").unwrap(), 1.2);
        assert_eq!(parsed.float("time").unwrap(), 120.0);

        let mut bad = raw.clone();
        bad.insert("airmass", "0.9");
        let err = calc.parse_input(SNR, &bad, Some(&defaults)).unwrap_err();
        assert_eq!(err.to_string(), "Airmass should be between 1 and 5.");

        let mut bad = raw;
        bad.insert("filter", "U");
        assert!(calc.parse_input(SNR, &bad, Some(&defaults)).unwrap_err().is_user_error());
    }

    #[test]
    fn test_calculate() {
        let calc = ImagingCalculator::new();
        let result = calc.calculate(TIME, &calc.default_input(TIME).unwrap()).unwrap();
        assert_eq!(result.output.keys().collect::<Vec<_>>(), ["time"]);
        assert!(result.output.float("time").unwrap() > 0.0);
        assert!(result.extra_float("n_pix").unwrap() > 1.0);

        let mut input = calc.default_input(MAG).unwrap();
        input.insert("airmass", Value::from(6.0));
        assert!(calc.calculate(MAG, &input).unwrap_err().is_user_error());
    }

    #[test]
    fn test_convert_mode_swaps_fields() {
        let calc = ImagingCalculator::new();
        let input = calc.default_input(SNR).unwrap();
        let snr = calc.calculate(SNR, &input).unwrap().output.float("snr").unwrap();

        let time_input = calc.convert_input_mode(SNR, TIME, &input).unwrap();
        assert!(!time_input.contains_key("time"));
        assert_eq!(time_input.float("snr").unwrap(), snr);

        let time = calc.calculate(TIME, &time_input).unwrap().output.float("time").unwrap();
        assert_relative_eq!(time, 60.0, max_relative = 1e-9);

        assert_eq!(calc.convert_input_mode(MAG, MAG, &input).unwrap(), input);
        assert!(calc.convert_input_mode(SNR, 7, &input).unwrap_err().is_schema_error());
    }
}
