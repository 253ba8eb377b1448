//! Minimal calculator demonstrating the [`Calculator`] interface.
//!
//! It adds or subtracts two numbers, scaling the result so that the output is
//! distinguishable from the input.
//!
//! | Mode | Inputs | Output |
//! |------|--------|--------|
//! | `add` | `a`, `b` | `sum = (a + b) * 1000` |
//! | `sub` | `a`, `b` | `diff = (a - b) / 1000` |
//!
//! Converting an input between the two modes negates `b`, so that the
//! magnitude of the unscaled result is preserved.

use std::time::Instant;

use propcalc_core::errors::{CalcError, CalcResult};
use propcalc_core::parse::{parse_fields, parse_float, validate_input_keys};
use propcalc_core::result::{CalculatorResult, Extra};
use propcalc_core::sectioned_list::SectionedList;
use propcalc_core::value::{CalculatorMode, CalculatorValue, FieldFormat, Mode, Values};
use propcalc_core::{values, Calculator};

pub const ADDITION: Mode = 1;
pub const SUBTRACTION: Mode = 2;

static MODES: [(Mode, CalculatorMode); 2] = [
    (ADDITION, CalculatorMode::new("add", "Addition")),
    (SUBTRACTION, CalculatorMode::new("sub", "Subtraction")),
];

const A: CalculatorValue = CalculatorValue::new("a", "First value", "a", FieldFormat::Fixed(3), None);
const B: CalculatorValue =
    CalculatorValue::new("b", "Second value", "b", FieldFormat::Fixed(3), None);
const SUM: CalculatorValue =
    CalculatorValue::new("sum", "Sum", "a + b", FieldFormat::Fixed(3), Some("thousandths"));
const DIFF: CalculatorValue =
    CalculatorValue::new("diff", "Difference", "a - b", FieldFormat::Fixed(6), Some("thousands"));

#[derive(Debug, Clone, Copy, Default)]
pub struct ExampleCalculator;

impl ExampleCalculator {
    pub fn new() -> Self {
        Self
    }
}

impl Calculator for ExampleCalculator {
    fn code(&self) -> &'static str {
        "example"
    }

    fn name(&self) -> &'static str {
        "Example Calculator"
    }

    fn calc_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    fn modes(&self) -> &'static [(Mode, CalculatorMode)] {
        &MODES
    }

    fn version(&self) -> u32 {
        1
    }

    fn inputs(&self, mode: Mode, version: Option<u32>) -> CalcResult<SectionedList<CalculatorValue>> {
        self.mode_info(mode)?;
        self.resolve_version(version)?;
        Ok([A, B].into_iter().collect())
    }

    fn outputs(&self, mode: Mode, version: Option<u32>) -> CalcResult<Vec<CalculatorValue>> {
        self.resolve_version(version)?;
        match mode {
            ADDITION => Ok(vec![SUM]),
            SUBTRACTION => Ok(vec![DIFF]),
            _ => Err(CalcError::UnknownMode(mode)),
        }
    }

    fn default_input(&self, mode: Mode) -> CalcResult<Values> {
        self.mode_info(mode)?;
        Ok(values! { "a" => 0.0, "b" => 0.0 })
    }

    fn parse_input(
        &self,
        mode: Mode,
        raw: &Values,
        defaults: Option<&Values>,
    ) -> CalcResult<Values> {
        let inputs = self.inputs(mode, None)?;
        parse_fields(&inputs, raw, defaults, |_, value| parse_float(value))
    }

    fn convert_input_mode(&self, mode: Mode, new_mode: Mode, input: &Values) -> CalcResult<Values> {
        self.mode_info(mode)?;
        self.mode_info(new_mode)?;
        if mode == new_mode {
            return Ok(input.clone());
        }

        log::debug!("Converting example input from mode {mode} to {new_mode}");
        let mut converted = input.clone();
        converted.insert("b", -input.float("b")?);
        Ok(converted)
    }

    fn convert_input_version(
        &self,
        mode: Mode,
        old_version: u32,
        input: &Values,
    ) -> CalcResult<Values> {
        self.mode_info(mode)?;
        match old_version {
            1 => Ok(input.clone()),
            _ => Err(CalcError::UnknownVersion(old_version)),
        }
    }

    fn calculate(&self, mode: Mode, input: &Values) -> CalcResult<CalculatorResult> {
        let start = Instant::now();
        validate_input_keys(&self.inputs(mode, None)?, input)?;

        let a = input.float("a")?;
        let b = input.float("b")?;

        let output = match mode {
            ADDITION => values! { "sum" => (a + b) * 1000.0 },
            SUBTRACTION => values! { "diff" => (a - b) / 1000.0 },
            _ => return Err(CalcError::UnknownMode(mode)),
        };

        let mut extra = Extra::new();
        extra.insert("product".to_string(), (a * b).into());
        extra.insert(
            "t_elapsed".to_string(),
            start.elapsed().as_secs_f64().into(),
        );

        Ok(CalculatorResult::new(output, extra))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn test_addition() {
        let calc = ExampleCalculator::new();
        let result = calc
            .calculate(ADDITION, &values! { "a" => 1.0, "b" => 2.0 })
            .unwrap();

        assert_eq!(result.output, values! { "sum" => 3000.0 });
        assert_eq!(result.extra_float("product"), Some(2.0));
        assert!(result.extra_float("t_elapsed").unwrap() >= 0.0);
        assert_eq!(result.extra.len(), 2);
    }

    #[test]
    fn test_subtraction() {
        let calc = ExampleCalculator::new();
        let result = calc
            .calculate(SUBTRACTION, &values! { "a" => 1.0, "b" => 2.0 })
            .unwrap();

        assert!(is_close!(result.output.float("diff").unwrap(), -0.001));
        assert_eq!(result.output.len(), 1);
    }

    #[test]
    fn test_convert_mode_negates_b() {
        let calc = ExampleCalculator::new();
        let input = values! { "a" => 1.0, "b" => 2.0 };

        let converted = calc.convert_input_mode(ADDITION, SUBTRACTION, &input).unwrap();
        assert_eq!(converted, values! { "a" => 1.0, "b" => -2.0 });

        let restored = calc
            .convert_input_mode(SUBTRACTION, ADDITION, &converted)
            .unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn test_schema_errors() {
        let calc = ExampleCalculator::new();
        assert!(calc.inputs(3, None).unwrap_err().is_schema_error());
        assert!(calc.outputs(ADDITION, Some(2)).unwrap_err().is_schema_error());
        assert!(calc.default_input(0).unwrap_err().is_schema_error());
        assert!(calc
            .convert_input_version(ADDITION, 2, &Values::new())
            .unwrap_err()
            .is_schema_error());
    }

    #[test]
    fn test_parse_input() {
        let calc = ExampleCalculator::new();
        let defaults = calc.default_input(ADDITION).unwrap();

        let parsed = calc
            .parse_input(ADDITION, &values! { "a" => "1.5", "b" => "" }, Some(&defaults))
            .unwrap();
        assert_eq!(parsed, values! { "a" => 1.5, "b" => 0.0 });

        let err = calc
            .parse_input(ADDITION, &values! { "a" => "one", "b" => "2" }, Some(&defaults))
            .unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_format_input() {
        let calc = ExampleCalculator::new();
        let inputs = calc.inputs(ADDITION, None).unwrap();
        let formatted = calc
            .format_input(ADDITION, &inputs, &values! { "a" => 1.0, "b" => 0.25 })
            .unwrap();
        assert_eq!(formatted["a"], "1.000");
        assert_eq!(formatted["b"], "0.250");
    }
}
