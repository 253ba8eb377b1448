//! The interface implemented by every instrument calculator.
//!
//! A calculator is a stateless object describing one family of
//! sensitivity/time/magnitude trade-off calculations. Callers drive it as
//! follows:
//!
//! 1. pick a mode from [`Calculator::modes`],
//! 2. fetch the input schema with [`Calculator::inputs`] and render a form,
//! 3. extract the submitted values with [`Calculator::form_input`] and convert
//!    them with [`Calculator::parse_input`],
//! 4. evaluate with [`Calculator::calculate`].
//!
//! Stored calculations carry the mode and schema version they were made with.
//! Older inputs are brought up to date with
//! [`Calculator::convert_input_version`] and the form can switch modes with
//! [`Calculator::convert_input_mode`].
//!
//! Calculators hold no per-call state so a single instance may be shared
//! between threads.

use std::collections::BTreeMap;

use crate::errors::{CalcError, CalcResult};
use crate::parse::extract_form_values;
use crate::result::{Calculation, CalculatorResult};
use crate::sectioned_list::SectionedList;
use crate::value::{CalculatorMode, CalculatorValue, Mode, Value, Values};

pub trait Calculator: Send + Sync {
    /// Identifier, unique among the calculators of one facility.
    fn code(&self) -> &'static str;

    /// Display name.
    fn name(&self) -> &'static str;

    /// Version string of the underlying engine, for display.
    fn calc_version(&self) -> String;

    /// Available modes in display order.
    fn modes(&self) -> &'static [(Mode, CalculatorMode)];

    /// Current schema version.
    fn version(&self) -> u32;

    /// Input schema for a mode.
    ///
    /// `None` selects the current version.
    fn inputs(&self, mode: Mode, version: Option<u32>) -> CalcResult<SectionedList<CalculatorValue>>;

    /// Output schema for a mode.
    ///
    /// The first entry is the primary output.
    fn outputs(&self, mode: Mode, version: Option<u32>) -> CalcResult<Vec<CalculatorValue>>;

    /// Fallback values for every input of a mode.
    fn default_input(&self, mode: Mode) -> CalcResult<Values>;

    /// Convert raw form values into typed input.
    ///
    /// Blank values are replaced from `defaults` where given. Otherwise a
    /// conversion failure or an out of range value is a user error.
    fn parse_input(&self, mode: Mode, raw: &Values, defaults: Option<&Values>)
        -> CalcResult<Values>;

    /// Derive a valid input for `new_mode` from a valid input for `mode`.
    fn convert_input_mode(&self, mode: Mode, new_mode: Mode, input: &Values) -> CalcResult<Values>;

    /// Upgrade an input captured with an older schema version.
    fn convert_input_version(&self, mode: Mode, old_version: u32, input: &Values)
        -> CalcResult<Values>;

    /// Perform the calculation.
    fn calculate(&self, mode: Mode, input: &Values) -> CalcResult<CalculatorResult>;

    /// Render typed input for display.
    ///
    /// Null values are replaced by the mode's defaults.
    fn format_input(
        &self,
        mode: Mode,
        inputs: &SectionedList<CalculatorValue>,
        values: &Values,
    ) -> CalcResult<BTreeMap<String, String>> {
        let defaults = self.default_input(mode)?;

        Ok(inputs
            .iter()
            .map(|field| {
                let value = match values.get(field.code) {
                    None | Some(Value::Null) => defaults.get(field.code).unwrap_or(&Value::Null),
                    Some(value) => value,
                };
                (field.code.to_string(), field.format.render(value))
            })
            .collect())
    }

    /// Extract the raw values belonging to a schema from a submitted form.
    ///
    /// Absent fields (e.g. unchecked checkboxes) are null.
    fn form_input(&self, inputs: &SectionedList<CalculatorValue>, form: &Values) -> Values {
        extract_form_values(inputs, form)
    }

    /// Simplify a stored calculation for compact display.
    fn condense_calculation(
        &self,
        _mode: Mode,
        _version: u32,
        _calculation: &mut Calculation,
    ) -> CalcResult<()> {
        Ok(())
    }

    fn mode_info(&self, mode: Mode) -> CalcResult<&'static CalculatorMode> {
        self.modes()
            .iter()
            .find(|(m, _)| *m == mode)
            .map(|(_, info)| info)
            .ok_or(CalcError::UnknownMode(mode))
    }

    /// Look up a mode by its code.
    fn mode_by_code(&self, code: &str) -> Option<Mode> {
        self.modes()
            .iter()
            .find(|(_, info)| info.code == code)
            .map(|(m, _)| *m)
    }

    /// Resolve an optional version to a known one.
    fn resolve_version(&self, version: Option<u32>) -> CalcResult<u32> {
        match version {
            None => Ok(self.version()),
            Some(v) if v >= 1 && v <= self.version() => Ok(v),
            Some(v) => Err(CalcError::UnknownVersion(v)),
        }
    }
}

impl Calculation {
    /// Assemble a stored calculation with the schema for its mode and version.
    pub fn from_calculator(
        calculator: &dyn Calculator,
        mode: Mode,
        version: u32,
        input: Values,
        output: Values,
    ) -> CalcResult<Self> {
        Ok(Calculation {
            mode,
            version,
            inputs: calculator.inputs(mode, Some(version))?,
            input,
            outputs: calculator.outputs(mode, Some(version))?,
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_fields, parse_float, validate_input_keys};
    use crate::value::FieldFormat;
    use crate::values;

    const DOUBLE: Mode = 1;
    const HALVE: Mode = 2;

    static MODES: [(Mode, CalculatorMode); 2] = [
        (DOUBLE, CalculatorMode::new("double", "Double")),
        (HALVE, CalculatorMode::new("halve", "Halve")),
    ];

    const X: CalculatorValue = CalculatorValue::new("x", "Value", "x", FieldFormat::Fixed(2), None);
    const Y: CalculatorValue = CalculatorValue::new("y", "Result", "y", FieldFormat::Fixed(2), None);

    struct Scaler;

    impl Calculator for Scaler {
        fn code(&self) -> &'static str {
            "scale"
        }

        fn name(&self) -> &'static str {
            "Scaler"
        }

        fn calc_version(&self) -> String {
            "1.0".to_string()
        }

        fn modes(&self) -> &'static [(Mode, CalculatorMode)] {
            &MODES
        }

        fn version(&self) -> u32 {
            2
        }

        fn inputs(
            &self,
            mode: Mode,
            version: Option<u32>,
        ) -> CalcResult<SectionedList<CalculatorValue>> {
            self.mode_info(mode)?;
            self.resolve_version(version)?;
            Ok([X].into_iter().collect())
        }

        fn outputs(&self, mode: Mode, version: Option<u32>) -> CalcResult<Vec<CalculatorValue>> {
            self.mode_info(mode)?;
            self.resolve_version(version)?;
            Ok(vec![Y])
        }

        fn default_input(&self, mode: Mode) -> CalcResult<Values> {
            self.mode_info(mode)?;
            Ok(values! { "x" => 1.0 })
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

        fn convert_input_mode(
            &self,
            _mode: Mode,
            _new_mode: Mode,
            input: &Values,
        ) -> CalcResult<Values> {
            Ok(input.clone())
        }

        fn convert_input_version(
            &self,
            _mode: Mode,
            _old_version: u32,
            input: &Values,
        ) -> CalcResult<Values> {
            Ok(input.clone())
        }

        fn calculate(&self, mode: Mode, input: &Values) -> CalcResult<CalculatorResult> {
            validate_input_keys(&self.inputs(mode, None)?, input)?;
            let x = input.float("x")?;
            let y = match mode {
                DOUBLE => x * 2.0,
                HALVE => x / 2.0,
                _ => return Err(CalcError::UnknownMode(mode)),
            };
            Ok(CalculatorResult::new(values! { "y" => y }, Default::default()))
        }
    }

    #[test]
    fn test_mode_lookup() {
        let calc = Scaler;
        assert_eq!(calc.mode_info(HALVE).unwrap().code, "halve");
        assert_eq!(calc.mode_by_code("double"), Some(DOUBLE));
        assert_eq!(calc.mode_by_code("triple"), None);
        assert!(matches!(calc.mode_info(9), Err(CalcError::UnknownMode(9))));
    }

    #[test]
    fn test_resolve_version() {
        let calc = Scaler;
        assert_eq!(calc.resolve_version(None).unwrap(), 2);
        assert_eq!(calc.resolve_version(Some(1)).unwrap(), 1);
        assert!(calc.resolve_version(Some(0)).unwrap_err().is_schema_error());
        assert!(calc.resolve_version(Some(3)).unwrap_err().is_schema_error());
    }

    #[test]
    fn test_format_input_substitutes_defaults() {
        let calc = Scaler;
        let inputs = calc.inputs(DOUBLE, None).unwrap();

        let formatted = calc
            .format_input(DOUBLE, &inputs, &values! { "x" => Value::Null })
            .unwrap();
        assert_eq!(formatted["x"], "1.00");

        let formatted = calc
            .format_input(DOUBLE, &inputs, &values! { "x" => 2.5 })
            .unwrap();
        assert_eq!(formatted["x"], "2.50");
    }

    #[test]
    fn test_form_input_ignores_unrelated_fields() {
        let calc = Scaler;
        let inputs = calc.inputs(DOUBLE, None).unwrap();
        let form = values! { "x" => "3", "csrf" => "token" };
        assert_eq!(calc.form_input(&inputs, &form), values! { "x" => "3" });
        assert_eq!(
            calc.form_input(&inputs, &Values::new()),
            values! { "x" => Value::Null }
        );
    }

    #[test]
    fn test_calculate_through_trait_object() {
        let calc: Box<dyn Calculator> = Box::new(Scaler);
        let input = calc.parse_input(HALVE, &values! { "x" => "3" }, None).unwrap();
        let result = calc.calculate(HALVE, &input).unwrap();
        assert_eq!(result.output, values! { "y" => 1.5 });

        let err = calc
            .calculate(HALVE, &values! { "x" => 3.0, "z" => 1.0 })
            .unwrap_err();
        assert!(matches!(err, CalcError::UnexpectedField(_)));
    }

    #[test]
    fn test_calculation_from_calculator() {
        let calc = Scaler;
        let calculation = Calculation::from_calculator(
            &calc,
            DOUBLE,
            1,
            values! { "x" => 1.0 },
            values! { "y" => 2.0 },
        )
        .unwrap();
        assert_eq!(calculation.inputs.len(), 1);
        assert_eq!(calculation.outputs, vec![Y]);

        assert!(Calculation::from_calculator(&calc, 5, 1, Values::new(), Values::new()).is_err());
    }
}
