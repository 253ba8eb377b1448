//! Conversion of raw form values into typed calculator values.
//!
//! Raw input arrives as strings (text boxes, selects) or booleans (checkboxes).
//! Each calculator maps every field code to one of the converters here and
//! hands them to [`parse_fields`], which takes care of substituting defaults
//! for blank values and of naming the offending field on failure.

use std::str::FromStr;

use crate::duration::parse_hours;
use crate::errors::{CalcError, CalcResult};
use crate::sectioned_list::SectionedList;
use crate::value::{CalculatorValue, Value, Values};

/// Why a single field could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The field was empty and a value is required
    Blank,
    /// The field could not be understood
    Invalid,
}

pub type FieldResult = Result<Value, FieldError>;

fn text(raw: &Value) -> Result<Option<&str>, FieldError> {
    match raw {
        Value::Null => Ok(None),
        Value::Str(s) if s.trim().is_empty() => Ok(None),
        Value::Str(s) => Ok(Some(s.trim())),
        _ => Err(FieldError::Invalid),
    }
}

/// A required floating point number.
pub fn parse_float(raw: &Value) -> FieldResult {
    match raw {
        Value::Float(x) if x.is_finite() => Ok(Value::Float(*x)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Str(_) | Value::Null => match text(raw)? {
            None => Err(FieldError::Blank),
            Some(s) => match s.parse::<f64>() {
                Ok(x) if x.is_finite() => Ok(Value::Float(x)),
                _ => Err(FieldError::Invalid),
            },
        },
        _ => Err(FieldError::Invalid),
    }
}

/// A floating point number where blank means null.
pub fn parse_optional_float(raw: &Value) -> FieldResult {
    if raw.is_blank() {
        return Ok(Value::Null);
    }
    parse_float(raw)
}

/// A required integer.
pub fn parse_int(raw: &Value) -> FieldResult {
    match raw {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Str(_) | Value::Null => match text(raw)? {
            None => Err(FieldError::Blank),
            Some(s) => s
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| FieldError::Invalid),
        },
        _ => Err(FieldError::Invalid),
    }
}

/// A checkbox flag.
///
/// Absent (null) means unchecked.
pub fn parse_bool(raw: &Value) -> FieldResult {
    match raw {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Null => Ok(Value::Bool(false)),
        Value::Int(i) => Ok(Value::Bool(*i != 0)),
        Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(Value::Bool(false)),
            "1" | "true" | "yes" | "on" => Ok(Value::Bool(true)),
            _ => Err(FieldError::Invalid),
        },
        Value::Float(_) => Err(FieldError::Invalid),
    }
}

/// A required non-blank string.
pub fn parse_text(raw: &Value) -> FieldResult {
    match text(raw)? {
        None => Err(FieldError::Blank),
        Some(s) => Ok(Value::Str(s.to_string())),
    }
}

/// A string where blank means null.
pub fn parse_optional_text(raw: &Value) -> FieldResult {
    Ok(text(raw)?.map_or(Value::Null, |s| Value::Str(s.to_string())))
}

/// A duration in hours, accepting the syntax of [`parse_hours`].
///
/// The result is always finite and not negative.
pub fn parse_duration(raw: &Value) -> FieldResult {
    let hours = match raw {
        Value::Float(_) | Value::Int(_) => parse_float(raw)?,
        _ => match text(raw)? {
            None => return Err(FieldError::Blank),
            Some(s) => parse_hours(s)
                .map(Value::Float)
                .map_err(|_| FieldError::Invalid)?,
        },
    };
    match hours.as_float() {
        Some(x) if x.is_finite() && x >= 0.0 => Ok(hours),
        _ => Err(FieldError::Invalid),
    }
}

/// Parse every field declared in `inputs` from `raw`.
///
/// `parser` converts one raw value for a given field. If conversion fails and
/// the raw value was blank, the value from `defaults` is used when available.
/// Otherwise the first failing field produces a user error naming it.
pub fn parse_fields<F>(
    inputs: &SectionedList<CalculatorValue>,
    raw: &Values,
    defaults: Option<&Values>,
    mut parser: F,
) -> CalcResult<Values>
where
    F: FnMut(&CalculatorValue, &Value) -> FieldResult,
{
    let mut parsed = Values::new();

    for field in inputs.iter() {
        let raw_value = raw.get(field.code).unwrap_or(&Value::Null);

        let value = match parser(field, raw_value) {
            Ok(value) => value,
            Err(err) => {
                let default = defaults
                    .filter(|_| raw_value.is_blank())
                    .and_then(|d| d.get(field.code));
                match (default, err) {
                    (Some(default), _) => {
                        log::debug!("Using default value for '{}'", field.code);
                        default.clone()
                    }
                    (None, FieldError::Blank) => {
                        return Err(CalcError::user(format!(
                            "Please specify a value for {}.",
                            field.name.to_lowercase()
                        )))
                    }
                    (None, FieldError::Invalid) => {
                        return Err(CalcError::user(format!(
                            "Could not understand the value for {}.",
                            field.name.to_lowercase()
                        )))
                    }
                }
            }
        };

        parsed.insert(field.code, value);
    }

    Ok(parsed)
}

/// Take the raw values belonging to a schema from a submitted form.
///
/// Fields absent from the form (e.g. unchecked checkboxes) are null.
pub fn extract_form_values(inputs: &SectionedList<CalculatorValue>, form: &Values) -> Values {
    inputs
        .iter()
        .map(|field| {
            let value = form.get(field.code).cloned().unwrap_or_default();
            (field.code.to_string(), value)
        })
        .collect()
}

/// Parse an enumerated choice, naming `description` in the user error.
pub fn choice<T: FromStr>(value: &str, description: &str) -> CalcResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CalcError::user(format!("Unknown {description} '{value}'.")))
}

/// Highest airmass accepted as an input.
pub const MAX_AIRMASS: f64 = 5.0;

/// Check that an airmass is within the range accepted by the calculators.
pub fn validate_airmass(airmass: f64) -> CalcResult<()> {
    if (1.0..=MAX_AIRMASS).contains(&airmass) {
        return Ok(());
    }
    Err(CalcError::user(format!(
        "Airmass should be between 1 and {MAX_AIRMASS}."
    )))
}

/// Check that an input map has exactly the fields of a schema.
pub fn validate_input_keys(
    inputs: &SectionedList<CalculatorValue>,
    input: &Values,
) -> CalcResult<()> {
    input.check_keys(inputs.iter().map(|field| field.code))
}
