//! Value types describing calculator fields, modes and submitted values.
//!
//! Calculators declare their schema statically using [`CalculatorValue`]
//! descriptors and a table of [`CalculatorMode`]s. Submitted and computed
//! values travel in a [`Values`] map keyed by the descriptor `code`.
//!
//! # Example
//!
//! ```
//! use propcalc_core::value::{CalculatorValue, FieldFormat, Value, Values};
//!
//! const TAU: CalculatorValue =
//!     CalculatorValue::new("tau", "225 GHz opacity", "tau225", FieldFormat::Fixed(3), None);
//!
//! let mut values = Values::new();
//! values.insert(TAU.code, 0.08);
//! assert_eq!(TAU.format.render(values.get("tau").unwrap()), "0.080");
//! ```

use crate::errors::{CalcError, CalcResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifier of a calculator mode.
///
/// Mode numbers only have meaning within one calculator.
pub type Mode = u32;

/// A selectable calculation direction within a calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalculatorMode {
    /// Short stable identifier (e.g. `"time"`)
    pub code: &'static str,
    /// Display name
    pub name: &'static str,
}

impl CalculatorMode {
    pub const fn new(code: &'static str, name: &'static str) -> Self {
        Self { code, name }
    }
}

/// How a field value is rendered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldFormat {
    /// Rendered as-is
    Text,
    /// Rendered as a whole number
    Integer,
    /// Rendered with a fixed number of decimal places
    Fixed(usize),
    /// Booleans rendered as "Yes" / "No"
    YesNo,
}

impl FieldFormat {
    /// Render a value according to this format.
    ///
    /// Null values render as an empty string.
    pub fn render(&self, value: &Value) -> String {
        match (self, value) {
            (_, Value::Null) => String::new(),
            (FieldFormat::Fixed(precision), v) => match v.as_float() {
                Some(x) => format!("{:.*}", precision, x),
                None => v.to_string(),
            },
            (FieldFormat::Integer, v) => match v.as_float() {
                Some(x) => format!("{:.0}", x),
                None => v.to_string(),
            },
            (FieldFormat::YesNo, Value::Bool(b)) => {
                if *b {
                    "Yes".to_string()
                } else {
                    "No".to_string()
                }
            }
            (_, v) => v.to_string(),
        }
    }
}

/// Descriptor of one calculator input or output field.
///
/// Descriptors are immutable: the `with_*` methods return modified copies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalculatorValue {
    /// Stable machine key, unique within one mode and version
    pub code: &'static str,
    /// Display label
    pub name: &'static str,
    /// Short display label
    pub abbr: &'static str,
    /// Display format
    pub format: FieldFormat,
    /// Physical unit, if any
    pub unit: Option<&'static str>,
}

impl CalculatorValue {
    pub const fn new(
        code: &'static str,
        name: &'static str,
        abbr: &'static str,
        format: FieldFormat,
        unit: Option<&'static str>,
    ) -> Self {
        Self {
            code,
            name,
            abbr,
            format,
            unit,
        }
    }

    pub fn with_name(self, name: &'static str) -> Self {
        Self { name, ..self }
    }

    pub fn with_abbr(self, abbr: &'static str) -> Self {
        Self { abbr, ..self }
    }

    pub fn with_format(self, format: FieldFormat) -> Self {
        Self { format, ..self }
    }

    pub fn with_unit(self, unit: Option<&'static str>) -> Self {
        Self { unit, ..self }
    }

    /// Render a value using this field's format, appending the unit if present.
    pub fn render_with_unit(&self, value: &Value) -> String {
        let rendered = self.format.render(value);
        match self.unit {
            Some(unit) if !rendered.is_empty() => format!("{rendered} {unit}"),
            _ => rendered,
        }
    }
}

/// A single parsed (or raw) field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Name of the variant, used in type error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or a string containing only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Str(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric value, accepting integers as floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Mapping from field code to value.
///
/// Used both for raw form input (strings and checkbox flags) and for parsed
/// typed input and output. The typed getters return [`CalcError`]s naming the
/// field so that a mismatch between a value map and a calculator's schema is
/// reported rather than silently ignored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(BTreeMap<String, Value>);

impl Values {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, code: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(code.into(), value.into())
    }

    pub fn get(&self, code: &str) -> Option<&Value> {
        self.0.get(code)
    }

    pub fn remove(&mut self, code: &str) -> Option<Value> {
        self.0.remove(code)
    }

    pub fn contains_key(&self, code: &str) -> bool {
        self.0.contains_key(code)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn require(&self, code: &str) -> CalcResult<&Value> {
        self.0
            .get(code)
            .ok_or_else(|| CalcError::MissingField(code.to_string()))
    }

    fn wrong_type(code: &str, expected: &'static str, found: &Value) -> CalcError {
        CalcError::WrongType {
            code: code.to_string(),
            expected,
            found: found.type_name(),
        }
    }

    /// Get a required numeric value.
    pub fn float(&self, code: &str) -> CalcResult<f64> {
        let value = self.require(code)?;
        value
            .as_float()
            .ok_or_else(|| Self::wrong_type(code, "float", value))
    }

    /// Get a numeric value which may be null.
    pub fn opt_float(&self, code: &str) -> CalcResult<Option<f64>> {
        match self.require(code)? {
            Value::Null => Ok(None),
            value => value
                .as_float()
                .map(Some)
                .ok_or_else(|| Self::wrong_type(code, "float", value)),
        }
    }

    pub fn int(&self, code: &str) -> CalcResult<i64> {
        let value = self.require(code)?;
        value
            .as_int()
            .ok_or_else(|| Self::wrong_type(code, "int", value))
    }

    pub fn opt_int(&self, code: &str) -> CalcResult<Option<i64>> {
        match self.require(code)? {
            Value::Null => Ok(None),
            value => value
                .as_int()
                .map(Some)
                .ok_or_else(|| Self::wrong_type(code, "int", value)),
        }
    }

    pub fn bool(&self, code: &str) -> CalcResult<bool> {
        let value = self.require(code)?;
        value
            .as_bool()
            .ok_or_else(|| Self::wrong_type(code, "bool", value))
    }

    pub fn str(&self, code: &str) -> CalcResult<&str> {
        let value = self.require(code)?;
        value
            .as_str()
            .ok_or_else(|| Self::wrong_type(code, "string", value))
    }

    pub fn opt_str(&self, code: &str) -> CalcResult<Option<&str>> {
        match self.require(code)? {
            Value::Null => Ok(None),
            value => value
                .as_str()
                .map(Some)
                .ok_or_else(|| Self::wrong_type(code, "string", value)),
        }
    }

    /// Check that the keys of this map are exactly the given codes.
    pub fn check_keys<'a>(&self, expected: impl IntoIterator<Item = &'a str>) -> CalcResult<()> {
        let expected: BTreeSet<&str> = expected.into_iter().collect();
        if let Some(missing) = expected.iter().find(|code| !self.0.contains_key(**code)) {
            return Err(CalcError::MissingField(missing.to_string()));
        }
        if let Some(extra) = self.keys().find(|code| !expected.contains(code)) {
            return Err(CalcError::UnexpectedField(extra.to_string()));
        }
        Ok(())
    }
}

impl FromIterator<(String, Value)> for Values {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Values {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Build a [`Values`] map from `code => value` pairs.
///
/// ```
/// use propcalc_core::values;
///
/// let input = values! { "a" => 1.0, "b" => 2.0 };
/// assert_eq!(input.float("b").unwrap(), 2.0);
/// ```
#[macro_export]
macro_rules! values {
    () => { $crate::value::Values::new() };
    ($($code:expr => $value:expr),+ $(,)?) => {{
        let mut values = $crate::value::Values::new();
        $( values.insert($code, $value); )+
        values
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_methods_produce_new_values() {
        let original = CalculatorValue::new(
            "pos",
            "Source position",
            "Position",
            FieldFormat::Fixed(1),
            Some("deg"),
        );
        let modified = original.with_unit(None).with_format(FieldFormat::Text);

        assert_eq!(original.unit, Some("deg"));
        assert_eq!(original.format, FieldFormat::Fixed(1));
        assert_eq!(modified.unit, None);
        assert_eq!(modified.format, FieldFormat::Text);
        assert_eq!(modified.code, "pos");
    }

    #[test]
    fn test_render_formats() {
        assert_eq!(FieldFormat::Fixed(3).render(&Value::Float(0.08)), "0.080");
        assert_eq!(FieldFormat::Fixed(1).render(&Value::Int(2)), "2.0");
        assert_eq!(FieldFormat::Integer.render(&Value::Float(24.6)), "25");
        assert_eq!(FieldFormat::YesNo.render(&Value::Bool(true)), "Yes");
        assert_eq!(FieldFormat::Text.render(&Value::from("HARP")), "HARP");
        assert_eq!(FieldFormat::Fixed(2).render(&Value::Null), "");
    }

    #[test]
    fn test_render_with_unit() {
        let field =
            CalculatorValue::new("t", "Time", "Time", FieldFormat::Fixed(2), Some("hours"));
        assert_eq!(field.render_with_unit(&Value::Float(1.5)), "1.50 hours");
        assert_eq!(field.render_with_unit(&Value::Null), "");
    }

    #[test]
    fn test_typed_getters() {
        let values = values! {
            "tau" => 0.1,
            "n_pt" => 4_i64,
            "basket" => true,
            "rx" => "HARP",
            "freq" => Value::Null,
        };

        assert_eq!(values.float("tau").unwrap(), 0.1);
        assert_eq!(values.float("n_pt").unwrap(), 4.0);
        assert_eq!(values.int("n_pt").unwrap(), 4);
        assert!(values.bool("basket").unwrap());
        assert_eq!(values.str("rx").unwrap(), "HARP");
        assert_eq!(values.opt_float("freq").unwrap(), None);
        assert_eq!(values.opt_str("freq").unwrap(), None);

        assert!(matches!(
            values.float("rx"),
            Err(CalcError::WrongType { expected: "float", found: "string", .. })
        ));
        assert!(matches!(values.float("rms"), Err(CalcError::MissingField(c)) if c == "rms"));
    }

    #[test]
    fn test_check_keys() {
        let values = values! { "a" => 1.0, "b" => 2.0 };
        assert!(values.check_keys(["a", "b"]).is_ok());
        assert!(matches!(
            values.check_keys(["a", "b", "c"]),
            Err(CalcError::MissingField(c)) if c == "c"
        ));
        assert!(matches!(
            values.check_keys(["a"]),
            Err(CalcError::UnexpectedField(c)) if c == "b"
        ));
    }

    #[test]
    fn test_blank_values() {
        assert!(Value::Null.is_blank());
        assert!(Value::from("  ").is_blank());
        assert!(!Value::from("1").is_blank());
        assert!(!Value::Bool(false).is_blank());
    }

    #[test]
    fn test_json_roundtrip() {
        let values = values! {
            "a" => 1.5,
            "n" => 3_i64,
            "flag" => false,
            "name" => "CO",
            "none" => Value::Null,
        };
        let json = serde_json::to_string(&values).unwrap();
        let restored: Values = serde_json::from_str(&json).unwrap();
        assert_eq!(values, restored);
    }
}
