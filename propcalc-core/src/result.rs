//! Results of calculator invocations and stored calculations.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::sectioned_list::SectionedList;
use crate::value::{CalculatorValue, Mode, Value, Values};

/// The primary output of a calculation evaluated under one weather band's
/// representative, minimum and maximum opacity.
///
/// An entry is `None` if the band has no such limit or if the calculation
/// failed for that opacity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BandComparison {
    pub rep: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Primary output per weather band, in band table order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeatherComparison(IndexMap<u32, BandComparison>);

impl WeatherComparison {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, band: u32, comparison: BandComparison) {
        self.0.insert(band, comparison);
    }

    pub fn get(&self, band: u32) -> Option<&BandComparison> {
        self.0.get(&band)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &BandComparison)> {
        self.0.iter().map(|(band, c)| (*band, c))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A display-only value attached to a calculation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Value(Value),
    Comparison(WeatherComparison),
}

impl From<f64> for ExtraValue {
    fn from(x: f64) -> Self {
        ExtraValue::Value(Value::Float(x))
    }
}

impl From<Value> for ExtraValue {
    fn from(v: Value) -> Self {
        ExtraValue::Value(v)
    }
}

impl From<WeatherComparison> for ExtraValue {
    fn from(c: WeatherComparison) -> Self {
        ExtraValue::Comparison(c)
    }
}

/// Display-only values derived during a calculation.
pub type Extra = BTreeMap<String, ExtraValue>;

/// Key under which the weather band comparison is stored in [`Extra`].
pub const WEATHER_COMPARISON: &str = "wb_comparison";

/// The result of one calculator invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalculatorResult {
    /// Canonical output, keyed by the calculator's output codes
    pub output: Values,
    /// Additional values for display, never persisted
    pub extra: Extra,
}

impl CalculatorResult {
    pub fn new(output: Values, extra: Extra) -> Self {
        Self { output, extra }
    }

    /// A numeric extra value, if present.
    pub fn extra_float(&self, code: &str) -> Option<f64> {
        match self.extra.get(code) {
            Some(ExtraValue::Value(v)) => v.as_float(),
            _ => None,
        }
    }

    pub fn weather_comparison(&self) -> Option<&WeatherComparison> {
        match self.extra.get(WEATHER_COMPARISON) {
            Some(ExtraValue::Comparison(c)) => Some(c),
            _ => None,
        }
    }
}

/// A stored calculation together with the schema used to display it.
///
/// This is the presentation copy which
/// [`condense_calculation`](crate::calculator::Calculator::condense_calculation)
/// rewrites; the caller's stored input is not touched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calculation {
    pub mode: Mode,
    pub version: u32,
    pub inputs: SectionedList<CalculatorValue>,
    pub input: Values,
    pub outputs: Vec<CalculatorValue>,
    pub output: Values,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    #[test]
    fn test_extra_accessors() {
        let mut comparison = WeatherComparison::new();
        comparison.insert(
            1,
            BandComparison {
                rep: Some(1.0),
                min: None,
                max: Some(1.2),
            },
        );

        let mut extra = Extra::new();
        extra.insert("zenith_angle".to_string(), 20.0.into());
        extra.insert(WEATHER_COMPARISON.to_string(), comparison.clone().into());
        let result = CalculatorResult::new(values! { "t" => 1.0 }, extra);

        assert_eq!(result.extra_float("zenith_angle"), Some(20.0));
        assert_eq!(result.extra_float(WEATHER_COMPARISON), None);
        assert_eq!(result.weather_comparison(), Some(&comparison));
        assert_eq!(result.weather_comparison().unwrap().get(1).unwrap().min, None);
    }

    #[test]
    fn test_comparison_keeps_band_order() {
        let mut comparison = WeatherComparison::new();
        for band in [3, 1, 2] {
            comparison.insert(band, BandComparison::default());
        }
        let bands: Vec<_> = comparison.iter().map(|(band, _)| band).collect();
        assert_eq!(bands, [3, 1, 2]);
    }

    #[test]
    fn test_result_serializes() {
        let mut comparison = WeatherComparison::new();
        comparison.insert(
            2,
            BandComparison {
                rep: Some(0.5),
                min: Some(0.4),
                max: None,
            },
        );
        let mut extra = Extra::new();
        extra.insert(WEATHER_COMPARISON.to_string(), comparison.into());
        let result = CalculatorResult::new(values! { "rms" => 0.25 }, extra);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["output"]["rms"], 0.25);
        assert_eq!(json["extra"]["wb_comparison"]["2"]["rep"], 0.5);
        assert!(json["extra"]["wb_comparison"]["2"]["max"].is_null());
    }
}
