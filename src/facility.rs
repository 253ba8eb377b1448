//! Calculators grouped by the facility offering them.
//!
//! A [`Facility`] builds a [`CalculatorRegistry`] holding one instance of
//! each of its calculators, keyed by calculator code, and supplies any
//! additional context the calculator pages need.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use propcalc_calculators::heterodyne::{lines, HeterodyneCalculator, HeterodyneParameters};
use propcalc_calculators::scuba2::{Scuba2Calculator, Scuba2Parameters};
use propcalc_calculators::ukirt::{ImagingCalculator, ImagingParameters};
use propcalc_calculators::ExampleCalculator;
use propcalc_core::Calculator;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("A calculator with code '{0}' is already registered")]
    DuplicateCode(String),
    #[error("Unknown calculator '{0}'")]
    UnknownCalculator(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] toml::de::Error),
}

/// The calculators of a facility in registration order.
#[derive(Default)]
pub struct CalculatorRegistry {
    calculators: IndexMap<&'static str, Box<dyn Calculator>>,
}

impl CalculatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a calculator, which must have a code not already registered.
    pub fn register(&mut self, calculator: Box<dyn Calculator>) -> Result<(), RegistryError> {
        let code = calculator.code();
        if self.calculators.contains_key(code) {
            return Err(RegistryError::DuplicateCode(code.to_string()));
        }
        log::info!(
            "Registered calculator {} ({}) version {}",
            code,
            calculator.name(),
            calculator.calc_version()
        );
        self.calculators.insert(code, calculator);
        Ok(())
    }

    pub fn get(&self, code: &str) -> Result<&dyn Calculator, RegistryError> {
        self.calculators
            .get(code)
            .map(|calculator| &**calculator)
            .ok_or_else(|| RegistryError::UnknownCalculator(code.to_string()))
    }

    pub fn codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.calculators.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Calculator> {
        self.calculators.values().map(|calculator| &**calculator)
    }

    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }
}

pub trait Facility: Send + Sync {
    fn code(&self) -> &'static str;

    fn name(&self) -> &'static str;

    /// Codes of the calculators built by [`Facility::calculators`], in order.
    fn calculator_codes(&self) -> &'static [&'static str];

    /// Construct the facility's calculators.
    fn calculators(&self) -> Result<CalculatorRegistry, RegistryError>;

    /// Additional template context for a calculator's page.
    fn view_context(&self, calculator_code: &str) -> Result<serde_json::Value, RegistryError> {
        if !self.calculator_codes().contains(&calculator_code) {
            return Err(RegistryError::UnknownCalculator(calculator_code.to_string()));
        }
        Ok(json!({}))
    }
}

/// Parameters for the JCMT calculators
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JcmtParameters {
    pub heterodyne: HeterodyneParameters,
    pub scuba2: Scuba2Parameters,
}

impl JcmtParameters {
    pub fn from_toml_str(s: &str) -> Result<Self, RegistryError> {
        Ok(toml::from_str(s)?)
    }
}

/// The James Clerk Maxwell Telescope.
#[derive(Debug, Clone, Default)]
pub struct Jcmt {
    parameters: JcmtParameters,
}

impl Jcmt {
    pub fn from_parameters(parameters: JcmtParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &JcmtParameters {
        &self.parameters
    }
}

impl Facility for Jcmt {
    fn code(&self) -> &'static str {
        "jcmt"
    }

    fn name(&self) -> &'static str {
        "JCMT"
    }

    fn calculator_codes(&self) -> &'static [&'static str] {
        &["heterodyne", "scuba2"]
    }

    fn calculators(&self) -> Result<CalculatorRegistry, RegistryError> {
        let mut registry = CalculatorRegistry::new();
        registry.register(Box::new(HeterodyneCalculator::from_parameters(
            self.parameters.heterodyne.clone(),
        )))?;
        registry.register(Box::new(Scuba2Calculator::from_parameters(
            self.parameters.scuba2.clone(),
        )))?;
        Ok(registry)
    }

    fn view_context(&self, calculator_code: &str) -> Result<serde_json::Value, RegistryError> {
        match calculator_code {
            "heterodyne" => {
                let receivers: Vec<_> = self
                    .parameters
                    .heterodyne
                    .receivers
                    .iter()
                    .map(|rx| {
                        json!({
                            "code": rx.code,
                            "name": rx.name,
                            "f_min": rx.f_min,
                            "f_max": rx.f_max,
                            "dual_polarization": rx.dual_polarization,
                            "array": rx.is_array(),
                        })
                    })
                    .collect();
                Ok(json!({
                    "line_catalog": lines::catalog_json()?,
                    "receivers": receivers,
                }))
            }
            "scuba2" => Ok(json!({
                "map_modes": serde_json::to_value(&self.parameters.scuba2.map_modes)?,
            })),
            _ => Err(RegistryError::UnknownCalculator(calculator_code.to_string())),
        }
    }
}

/// The United Kingdom Infrared Telescope.
#[derive(Debug, Clone, Default)]
pub struct Ukirt {
    parameters: ImagingParameters,
}

impl Ukirt {
    pub fn from_parameters(parameters: ImagingParameters) -> Self {
        Self { parameters }
    }
}

impl Facility for Ukirt {
    fn code(&self) -> &'static str {
        "ukirt"
    }

    fn name(&self) -> &'static str {
        "UKIRT"
    }

    fn calculator_codes(&self) -> &'static [&'static str] {
        &["imaging"]
    }

    fn calculators(&self) -> Result<CalculatorRegistry, RegistryError> {
        let mut registry = CalculatorRegistry::new();
        registry.register(Box::new(ImagingCalculator::from_parameters(
            self.parameters.clone(),
        )))?;
        Ok(registry)
    }

    fn view_context(&self, calculator_code: &str) -> Result<serde_json::Value, RegistryError> {
        match calculator_code {
            "imaging" => Ok(json!({
                "filters": serde_json::to_value(&self.parameters.filters)?,
            })),
            _ => Err(RegistryError::UnknownCalculator(calculator_code.to_string())),
        }
    }
}

/// A facility with only the example calculator, for testing a deployment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Generic;

impl Facility for Generic {
    fn code(&self) -> &'static str {
        "generic"
    }

    fn name(&self) -> &'static str {
        "Generic Facility"
    }

    fn calculator_codes(&self) -> &'static [&'static str] {
        &["example"]
    }

    fn calculators(&self) -> Result<CalculatorRegistry, RegistryError> {
        let mut registry = CalculatorRegistry::new();
        registry.register(Box::new(ExampleCalculator::new()))?;
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use propcalc_core::values;

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = CalculatorRegistry::new();
        registry.register(Box::new(ExampleCalculator::new())).unwrap();
        assert!(matches!(
            registry.register(Box::new(ExampleCalculator::new())),
            Err(RegistryError::DuplicateCode(code)) if code == "example"
        ));
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.get("heterodyne"),
            Err(RegistryError::UnknownCalculator(_))
        ));
    }

    #[test]
    fn test_jcmt_calculators() {
        let registry = Jcmt::default().calculators().unwrap();
        assert_eq!(registry.codes().collect::<Vec<_>>(), ["heterodyne", "scuba2"]);

        let heterodyne = registry.get("heterodyne").unwrap();
        let result = heterodyne
            .calculate(1, &heterodyne.default_input(1).unwrap())
            .unwrap();
        assert!(result.output.float("t").unwrap() > 0.0);
    }

    #[test]
    fn test_jcmt_view_context() {
        let jcmt = Jcmt::default();
        let context = jcmt.view_context("heterodyne").unwrap();

        let catalog: serde_json::Value =
            serde_json::from_str(context["line_catalog"].as_str().unwrap()).unwrap();
        assert_eq!(catalog["CO"]["3 - 2"], json!(345.79599));
        assert_eq!(context["receivers"][0]["code"], json!("HARP"));
        assert_eq!(context["receivers"][0]["array"], json!(true));

        assert_eq!(
            jcmt.view_context("scuba2").unwrap()["map_modes"][0]["code"],
            json!("daisy")
        );
        assert!(jcmt.view_context("imaging").is_err());
    }

    #[test]
    fn test_jcmt_parameters_from_toml() {
        let parameters = JcmtParameters::from_toml_str(
            r#"
            [heterodyne]
            t_atm = 250.0

            [scuba2]
            nefd_850 = 200.0
            "#,
        )
        .unwrap();
        assert_eq!(parameters.heterodyne.t_atm, 250.0);
        assert_eq!(parameters.heterodyne.receivers.len(), 4);
        assert_eq!(parameters.scuba2.nefd_850, 200.0);

        assert!(matches!(
            JcmtParameters::from_toml_str("heterodyne = 3"),
            Err(RegistryError::Config(_))
        ));
    }

    #[test]
    fn test_generic_facility() {
        let generic = Generic;
        let registry = generic.calculators().unwrap();
        let example = registry.get("example").unwrap();
        let result = example.calculate(1, &values! { "a" => 1.0, "b" => 2.0 }).unwrap();
        assert_eq!(result.output, values! { "sum" => 3000.0 });
        assert_eq!(generic.view_context("example").unwrap(), json!({}));
        assert!(generic.view_context("scuba2").is_err());
    }

    #[test]
    fn test_calculator_codes_match_registry() {
        let facilities: [Box<dyn Facility>; 3] =
            [Box::new(Jcmt::default()), Box::new(Ukirt::default()), Box::new(Generic)];
        for facility in facilities {
            let registry = facility.calculators().unwrap();
            assert_eq!(
                registry.codes().collect::<Vec<_>>(),
                facility.calculator_codes(),
                "{}",
                facility.code()
            );
        }
    }

    #[test]
    fn test_ukirt_facility() {
        let ukirt = Ukirt::default();
        assert_eq!(ukirt.calculators().unwrap().len(), 1);
        assert_eq!(ukirt.view_context("imaging").unwrap()["filters"][4]["code"], json!("K"));
    }
}
