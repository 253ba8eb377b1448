//! Instrument calculators for telescope time proposals
//!
//! Observers use the calculators to relate the sensitivity they need to the
//! observing time to request.
//!
//! # Crate Organisation
//!
//! - [`propcalc_core`]: the [`Calculator`] trait, the value and schema types
//!   it works with and [`SectionedList`]
//! - [`propcalc_calculators`]: the calculators themselves with their built-in
//!   engines
//! - [`facility`]: grouping of calculators by facility, as a web layer needs
//!   them

pub mod facility;

pub use propcalc_calculators;
pub use propcalc_core;

pub use facility::{CalculatorRegistry, Facility, Generic, Jcmt, JcmtParameters, RegistryError, Ukirt};
pub use propcalc_core::{
    CalcError, CalcResult, Calculation, Calculator, CalculatorMode, CalculatorResult,
    CalculatorValue, SectionedList, Value, Values,
};
