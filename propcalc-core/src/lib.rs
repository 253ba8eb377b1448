pub mod calculator;
pub mod duration;
pub mod parse;
pub mod result;
pub mod sectioned_list;
pub mod units;
pub mod value;

pub mod errors;

pub use calculator::Calculator;
pub use errors::{CalcError, CalcResult};
pub use result::{Calculation, CalculatorResult};
pub use sectioned_list::{SectionSelector, SectionedList};
pub use value::{CalculatorMode, CalculatorValue, FieldFormat, Mode, Value, Values};
