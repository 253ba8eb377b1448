pub mod example;
pub mod heterodyne;
pub mod jcmt;
pub mod scuba2;
pub mod ukirt;

pub use example::ExampleCalculator;
pub use heterodyne::HeterodyneCalculator;
pub use scuba2::Scuba2Calculator;
pub use ukirt::ImagingCalculator;
