pub mod rapl;
pub mod thermal;

pub use rapl::RaplSensor;
pub use thermal::{ThermalSensor, ThermalSnapshot};
