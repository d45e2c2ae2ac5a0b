pub mod common;
pub mod error;
pub mod sampler;
pub mod sensors;

pub use common::{MsrRegistry, Topology};
pub use error::{Result, ThermflowError};
pub use sampler::{Sampler, SamplerConfig};
pub use sensors::{RaplSensor, ThermalSensor};
