pub mod affinity;
pub mod cpuid;
pub mod msr;
pub mod topology;

pub use affinity::AffinityGuard;
pub use cpuid::{ThermalCaps, THERMAL_CAPS};
pub use msr::{DeviceFamily, MsrRegistry};
pub use topology::Topology;
