//! RAPL (Running Average Power Limit) register definitions
//!
//! Only the energy-accounting side is modeled here: the unit register that
//! scales the counters, and the package/DRAM/PP0 energy status counters
//! the sampler reads. Limit programming (power caps, time windows) is a
//! separate concern and not part of this crate.
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual,
//!   Volume 3B, Section 14.9: Platform Specific Power Management Support

use crate::bitfield::{self, extract, Field};
use crate::register::{RegisterLayout, RegisterScope};

/// MSR addresses for RAPL
pub mod msr {
    /// RAPL Power Unit MSR - Defines energy, power, and time units
    pub const MSR_RAPL_POWER_UNIT: u64 = 0x606;

    /// Package Energy Status - Total package energy consumption
    pub const MSR_PKG_ENERGY_STATUS: u64 = 0x611;

    /// PP0 Energy Status - Core energy consumption
    pub const MSR_PP0_ENERGY_STATUS: u64 = 0x639;

    /// DRAM Energy Status - Memory controller energy consumption
    pub const MSR_DRAM_ENERGY_STATUS: u64 = 0x619;
}

const POWER_UNITS: Field = Field::ro("power_units", 3, 0);
const ENERGY_UNITS: Field = Field::ro("energy_units", 12, 8);
const TIME_UNITS: Field = Field::ro("time_units", 19, 16);

/// RAPL Power Unit Register layout
///
/// Defines the units for energy, power, and time measurements. The whole
/// register is hardware-fixed.
///
/// ## Register Format
///
/// | Bits   | Field        | Description                           |
/// |--------|--------------|---------------------------------------|
/// | 0-3    | power_units  | Power units (1/2^value watts)         |
/// | 8-12   | energy_units | Energy units (1/2^value joules)       |
/// | 16-19  | time_units   | Time units (1/2^value seconds)        |
#[derive(Debug, Clone, Copy, Default)]
pub struct RaplPowerUnit {
    pub power_units: u8,
    pub energy_units: u8,
    pub time_units: u8,
}

impl RegisterLayout for RaplPowerUnit {
    const ADDRESS: u64 = msr::MSR_RAPL_POWER_UNIT;
    const SCOPE: RegisterScope = RegisterScope::Package;

    fn decode(raw: u64) -> Self {
        Self {
            power_units: extract(raw, POWER_UNITS) as u8,
            energy_units: extract(raw, ENERGY_UNITS) as u8,
            time_units: extract(raw, TIME_UNITS) as u8,
        }
    }

    fn apply(&self, current: u64) -> bitfield::Result<u64> {
        Ok(current)
    }
}

impl RaplPowerUnit {
    /// Get power unit multiplier (watts per LSB)
    pub fn power_unit_multiplier(&self) -> f64 {
        1.0 / (1u64 << self.power_units) as f64
    }

    /// Get energy unit multiplier (joules per LSB)
    pub fn energy_unit_multiplier(&self) -> f64 {
        1.0 / (1u64 << self.energy_units) as f64
    }

    /// Get time unit multiplier (seconds per LSB)
    pub fn time_unit_multiplier(&self) -> f64 {
        1.0 / (1u64 << self.time_units) as f64
    }
}

/// Total energy consumed, in energy-status units.
///
/// All three energy-status MSRs (package, DRAM, PP0) share this layout: a
/// free-running 32-bit counter that wraps around, scaled by
/// [`RaplPowerUnit::energy_unit_multiplier`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnergyStatus {
    pub energy: u32,
}

const TOTAL_ENERGY: Field = Field::ro("total_energy_consumed", 31, 0);

impl EnergyStatus {
    pub fn decode(raw: u64) -> Self {
        Self {
            energy: extract(raw, TOTAL_ENERGY) as u32,
        }
    }

    /// Joules represented by this counter value under the given unit.
    pub fn joules(&self, unit: &RaplPowerUnit) -> f64 {
        self.energy as f64 * unit.energy_unit_multiplier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rapl_power_unit_decode() {
        // power=3, energy=14, time=10 packed at their documented offsets.
        let raw = 3 | (14 << 8) | (10 << 16);
        let unit = RaplPowerUnit::decode(raw);
        assert_eq!(unit.power_units, 3);
        assert_eq!(unit.energy_units, 14);
        assert_eq!(unit.time_units, 10);
    }

    #[test]
    fn test_rapl_power_unit_multipliers() {
        let unit = RaplPowerUnit {
            power_units: 3,
            energy_units: 14,
            time_units: 10,
        };

        assert_eq!(unit.power_unit_multiplier(), 1.0 / 8.0);
        assert_eq!(unit.energy_unit_multiplier(), 1.0 / 16384.0);
        assert_eq!(unit.time_unit_multiplier(), 1.0 / 1024.0);
    }

    #[test]
    fn test_energy_status_ignores_upper_half() {
        let status = EnergyStatus::decode(0xFFFF_FFFF_0000_1000);
        assert_eq!(status.energy, 0x1000);

        let unit = RaplPowerUnit {
            energy_units: 14,
            ..Default::default()
        };
        assert!((status.joules(&unit) - 0.25).abs() < 1e-9);
    }
}
