//! RAPL energy readout per socket
//!
//! Reads the package and DRAM energy-status counters and converts them to
//! joules with the per-socket unit register. Power is derived from the
//! counter delta across the sampling interval.

use std::sync::Arc;
use std::time::Duration;

use thermflow_raw::rapl::{msr, EnergyStatus, RaplPowerUnit};
use thermflow_raw::RegisterLayout;

use crate::common::msr::MsrRegistry;
use crate::error::Result;

// Energy counters are 32 bits and wrap; deltas are corrected by one full
// counter period when they go negative.
const COUNTER_PERIOD: f64 = u32::MAX as f64 + 1.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct RaplReading {
    pub package_joules: f64,
    pub dram_joules: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RaplPower {
    pub package_watts: f64,
    pub dram_watts: f64,
}

pub struct RaplSensor {
    registry: Arc<MsrRegistry>,
    units: Vec<RaplPowerUnit>,
    last: Vec<RaplReading>,
}

impl RaplSensor {
    pub fn new(registry: Arc<MsrRegistry>) -> Result<Self> {
        let units: Vec<RaplPowerUnit> = registry
            .read_all_sockets(RaplPowerUnit::ADDRESS)?
            .into_iter()
            .map(RaplPowerUnit::decode)
            .collect();

        for (socket, unit) in units.iter().enumerate() {
            tracing::debug!(
                "socket {socket}: energy unit {} ({} J/LSB)",
                unit.energy_units,
                unit.energy_unit_multiplier()
            );
        }

        let mut sensor = Self {
            registry,
            units,
            last: Vec::new(),
        };
        sensor.last = sensor.read_energy()?;
        Ok(sensor)
    }

    /// Current cumulative energy per socket, in joules.
    pub fn read_energy(&self) -> Result<Vec<RaplReading>> {
        let pkg = self.registry.read_all_sockets(msr::MSR_PKG_ENERGY_STATUS)?;
        let dram = self.registry.read_all_sockets(msr::MSR_DRAM_ENERGY_STATUS)?;

        Ok(pkg
            .into_iter()
            .zip(dram)
            .zip(&self.units)
            .map(|((pkg_raw, dram_raw), unit)| RaplReading {
                package_joules: EnergyStatus::decode(pkg_raw).joules(unit),
                dram_joules: EnergyStatus::decode(dram_raw).joules(unit),
            })
            .collect())
    }

    /// Average power per socket since the previous call, in watts.
    pub fn socket_power(&mut self, interval: Duration) -> Result<Vec<RaplPower>> {
        let current = self.read_energy()?;
        let seconds = interval.as_secs_f64().max(f64::EPSILON);

        let power = current
            .iter()
            .zip(&self.last)
            .zip(&self.units)
            .map(|((now, last), unit)| RaplPower {
                package_watts: delta_joules(now.package_joules, last.package_joules, unit)
                    / seconds,
                dram_watts: delta_joules(now.dram_joules, last.dram_joules, unit) / seconds,
            })
            .collect();

        self.last = current;
        Ok(power)
    }

    pub fn label(&self) -> String {
        (0..self.units.len())
            .map(|socket| format!("pkg_W_{socket:02} dram_W_{socket:02}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn values(&mut self, interval: Duration) -> Result<String> {
        Ok(self
            .socket_power(interval)?
            .iter()
            .map(|p| format!("{:.4} {:.4}", p.package_watts, p.dram_watts))
            .collect::<Vec<_>>()
            .join(" "))
    }
}

fn delta_joules(now: f64, last: f64, unit: &RaplPowerUnit) -> f64 {
    let mut delta = now - last;
    if delta < 0.0 {
        delta += COUNTER_PERIOD * unit.energy_unit_multiplier();
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_handles_counter_wrap() {
        let unit = RaplPowerUnit {
            energy_units: 14,
            ..Default::default()
        };

        let d = delta_joules(10.0, 4.0, &unit);
        assert!((d - 6.0).abs() < 1e-9);

        // Counter wrapped between samples: 2^32 LSBs at 2^-14 J each.
        let d = delta_joules(1.0, 2.0, &unit);
        assert!((d - (COUNTER_PERIOD / 16384.0 - 1.0)).abs() < 1e-6);
    }
}
