//! Thermal register access and dump formatting
//!
//! Composes the register layouts from `thermflow_raw::thermal` with the
//! device registry: `get` reads one raw value per unit at the register's
//! scope and decodes it; `set` re-reads the current raw values immediately
//! before writing so the overlay never clobbers bits it does not model.

use std::fmt::Write as _;
use std::sync::Arc;

use thermflow_raw::thermal::{
    CoreThermInterrupt, CoreThermStatus, PackageThermInterrupt, PackageThermStatus,
    TemperatureTarget,
};
use thermflow_raw::{RegisterLayout, RegisterScope};

use crate::common::cpuid::THERMAL_CAPS;
use crate::common::msr::MsrRegistry;
use crate::common::topology::Topology;
use crate::error::{Result, ThermflowError};

pub struct ThermalSensor {
    registry: Arc<MsrRegistry>,
    temp_targets: Vec<TemperatureTarget>,
}

/// One decoded value per unit for each thermal register kind.
#[derive(Debug, Clone)]
pub struct ThermalSnapshot {
    pub core_status: Vec<CoreThermStatus>,
    pub core_interrupt: Vec<CoreThermInterrupt>,
    pub package_status: Vec<PackageThermStatus>,
    pub package_interrupt: Vec<PackageThermInterrupt>,
}

impl ThermalSensor {
    pub fn new(registry: Arc<MsrRegistry>) -> Result<Self> {
        let caps = *THERMAL_CAPS;
        if !caps.digital_sensor {
            return Err(ThermflowError::UnsupportedHardware(
                "no digital thermal sensor (CPUID.06H:EAX[0] clear)".into(),
            ));
        }
        if !caps.package_thermal {
            tracing::warn!(
                "package thermal management not advertised (CPUID.06H:EAX[6] clear); \
                 package-scope register reads may fault"
            );
        }
        if !caps.power_limit_notification {
            tracing::warn!(
                "power-limit notification not advertised (CPUID.06H:EAX[4] clear); \
                 power_limit_status and power_notification_log bits carry no meaning"
            );
        }

        // TCC activation temperatures are fixed per package; cache them
        // once for temperature derivation.
        let temp_targets: Vec<TemperatureTarget> = registry
            .read_scope(TemperatureTarget::SCOPE, TemperatureTarget::ADDRESS)?
            .into_iter()
            .map(TemperatureTarget::decode)
            .collect();

        Ok(Self {
            registry,
            temp_targets,
        })
    }

    fn get<R: RegisterLayout>(&self) -> Result<Vec<R>> {
        Ok(self
            .registry
            .read_scope(R::SCOPE, R::ADDRESS)?
            .into_iter()
            .map(R::decode)
            .collect())
    }

    fn set<R: RegisterLayout>(&self, views: &[R]) -> Result<()> {
        let expected = self.registry.group_count(R::SCOPE);
        if views.len() != expected {
            return Err(ThermflowError::ValueCountMismatch {
                group: scope_group(R::SCOPE),
                expected,
                actual: views.len(),
            });
        }

        let current = self.registry.read_scope(R::SCOPE, R::ADDRESS)?;
        let updated = current
            .iter()
            .zip(views)
            .map(|(&raw, view)| view.apply(raw))
            .collect::<std::result::Result<Vec<u64>, _>>()?;

        self.registry.write_scope_v(R::SCOPE, R::ADDRESS, &updated)
    }

    /// TCC activation temperature of a socket, degrees Celsius.
    pub fn temp_target(&self, socket: usize) -> TemperatureTarget {
        self.temp_targets[socket]
    }

    pub fn core_status(&self) -> Result<Vec<CoreThermStatus>> {
        self.get()
    }

    pub fn core_interrupt(&self) -> Result<Vec<CoreThermInterrupt>> {
        self.get()
    }

    pub fn package_status(&self) -> Result<Vec<PackageThermStatus>> {
        self.get()
    }

    pub fn package_interrupt(&self) -> Result<Vec<PackageThermInterrupt>> {
        self.get()
    }

    /// Write back core thermal status views, one per core. Only the sticky
    /// log bits are writable; pass a decoded view with the bits to clear
    /// set to `false`.
    pub fn set_core_status(&self, views: &[CoreThermStatus]) -> Result<()> {
        self.set(views)
    }

    pub fn set_core_interrupt(&self, views: &[CoreThermInterrupt]) -> Result<()> {
        self.set(views)
    }

    pub fn set_package_status(&self, views: &[PackageThermStatus]) -> Result<()> {
        self.set(views)
    }

    pub fn set_package_interrupt(&self, views: &[PackageThermInterrupt]) -> Result<()> {
        self.set(views)
    }

    pub fn snapshot(&self) -> Result<ThermalSnapshot> {
        Ok(ThermalSnapshot {
            core_status: self.core_status()?,
            core_interrupt: self.core_interrupt()?,
            package_status: self.package_status()?,
            package_interrupt: self.package_interrupt()?,
        })
    }

    pub fn terse_label(&self) -> String {
        terse_label(self.registry.topology())
    }

    pub fn terse_values(&self) -> Result<String> {
        let status = self.core_status()?;
        Ok(terse_values(
            self.registry.topology(),
            &self.temp_targets,
            &status,
        ))
    }

    pub fn verbose_label(&self) -> String {
        verbose_label(self.registry.topology())
    }

    pub fn verbose_values(&self) -> Result<String> {
        let snapshot = self.snapshot()?;
        Ok(verbose_values(
            self.registry.topology(),
            &self.temp_targets,
            &snapshot,
        ))
    }
}

fn scope_group(scope: RegisterScope) -> &'static str {
    match scope {
        RegisterScope::Thread => "thread",
        RegisterScope::Core => "core",
        RegisterScope::Package => "socket",
    }
}

/// Label line for the terse dump: one absolute core temperature per core,
/// cores numbered globally as `socket_core`.
pub fn terse_label(topology: &Topology) -> String {
    let mut out = String::new();
    for socket in 0..topology.sockets() {
        for core in global_cores(topology, socket) {
            write!(out, "TempC_{socket:02}_{core:02} ").unwrap();
        }
    }
    out.trim_end().to_string()
}

/// Value line matching [`terse_label`].
pub fn terse_values(
    topology: &Topology,
    targets: &[TemperatureTarget],
    status: &[CoreThermStatus],
) -> String {
    let mut out = String::new();
    for socket in 0..topology.sockets() {
        for core in global_cores(topology, socket) {
            let temp = targets[socket].degrees_from(status[core].readout);
            write!(out, "{temp} ").unwrap();
        }
    }
    out.trim_end().to_string()
}

/// Label line for the verbose dump: per socket, the package status and
/// interrupt fields, then per core the core status and interrupt fields.
pub fn verbose_label(topology: &Topology) -> String {
    let mut out = String::new();
    for socket in 0..topology.sockets() {
        for field in PKG_STATUS_FIELDS {
            write!(out, "socket_{field}_{socket:02} ").unwrap();
        }
        for field in PKG_INTERRUPT_FIELDS {
            write!(out, "socket_{field}_{socket:02} ").unwrap();
        }
        for core in global_cores(topology, socket) {
            for field in CORE_STATUS_FIELDS {
                write!(out, "core_{field}_{socket:02}_{core:02} ").unwrap();
            }
            for field in CORE_INTERRUPT_FIELDS {
                write!(out, "core_{field}_{socket:02}_{core:02} ").unwrap();
            }
        }
    }
    out.trim_end().to_string()
}

const PKG_STATUS_FIELDS: [&str; 14] = [
    "status",
    "status_log",
    "PROCHOT_event",
    "PROCHOT_log",
    "crit_temp_status",
    "crit_temp_log",
    "therm_thresh1_status",
    "therm_thresh1_log",
    "therm_thresh2_status",
    "therm_thresh2_log",
    "power_limit_status",
    "power_notification_log",
    "readout",
    "TempC",
];

const PKG_INTERRUPT_FIELDS: [&str; 11] = [
    "high_temp_enable",
    "low_temp_enable",
    "PROCHOT_enable",
    "crit_temp_enable",
    "thresh1_val",
    "thresh1_actual_tempC",
    "thresh1_enable",
    "thresh2_val",
    "thresh2_actual_tempC",
    "thresh2_enable",
    "pwr_limit_notification_enable",
];

const CORE_STATUS_FIELDS: [&str; 16] = [
    "status",
    "status_log",
    "PROCHOT_or_FORCEPR_event",
    "PROCHOT_or_FORCEPR_log",
    "crit_temp_status",
    "crit_temp_log",
    "therm_thresh1_status",
    "therm_thresh1_log",
    "therm_thresh2_status",
    "therm_thresh2_log",
    "power_limit_status",
    "power_notification_log",
    "readout",
    "TempC",
    "resolution_deg_celsius",
    "readout_valid",
];

const CORE_INTERRUPT_FIELDS: [&str; 12] = [
    "high_temp_enable",
    "low_temp_enable",
    "PROCHOT_enable",
    "FORCEPR_enable",
    "crit_temp_enable",
    "thresh1_val",
    "thresh1_actual_tempC",
    "thresh1_enable",
    "thresh2_val",
    "thresh2_actual_tempC",
    "thresh2_enable",
    "pwr_limit_notification_enable",
];

/// Value line matching [`verbose_label`].
pub fn verbose_values(
    topology: &Topology,
    targets: &[TemperatureTarget],
    snapshot: &ThermalSnapshot,
) -> String {
    let b = |v: bool| v as u8;
    let mut out = String::new();

    for socket in 0..topology.sockets() {
        let target = targets[socket];

        let ps = &snapshot.package_status[socket];
        for value in [
            b(ps.status),
            b(ps.status_log),
            b(ps.prochot_event),
            b(ps.prochot_log),
            b(ps.crit_temp_status),
            b(ps.crit_temp_log),
            b(ps.thresh1_status),
            b(ps.thresh1_log),
            b(ps.thresh2_status),
            b(ps.thresh2_log),
            b(ps.power_limit_status),
            b(ps.power_notification_log),
        ] {
            write!(out, "{value} ").unwrap();
        }
        write!(out, "{} {} ", ps.readout, target.degrees_from(ps.readout)).unwrap();

        let pi = &snapshot.package_interrupt[socket];
        write!(
            out,
            "{} {} {} {} {} {} {} {} {} {} {} ",
            b(pi.high_temp_enable),
            b(pi.low_temp_enable),
            b(pi.prochot_enable),
            b(pi.crit_temp_enable),
            pi.thresh1_val,
            target.degrees_from(pi.thresh1_val),
            b(pi.thresh1_enable),
            pi.thresh2_val,
            target.degrees_from(pi.thresh2_val),
            b(pi.thresh2_enable),
            b(pi.power_limit_notification_enable),
        )
        .unwrap();

        for core in global_cores(topology, socket) {
            let cs = &snapshot.core_status[core];
            for value in [
                b(cs.status),
                b(cs.status_log),
                b(cs.prochot_or_forcepr_event),
                b(cs.prochot_or_forcepr_log),
                b(cs.crit_temp_status),
                b(cs.crit_temp_log),
                b(cs.thresh1_status),
                b(cs.thresh1_log),
                b(cs.thresh2_status),
                b(cs.thresh2_log),
                b(cs.power_limit_status),
                b(cs.power_notification_log),
            ] {
                write!(out, "{value} ").unwrap();
            }
            write!(
                out,
                "{} {} {} {} ",
                cs.readout,
                target.degrees_from(cs.readout),
                cs.resolution_deg_celsius,
                b(cs.readout_valid),
            )
            .unwrap();

            let ci = &snapshot.core_interrupt[core];
            write!(
                out,
                "{} {} {} {} {} {} {} {} {} {} {} {} ",
                b(ci.high_temp_enable),
                b(ci.low_temp_enable),
                b(ci.prochot_enable),
                b(ci.forcepr_enable),
                b(ci.crit_temp_enable),
                ci.thresh1_val,
                target.degrees_from(ci.thresh1_val),
                b(ci.thresh1_enable),
                ci.thresh2_val,
                target.degrees_from(ci.thresh2_val),
                b(ci.thresh2_enable),
                b(ci.power_limit_notification_enable),
            )
            .unwrap();
        }
    }

    out.trim_end().to_string()
}

fn global_cores(topology: &Topology, socket: usize) -> std::ops::Range<usize> {
    socket * topology.cores_per_socket()..(socket + 1) * topology.cores_per_socket()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> Topology {
        Topology::new(2, 18, 1).unwrap()
    }

    fn targets() -> Vec<TemperatureTarget> {
        vec![TemperatureTarget { temp_target: 85 }; 2]
    }

    #[test]
    fn test_terse_label_numbering() {
        let label = terse_label(&topology());
        let tokens: Vec<&str> = label.split_whitespace().collect();
        assert_eq!(tokens.len(), 36);
        assert_eq!(tokens[0], "TempC_00_00");
        assert_eq!(tokens[17], "TempC_00_17");
        assert_eq!(tokens[18], "TempC_01_18");
        assert_eq!(tokens[35], "TempC_01_35");
    }

    #[test]
    fn test_terse_values_readout_in_bit22() {
        // Bit 22 lands in the readout field: 64 degrees below activation.
        let status = vec![CoreThermStatus::decode(0x40_0000); 36];
        let line = terse_values(&topology(), &targets(), &status);
        assert_eq!(line.split_whitespace().collect::<Vec<_>>(), ["21"; 36]);
    }

    #[test]
    fn test_terse_values_at_activation_temperature() {
        // A raw value with no modeled bit set reads as zero degrees below
        // the activation temperature on every core.
        let status = vec![CoreThermStatus::decode(0x80_0000); 36];
        let line = terse_values(&topology(), &targets(), &status);
        assert_eq!(line.split_whitespace().collect::<Vec<_>>(), ["85"; 36]);
    }

    #[test]
    fn test_verbose_label_and_values_align() {
        let topology = Topology::new(2, 2, 1).unwrap();
        let targets = vec![TemperatureTarget { temp_target: 90 }; 2];
        let snapshot = ThermalSnapshot {
            core_status: vec![CoreThermStatus::decode(0x8840_0AAA); 4],
            core_interrupt: vec![CoreThermInterrupt::decode(0x101_9914); 4],
            package_status: vec![PackageThermStatus::decode(0x2A_0555); 2],
            package_interrupt: vec![PackageThermInterrupt::decode(0x80_8A01); 2],
        };

        let label = verbose_label(&topology);
        let values = verbose_values(&topology, &targets, &snapshot);
        assert_eq!(
            label.split_whitespace().count(),
            values.split_whitespace().count()
        );

        // Per socket: 14 + 11 package tokens, then 16 + 12 per core.
        assert_eq!(label.split_whitespace().count(), 2 * (25 + 2 * 28));
        assert!(label.starts_with("socket_status_00 "));
    }

    #[test]
    fn test_verbose_values_derive_threshold_temps() {
        let topology = Topology::new(1, 1, 1).unwrap();
        let targets = vec![TemperatureTarget { temp_target: 100 }];
        let interrupt = CoreThermInterrupt {
            thresh1_val: 10,
            thresh2_val: 30,
            ..Default::default()
        };
        let snapshot = ThermalSnapshot {
            core_status: vec![CoreThermStatus::default()],
            core_interrupt: vec![interrupt],
            package_status: vec![PackageThermStatus::default()],
            package_interrupt: vec![PackageThermInterrupt::default()],
        };

        let values = verbose_values(&topology, &targets, &snapshot);
        let tokens: Vec<&str> = values.split_whitespace().collect();
        // Core interrupt tokens start after 25 package + 16 core status.
        assert_eq!(tokens[41 + 5], "10");
        assert_eq!(tokens[41 + 6], "90");
        assert_eq!(tokens[41 + 8], "30");
        assert_eq!(tokens[41 + 9], "70");
    }
}
