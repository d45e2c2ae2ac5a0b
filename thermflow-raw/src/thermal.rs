//! Thermal status and interrupt register definitions
//!
//! Layouts follow the architectural (IA32_*) thermal registers, which exist
//! at two scopes: per core (`IA32_THERM_STATUS` / `IA32_THERM_INTERRUPT`)
//! and per package (`IA32_PACKAGE_THERM_STATUS` /
//! `IA32_PACKAGE_THERM_INTERRUPT`), plus the read-only
//! `MSR_TEMPERATURE_TARGET` holding the TCC activation temperature.
//!
//! Temperature readouts and thresholds are encoded *relative to* the TCC
//! activation temperature: a readout of 0 means the core is at the
//! activation temperature, a readout of 1 means one degree below it, and so
//! on. Absolute degrees Celsius are `temp_target - readout`.
//!
//! The `*_log` bits are sticky: hardware sets them when the corresponding
//! event occurs and only software can clear them, by writing 0. They are
//! the only writable fields of the status registers; everything else in
//! those registers is hardware-owned.
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual,
//!   Volume 3B, Chapter 14: Thermal Monitoring and Protection

use crate::bitfield::{self, extract, flag, overlay, overlay_flag, Field};
use crate::register::{RegisterLayout, RegisterScope};

/// MSR addresses for the thermal registers
pub mod msr {
    /// Core-scope thermal status (digital sensor readout and event log)
    pub const IA32_THERM_STATUS: u64 = 0x19C;

    /// Core-scope thermal interrupt enables and thresholds
    pub const IA32_THERM_INTERRUPT: u64 = 0x19B;

    /// Package-scope thermal status
    pub const IA32_PACKAGE_THERM_STATUS: u64 = 0x1B1;

    /// Package-scope thermal interrupt enables and thresholds
    pub const IA32_PACKAGE_THERM_INTERRUPT: u64 = 0x1B2;

    /// TCC activation temperature, read-only
    pub const MSR_TEMPERATURE_TARGET: u64 = 0x1A2;
}

mod core_status {
    use super::Field;

    pub const STATUS: Field = Field::ro("status", 0, 0);
    pub const STATUS_LOG: Field = Field::rw("status_log", 1, 1);
    pub const PROCHOT_OR_FORCEPR_EVENT: Field = Field::ro("prochot_or_forcepr_event", 2, 2);
    pub const PROCHOT_OR_FORCEPR_LOG: Field = Field::rw("prochot_or_forcepr_log", 3, 3);
    pub const CRIT_TEMP_STATUS: Field = Field::ro("crit_temp_status", 4, 4);
    pub const CRIT_TEMP_LOG: Field = Field::rw("crit_temp_log", 5, 5);
    pub const THRESH1_STATUS: Field = Field::ro("therm_thresh1_status", 6, 6);
    pub const THRESH1_LOG: Field = Field::rw("therm_thresh1_log", 7, 7);
    pub const THRESH2_STATUS: Field = Field::ro("therm_thresh2_status", 8, 8);
    pub const THRESH2_LOG: Field = Field::rw("therm_thresh2_log", 9, 9);
    pub const POWER_LIMIT_STATUS: Field = Field::ro("power_limit_status", 10, 10);
    pub const POWER_NOTIFICATION_LOG: Field = Field::rw("power_notification_log", 11, 11);
    pub const READOUT: Field = Field::ro("readout", 22, 16);
    pub const RESOLUTION: Field = Field::ro("resolution_deg_celsius", 30, 27);
    pub const READOUT_VALID: Field = Field::ro("readout_valid", 31, 31);
}

/// IA32_THERM_STATUS layout (core scope)
///
/// ## Register Format
///
/// | Bits  | Field                    | Access | Description                           |
/// |-------|--------------------------|--------|---------------------------------------|
/// | 0     | status                   | RO     | PROCHOT# output currently active      |
/// | 1     | status_log               | R/W0C  | PROCHOT# asserted since last clear    |
/// | 2     | prochot_or_forcepr_event | RO     | External PROCHOT#/FORCEPR# asserted   |
/// | 3     | prochot_or_forcepr_log   | R/W0C  | Sticky log of bit 2                   |
/// | 4     | crit_temp_status         | RO     | Critical-temperature detector active  |
/// | 5     | crit_temp_log            | R/W0C  | Sticky log of bit 4                   |
/// | 6     | therm_thresh1_status     | RO     | Temperature >= threshold #1           |
/// | 7     | therm_thresh1_log        | R/W0C  | Sticky log of bit 6                   |
/// | 8     | therm_thresh2_status     | RO     | Temperature >= threshold #2           |
/// | 9     | therm_thresh2_log        | R/W0C  | Sticky log of bit 8                   |
/// | 10    | power_limit_status       | RO     | Below OS-requested P-state            |
/// | 11    | power_notification_log   | R/W0C  | Sticky log of bit 10                  |
/// | 22-16 | readout                  | RO     | Degrees below TCC activation temp     |
/// | 30-27 | resolution_deg_celsius   | RO     | Sensor resolution in degrees          |
/// | 31    | readout_valid            | RO     | Readout field is valid                |
///
/// `power_limit_status` and `power_notification_log` are architecturally
/// meaningful only when CPUID.06H:EAX[4] is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreThermStatus {
    pub status: bool,
    pub status_log: bool,
    pub prochot_or_forcepr_event: bool,
    pub prochot_or_forcepr_log: bool,
    pub crit_temp_status: bool,
    pub crit_temp_log: bool,
    pub thresh1_status: bool,
    pub thresh1_log: bool,
    pub thresh2_status: bool,
    pub thresh2_log: bool,
    pub power_limit_status: bool,
    pub power_notification_log: bool,

    /// Digital readout, degrees Celsius below the TCC activation
    /// temperature. Lower values are hotter.
    pub readout: u8,

    /// Sensor resolution (tolerance) in degrees Celsius.
    pub resolution_deg_celsius: u8,

    pub readout_valid: bool,
}

impl RegisterLayout for CoreThermStatus {
    const ADDRESS: u64 = msr::IA32_THERM_STATUS;
    const SCOPE: RegisterScope = RegisterScope::Core;

    fn decode(raw: u64) -> Self {
        use core_status::*;
        Self {
            status: flag(raw, STATUS),
            status_log: flag(raw, STATUS_LOG),
            prochot_or_forcepr_event: flag(raw, PROCHOT_OR_FORCEPR_EVENT),
            prochot_or_forcepr_log: flag(raw, PROCHOT_OR_FORCEPR_LOG),
            crit_temp_status: flag(raw, CRIT_TEMP_STATUS),
            crit_temp_log: flag(raw, CRIT_TEMP_LOG),
            thresh1_status: flag(raw, THRESH1_STATUS),
            thresh1_log: flag(raw, THRESH1_LOG),
            thresh2_status: flag(raw, THRESH2_STATUS),
            thresh2_log: flag(raw, THRESH2_LOG),
            power_limit_status: flag(raw, POWER_LIMIT_STATUS),
            power_notification_log: flag(raw, POWER_NOTIFICATION_LOG),
            readout: extract(raw, READOUT) as u8,
            resolution_deg_celsius: extract(raw, RESOLUTION) as u8,
            readout_valid: flag(raw, READOUT_VALID),
        }
    }

    fn apply(&self, current: u64) -> bitfield::Result<u64> {
        use core_status::*;
        let mut raw = current;
        raw = overlay_flag(raw, STATUS_LOG, self.status_log)?;
        raw = overlay_flag(raw, PROCHOT_OR_FORCEPR_LOG, self.prochot_or_forcepr_log)?;
        raw = overlay_flag(raw, CRIT_TEMP_LOG, self.crit_temp_log)?;
        raw = overlay_flag(raw, THRESH1_LOG, self.thresh1_log)?;
        raw = overlay_flag(raw, THRESH2_LOG, self.thresh2_log)?;
        raw = overlay_flag(raw, POWER_NOTIFICATION_LOG, self.power_notification_log)?;
        Ok(raw)
    }
}

mod core_interrupt {
    use super::Field;

    pub const HIGH_TEMP_ENABLE: Field = Field::rw("high_temp_enable", 0, 0);
    pub const LOW_TEMP_ENABLE: Field = Field::rw("low_temp_enable", 1, 1);
    pub const PROCHOT_ENABLE: Field = Field::rw("prochot_enable", 2, 2);
    pub const FORCEPR_ENABLE: Field = Field::rw("forcepr_enable", 3, 3);
    pub const CRIT_TEMP_ENABLE: Field = Field::rw("crit_temp_enable", 4, 4);
    pub const THRESH1_VAL: Field = Field::rw("thresh1_val", 14, 8);
    pub const THRESH1_ENABLE: Field = Field::rw("thresh1_enable", 15, 15);
    pub const THRESH2_VAL: Field = Field::rw("thresh2_val", 22, 16);
    pub const THRESH2_ENABLE: Field = Field::rw("thresh2_enable", 23, 23);
    pub const POWER_LIMIT_NOTIFICATION_ENABLE: Field =
        Field::rw("pwr_limit_notification_enable", 24, 24);
}

/// IA32_THERM_INTERRUPT layout (core scope)
///
/// Interrupt-enable bits for the thermal events tracked by
/// [`CoreThermStatus`], plus the two programmable temperature thresholds.
/// Threshold values use the same relative encoding as the digital readout
/// and are 7 bits wide; [`RegisterLayout::apply`] rejects anything above
/// 127.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreThermInterrupt {
    pub high_temp_enable: bool,
    pub low_temp_enable: bool,
    pub prochot_enable: bool,
    pub forcepr_enable: bool,
    pub crit_temp_enable: bool,

    /// Threshold #1, degrees below TCC activation.
    pub thresh1_val: u8,
    pub thresh1_enable: bool,

    /// Threshold #2, degrees below TCC activation.
    pub thresh2_val: u8,
    pub thresh2_enable: bool,

    /// Meaningful only when CPUID.06H:EAX[4] is set.
    pub power_limit_notification_enable: bool,
}

impl RegisterLayout for CoreThermInterrupt {
    const ADDRESS: u64 = msr::IA32_THERM_INTERRUPT;
    const SCOPE: RegisterScope = RegisterScope::Core;

    fn decode(raw: u64) -> Self {
        use core_interrupt::*;
        Self {
            high_temp_enable: flag(raw, HIGH_TEMP_ENABLE),
            low_temp_enable: flag(raw, LOW_TEMP_ENABLE),
            prochot_enable: flag(raw, PROCHOT_ENABLE),
            forcepr_enable: flag(raw, FORCEPR_ENABLE),
            crit_temp_enable: flag(raw, CRIT_TEMP_ENABLE),
            thresh1_val: extract(raw, THRESH1_VAL) as u8,
            thresh1_enable: flag(raw, THRESH1_ENABLE),
            thresh2_val: extract(raw, THRESH2_VAL) as u8,
            thresh2_enable: flag(raw, THRESH2_ENABLE),
            power_limit_notification_enable: flag(raw, POWER_LIMIT_NOTIFICATION_ENABLE),
        }
    }

    fn apply(&self, current: u64) -> bitfield::Result<u64> {
        use core_interrupt::*;
        let mut raw = current;
        raw = overlay_flag(raw, HIGH_TEMP_ENABLE, self.high_temp_enable)?;
        raw = overlay_flag(raw, LOW_TEMP_ENABLE, self.low_temp_enable)?;
        raw = overlay_flag(raw, PROCHOT_ENABLE, self.prochot_enable)?;
        raw = overlay_flag(raw, FORCEPR_ENABLE, self.forcepr_enable)?;
        raw = overlay_flag(raw, CRIT_TEMP_ENABLE, self.crit_temp_enable)?;
        raw = overlay(raw, THRESH1_VAL, self.thresh1_val as u64)?;
        raw = overlay_flag(raw, THRESH1_ENABLE, self.thresh1_enable)?;
        raw = overlay(raw, THRESH2_VAL, self.thresh2_val as u64)?;
        raw = overlay_flag(raw, THRESH2_ENABLE, self.thresh2_enable)?;
        raw = overlay_flag(
            raw,
            POWER_LIMIT_NOTIFICATION_ENABLE,
            self.power_limit_notification_enable,
        )?;
        Ok(raw)
    }
}

mod pkg_status {
    use super::Field;

    pub const STATUS: Field = Field::ro("status", 0, 0);
    pub const STATUS_LOG: Field = Field::rw("status_log", 1, 1);
    pub const PROCHOT_EVENT: Field = Field::ro("prochot_event", 2, 2);
    pub const PROCHOT_LOG: Field = Field::rw("prochot_log", 3, 3);
    pub const CRIT_TEMP_STATUS: Field = Field::ro("crit_temp_status", 4, 4);
    pub const CRIT_TEMP_LOG: Field = Field::rw("crit_temp_log", 5, 5);
    pub const THRESH1_STATUS: Field = Field::ro("therm_thresh1_status", 6, 6);
    pub const THRESH1_LOG: Field = Field::rw("therm_thresh1_log", 7, 7);
    pub const THRESH2_STATUS: Field = Field::ro("therm_thresh2_status", 8, 8);
    pub const THRESH2_LOG: Field = Field::rw("therm_thresh2_log", 9, 9);
    pub const POWER_LIMIT_STATUS: Field = Field::ro("power_limit_status", 10, 10);
    pub const POWER_NOTIFICATION_LOG: Field = Field::rw("power_notification_log", 11, 11);
    pub const READOUT: Field = Field::ro("readout", 22, 16);
}

/// IA32_PACKAGE_THERM_STATUS layout (package scope)
///
/// Package-level counterpart of [`CoreThermStatus`]. The package register
/// has no resolution or readout-valid fields, and its external-assertion
/// bits track PROCHOT# only. A set `power_limit_status` here may originate
/// from uncore devices; check the per-core register to attribute it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackageThermStatus {
    pub status: bool,
    pub status_log: bool,
    pub prochot_event: bool,
    pub prochot_log: bool,
    pub crit_temp_status: bool,
    pub crit_temp_log: bool,
    pub thresh1_status: bool,
    pub thresh1_log: bool,
    pub thresh2_status: bool,
    pub thresh2_log: bool,
    pub power_limit_status: bool,
    pub power_notification_log: bool,

    /// Package digital readout, degrees below TCC activation.
    pub readout: u8,
}

impl RegisterLayout for PackageThermStatus {
    const ADDRESS: u64 = msr::IA32_PACKAGE_THERM_STATUS;
    const SCOPE: RegisterScope = RegisterScope::Package;

    fn decode(raw: u64) -> Self {
        use pkg_status::*;
        Self {
            status: flag(raw, STATUS),
            status_log: flag(raw, STATUS_LOG),
            prochot_event: flag(raw, PROCHOT_EVENT),
            prochot_log: flag(raw, PROCHOT_LOG),
            crit_temp_status: flag(raw, CRIT_TEMP_STATUS),
            crit_temp_log: flag(raw, CRIT_TEMP_LOG),
            thresh1_status: flag(raw, THRESH1_STATUS),
            thresh1_log: flag(raw, THRESH1_LOG),
            thresh2_status: flag(raw, THRESH2_STATUS),
            thresh2_log: flag(raw, THRESH2_LOG),
            power_limit_status: flag(raw, POWER_LIMIT_STATUS),
            power_notification_log: flag(raw, POWER_NOTIFICATION_LOG),
            readout: extract(raw, READOUT) as u8,
        }
    }

    fn apply(&self, current: u64) -> bitfield::Result<u64> {
        use pkg_status::*;
        let mut raw = current;
        raw = overlay_flag(raw, STATUS_LOG, self.status_log)?;
        raw = overlay_flag(raw, PROCHOT_LOG, self.prochot_log)?;
        raw = overlay_flag(raw, CRIT_TEMP_LOG, self.crit_temp_log)?;
        raw = overlay_flag(raw, THRESH1_LOG, self.thresh1_log)?;
        raw = overlay_flag(raw, THRESH2_LOG, self.thresh2_log)?;
        raw = overlay_flag(raw, POWER_NOTIFICATION_LOG, self.power_notification_log)?;
        Ok(raw)
    }
}

mod pkg_interrupt {
    use super::Field;

    pub const HIGH_TEMP_ENABLE: Field = Field::rw("high_temp_enable", 0, 0);
    pub const LOW_TEMP_ENABLE: Field = Field::rw("low_temp_enable", 1, 1);
    pub const PROCHOT_ENABLE: Field = Field::rw("prochot_enable", 2, 2);
    pub const CRIT_TEMP_ENABLE: Field = Field::rw("crit_temp_enable", 4, 4);
    pub const THRESH1_VAL: Field = Field::rw("thresh1_val", 14, 8);
    pub const THRESH1_ENABLE: Field = Field::rw("thresh1_enable", 15, 15);
    pub const THRESH2_VAL: Field = Field::rw("thresh2_val", 22, 16);
    pub const THRESH2_ENABLE: Field = Field::rw("thresh2_enable", 23, 23);
    pub const POWER_LIMIT_NOTIFICATION_ENABLE: Field =
        Field::rw("pwr_limit_notification_enable", 24, 24);
}

/// IA32_PACKAGE_THERM_INTERRUPT layout (package scope)
///
/// Same shape as [`CoreThermInterrupt`] but without a FORCEPR enable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackageThermInterrupt {
    pub high_temp_enable: bool,
    pub low_temp_enable: bool,
    pub prochot_enable: bool,
    pub crit_temp_enable: bool,
    pub thresh1_val: u8,
    pub thresh1_enable: bool,
    pub thresh2_val: u8,
    pub thresh2_enable: bool,
    pub power_limit_notification_enable: bool,
}

impl RegisterLayout for PackageThermInterrupt {
    const ADDRESS: u64 = msr::IA32_PACKAGE_THERM_INTERRUPT;
    const SCOPE: RegisterScope = RegisterScope::Package;

    fn decode(raw: u64) -> Self {
        use pkg_interrupt::*;
        Self {
            high_temp_enable: flag(raw, HIGH_TEMP_ENABLE),
            low_temp_enable: flag(raw, LOW_TEMP_ENABLE),
            prochot_enable: flag(raw, PROCHOT_ENABLE),
            crit_temp_enable: flag(raw, CRIT_TEMP_ENABLE),
            thresh1_val: extract(raw, THRESH1_VAL) as u8,
            thresh1_enable: flag(raw, THRESH1_ENABLE),
            thresh2_val: extract(raw, THRESH2_VAL) as u8,
            thresh2_enable: flag(raw, THRESH2_ENABLE),
            power_limit_notification_enable: flag(raw, POWER_LIMIT_NOTIFICATION_ENABLE),
        }
    }

    fn apply(&self, current: u64) -> bitfield::Result<u64> {
        use pkg_interrupt::*;
        let mut raw = current;
        raw = overlay_flag(raw, HIGH_TEMP_ENABLE, self.high_temp_enable)?;
        raw = overlay_flag(raw, LOW_TEMP_ENABLE, self.low_temp_enable)?;
        raw = overlay_flag(raw, PROCHOT_ENABLE, self.prochot_enable)?;
        raw = overlay_flag(raw, CRIT_TEMP_ENABLE, self.crit_temp_enable)?;
        raw = overlay(raw, THRESH1_VAL, self.thresh1_val as u64)?;
        raw = overlay_flag(raw, THRESH1_ENABLE, self.thresh1_enable)?;
        raw = overlay(raw, THRESH2_VAL, self.thresh2_val as u64)?;
        raw = overlay_flag(raw, THRESH2_ENABLE, self.thresh2_enable)?;
        raw = overlay_flag(
            raw,
            POWER_LIMIT_NOTIFICATION_ENABLE,
            self.power_limit_notification_enable,
        )?;
        Ok(raw)
    }
}

const TEMP_TARGET: Field = Field::ro("temp_target", 23, 16);

/// MSR_TEMPERATURE_TARGET layout (package scope, read-only)
///
/// The minimum temperature at which PROCHOT# asserts — the TCC activation
/// temperature all relative readouts and thresholds are measured against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemperatureTarget {
    /// TCC activation temperature in degrees Celsius.
    pub temp_target: u8,
}

impl TemperatureTarget {
    /// Absolute temperature for a relative readout or threshold value.
    pub fn degrees_from(&self, relative: u8) -> i16 {
        self.temp_target as i16 - relative as i16
    }
}

impl RegisterLayout for TemperatureTarget {
    const ADDRESS: u64 = msr::MSR_TEMPERATURE_TARGET;
    const SCOPE: RegisterScope = RegisterScope::Package;

    fn decode(raw: u64) -> Self {
        Self {
            temp_target: extract(raw, TEMP_TARGET) as u8,
        }
    }

    // The whole register is hardware-fixed; there is nothing to write back.
    fn apply(&self, current: u64) -> bitfield::Result<u64> {
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_status_decode_bit22() {
        // Bit 22 is the readout field's top bit, not a flag.
        let s = CoreThermStatus::decode(0x40_0000);
        assert_eq!(s.readout, 64);
        assert_eq!(
            CoreThermStatus {
                readout: 64,
                ..Default::default()
            },
            s
        );
    }

    #[test]
    fn test_core_status_decode_unmodeled_bit() {
        // Bit 23 sits between readout and resolution; no field covers it.
        let s = CoreThermStatus::decode(0x80_0000);
        assert_eq!(s, CoreThermStatus::default());
    }

    #[test]
    fn test_core_status_log_bits_use_own_positions() {
        let base = CoreThermStatus::default();

        let raw = CoreThermStatus {
            status_log: true,
            ..base
        }
        .apply(0)
        .unwrap();
        assert_eq!(raw, 1 << 1);

        let raw = CoreThermStatus {
            prochot_or_forcepr_log: true,
            ..base
        }
        .apply(0)
        .unwrap();
        assert_eq!(raw, 1 << 3);

        let raw = CoreThermStatus {
            power_notification_log: true,
            ..base
        }
        .apply(0)
        .unwrap();
        assert_eq!(raw, 1 << 11);
    }

    #[test]
    fn test_core_status_apply_preserves_hardware_bits() {
        // Readout, resolution, valid bit and the live status bits all
        // belong to hardware; clearing every log bit must not move them.
        let raw = (1 << 31) | (0xA << 27) | (64 << 16) | 0b1111_1111_1111;
        let view = CoreThermStatus {
            status_log: false,
            prochot_or_forcepr_log: false,
            crit_temp_log: false,
            thresh1_log: false,
            thresh2_log: false,
            power_notification_log: false,
            ..CoreThermStatus::decode(raw)
        };
        let out = view.apply(raw).unwrap();
        assert_eq!(out & !0b1010_1010_1010, raw & !0b1010_1010_1010);
        assert_eq!(out & 0b1010_1010_1010, 0);
    }

    #[test]
    fn test_core_status_idempotent_roundtrip() {
        for raw in [0u64, 0x40_0000, 0xFFFF_FFFF, 0x8000_0000_0000_0AAA] {
            let view = CoreThermStatus::decode(raw);
            assert_eq!(view.apply(raw).unwrap(), raw);
        }
    }

    #[test]
    fn test_core_interrupt_roundtrip() {
        let view = CoreThermInterrupt {
            high_temp_enable: true,
            low_temp_enable: false,
            prochot_enable: true,
            forcepr_enable: false,
            crit_temp_enable: true,
            thresh1_val: 20,
            thresh1_enable: true,
            thresh2_val: 33,
            thresh2_enable: false,
            power_limit_notification_enable: true,
        };
        let raw = view.apply(0).unwrap();
        assert_eq!(CoreThermInterrupt::decode(raw), view);

        // Field positions, spot-checked against the documented layout.
        assert_eq!((raw >> 8) & 0x7F, 20);
        assert_eq!((raw >> 16) & 0x7F, 33);
        assert_eq!((raw >> 15) & 1, 1);
        assert_eq!((raw >> 24) & 1, 1);
    }

    #[test]
    fn test_core_interrupt_threshold_width() {
        let view = CoreThermInterrupt {
            thresh1_val: 128,
            ..Default::default()
        };
        assert!(view.apply(0).is_err());

        let view = CoreThermInterrupt {
            thresh2_val: 127,
            ..Default::default()
        };
        assert!(view.apply(0).is_ok());
    }

    #[test]
    fn test_core_interrupt_full_seven_bit_mask() {
        // The threshold overlay must clear all seven bits of the old
        // value, not just the low three.
        let current = CoreThermInterrupt {
            thresh1_val: 0x7F,
            ..Default::default()
        }
        .apply(0)
        .unwrap();

        let updated = CoreThermInterrupt {
            thresh1_val: 0x01,
            ..Default::default()
        }
        .apply(current)
        .unwrap();
        assert_eq!(CoreThermInterrupt::decode(updated).thresh1_val, 0x01);
    }

    #[test]
    fn test_pkg_status_log_bits() {
        let raw = PackageThermStatus {
            prochot_log: true,
            ..Default::default()
        }
        .apply(0)
        .unwrap();
        assert_eq!(raw, 1 << 3);

        let raw = PackageThermStatus {
            thresh2_log: true,
            ..Default::default()
        }
        .apply(0)
        .unwrap();
        assert_eq!(raw, 1 << 9);
    }

    #[test]
    fn test_pkg_status_idempotent_roundtrip() {
        for raw in [0u64, 0x3F_0FFF, 0xFFFF_FFFF_FFFF_FFFF] {
            let view = PackageThermStatus::decode(raw);
            assert_eq!(view.apply(raw).unwrap(), raw);
        }
    }

    #[test]
    fn test_pkg_interrupt_roundtrip() {
        let view = PackageThermInterrupt {
            high_temp_enable: true,
            crit_temp_enable: true,
            thresh1_val: 10,
            thresh1_enable: true,
            thresh2_val: 24,
            thresh2_enable: true,
            power_limit_notification_enable: false,
            ..Default::default()
        };
        let raw = view.apply(0).unwrap();
        assert_eq!(PackageThermInterrupt::decode(raw), view);
    }

    #[test]
    fn test_temp_target_decode() {
        let t = TemperatureTarget::decode(85 << 16);
        assert_eq!(t.temp_target, 85);
        assert_eq!(t.degrees_from(0), 85);
        assert_eq!(t.degrees_from(64), 21);
    }

    #[test]
    fn test_temp_target_apply_is_identity() {
        let raw = 0x0066_1400;
        let t = TemperatureTarget::decode(raw);
        assert_eq!(t.apply(raw).unwrap(), raw);
    }
}
