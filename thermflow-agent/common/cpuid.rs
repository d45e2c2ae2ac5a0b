//! CPUID capability and topology probing
//!
//! Everything the rest of the crate wants to know from CPUID goes through
//! the narrow [`cpuid`] function (leaf + sub-leaf in, four registers out);
//! no other module touches the instruction directly.

use once_cell::sync::Lazy;

#[cfg(target_arch = "x86_64")]
pub fn cpuid(leaf: u32, subleaf: u32) -> (u32, u32, u32, u32) {
    let mut ebx: u32;
    let mut edx: u32;
    let mut eax_out = leaf;
    let mut ecx_out = subleaf;

    // LLVM reserves rbx, so shuffle it through a scratch register.
    unsafe {
        std::arch::asm!(
            "mov {0:r}, rbx",
            "cpuid",
            "xchg {0:r}, rbx",
            out(reg) ebx,
            inout("eax") eax_out,
            inout("ecx") ecx_out,
            out("edx") edx,
            options(nostack, preserves_flags)
        );
    }

    (eax_out, ebx, ecx_out, edx)
}

#[cfg(not(target_arch = "x86_64"))]
pub fn cpuid(_leaf: u32, _subleaf: u32) -> (u32, u32, u32, u32) {
    (0, 0, 0, 0)
}

/// Thermal capabilities reported by CPUID leaf 6
///
/// Register layouts are only trustworthy where the CPU advertises the
/// corresponding feature; callers consult these predicates before relying
/// on a field.
#[derive(Debug, Clone, Copy)]
pub struct ThermalCaps {
    /// CPUID.06H:EAX[0] - digital thermal sensor with interrupt support.
    pub digital_sensor: bool,

    /// CPUID.06H:EAX[4] - power-limit notification; gates the
    /// power_limit_status / power_notification_log bits and their enable.
    pub power_limit_notification: bool,

    /// CPUID.06H:EAX[6] - package thermal management; gates the
    /// IA32_PACKAGE_THERM_* registers.
    pub package_thermal: bool,

    /// CPUID.06H:EBX[3:0] - number of programmable interrupt thresholds.
    pub interrupt_thresholds: u8,
}

pub static THERMAL_CAPS: Lazy<ThermalCaps> = Lazy::new(detect_thermal_caps);

fn detect_thermal_caps() -> ThermalCaps {
    let (eax, ebx, _ecx, _edx) = cpuid(0x6, 0);

    let caps = ThermalCaps {
        digital_sensor: eax & 1 != 0,
        power_limit_notification: eax & (1 << 4) != 0,
        package_thermal: eax & (1 << 6) != 0,
        interrupt_thresholds: (ebx & 0xF) as u8,
    };

    tracing::info!(
        "CPUID leaf 6: digital_sensor={} power_limit_notification={} package_thermal={} thresholds={}",
        caps.digital_sensor,
        caps.power_limit_notification,
        caps.package_thermal,
        caps.interrupt_thresholds
    );

    caps
}

/// Logical CPUs per core, from the extended topology leaf (0xB sub-leaf 0).
/// Returns 1 when the leaf reports nothing useful.
pub fn threads_per_core() -> usize {
    let (_eax, ebx, _ecx, _edx) = cpuid(0xB, 0);
    let threads = (ebx & 0xFFFF) as usize;
    if threads == 0 {
        tracing::warn!("CPUID leaf 0xB reports no SMT level, assuming 1 thread per core");
        1
    } else {
        threads
    }
}

/// Logical CPUs per package, from leaf 0xB sub-leaf 1.
pub fn logical_per_package() -> Option<usize> {
    let (_eax, ebx, _ecx, _edx) = cpuid(0xB, 1);
    let logical = (ebx & 0xFFFF) as usize;
    (logical != 0).then_some(logical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::similar_names)] // CPU register names are standard
    fn test_cpuid_vendor_leaf() {
        let (eax, ebx, ecx, edx) = cpuid(0, 0);
        println!("CPUID(0,0): EAX={eax:08X} EBX={ebx:08X} ECX={ecx:08X} EDX={edx:08X}");
    }

    #[test]
    fn test_threads_per_core_positive() {
        assert!(threads_per_core() >= 1);
    }
}
