use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
use nix::unistd::Pid;

use crate::error::{Result, ThermflowError};

/// Pins the calling thread to one CPU for its lifetime, restoring the
/// previous affinity mask on drop. CPUID results are specific to the CPU
/// executing the instruction, so topology probing runs under this guard.
pub struct AffinityGuard {
    saved: CpuSet,
}

impl AffinityGuard {
    pub fn pin(cpu: usize) -> Result<Self> {
        let saved = sched_getaffinity(Pid::from_raw(0))
            .map_err(|e| ThermflowError::AffinityError(format!("failed to get affinity: {e}")))?;

        let mut target = CpuSet::new();
        target.set(cpu).map_err(|e| {
            ThermflowError::AffinityError(format!("CPU {cpu} not representable in cpu_set_t: {e}"))
        })?;

        sched_setaffinity(Pid::from_raw(0), &target).map_err(|e| {
            ThermflowError::AffinityError(format!("failed to pin to CPU {cpu}: {e}"))
        })?;

        Ok(Self { saved })
    }
}

impl Drop for AffinityGuard {
    fn drop(&mut self) {
        let _ = sched_setaffinity(Pid::from_raw(0), &self.saved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_restores_affinity() {
        let before = sched_getaffinity(Pid::from_raw(0)).unwrap();
        {
            // CPU 0 exists on any machine this runs on.
            let _guard = AffinityGuard::pin(0).unwrap();
        }
        let after = sched_getaffinity(Pid::from_raw(0)).unwrap();
        for cpu in 0..CpuSet::count() {
            assert_eq!(before.is_set(cpu).unwrap(), after.is_set(cpu).unwrap());
        }
    }
}
