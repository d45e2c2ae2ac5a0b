//! CPU topology model and coordinate addressing
//!
//! A [`Topology`] fixes the socket / core / thread geometry for the life of
//! the process and defines the bijection between `(socket, core, thread)`
//! coordinates and flat logical-unit indices, which is also the device-file
//! numbering under `/dev/cpu`. Units are laid out socket-major:
//! all of socket 0's cores (each core's threads adjacent), then socket 1's,
//! and so on.

use crate::common::affinity::AffinityGuard;
use crate::common::cpuid;
use crate::error::{Result, ThermflowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    sockets: usize,
    cores_per_socket: usize,
    threads_per_core: usize,
}

impl Topology {
    pub fn new(sockets: usize, cores_per_socket: usize, threads_per_core: usize) -> Result<Self> {
        if sockets == 0 || cores_per_socket == 0 || threads_per_core == 0 {
            return Err(ThermflowError::TopologyError(format!(
                "degenerate topology: {sockets} sockets x {cores_per_socket} cores x {threads_per_core} threads"
            )));
        }
        Ok(Self {
            sockets,
            cores_per_socket,
            threads_per_core,
        })
    }

    /// Probe the running machine.
    ///
    /// Thread and core counts come from the extended topology CPUID leaf,
    /// executed pinned to CPU 0 so the answers describe one known package;
    /// the socket count falls out of the configured processor total.
    pub fn detect() -> Result<Self> {
        let _pin = AffinityGuard::pin(0)?;

        let threads_per_core = cpuid::threads_per_core();
        let logical_per_package = cpuid::logical_per_package().ok_or_else(|| {
            ThermflowError::TopologyError(
                "CPUID leaf 0xB reports no package level; pass the topology explicitly".into(),
            )
        })?;

        let total = configured_cpus()?;
        if total % logical_per_package != 0 {
            return Err(ThermflowError::TopologyError(format!(
                "{total} logical CPUs not divisible by {logical_per_package} per package"
            )));
        }

        let topology = Self::new(
            total / logical_per_package,
            logical_per_package / threads_per_core,
            threads_per_core,
        )?;

        if let Some(online) = online_cpus() {
            if online.len() != topology.total_units() {
                tracing::warn!(
                    "{} CPUs online but topology describes {}; offline or isolated CPUs \
                     will fail device discovery",
                    online.len(),
                    topology.total_units()
                );
            }
        }

        tracing::info!(
            "Detected topology: {} socket(s) x {} core(s) x {} thread(s) = {} unit(s)",
            topology.sockets,
            topology.cores_per_socket,
            topology.threads_per_core,
            topology.total_units()
        );

        Ok(topology)
    }

    pub fn sockets(&self) -> usize {
        self.sockets
    }

    pub fn cores_per_socket(&self) -> usize {
        self.cores_per_socket
    }

    pub fn threads_per_core(&self) -> usize {
        self.threads_per_core
    }

    pub fn threads_per_socket(&self) -> usize {
        self.cores_per_socket * self.threads_per_core
    }

    pub fn total_cores(&self) -> usize {
        self.sockets * self.cores_per_socket
    }

    pub fn total_units(&self) -> usize {
        self.sockets * self.threads_per_socket()
    }

    /// Flat logical-unit index of a coordinate triple.
    ///
    /// Out-of-range coordinates are a caller bug, not a runtime condition,
    /// and panic with the offending value.
    pub fn unit_of(&self, socket: usize, core: usize, thread: usize) -> usize {
        assert!(
            socket < self.sockets,
            "socket {socket} out of range (topology has {})",
            self.sockets
        );
        assert!(
            core < self.cores_per_socket,
            "core {core} out of range (topology has {} per socket)",
            self.cores_per_socket
        );
        assert!(
            thread < self.threads_per_core,
            "thread {thread} out of range (topology has {} per core)",
            self.threads_per_core
        );
        (socket * self.cores_per_socket + core) * self.threads_per_core + thread
    }

    /// Inverse of [`Topology::unit_of`].
    pub fn coord_of(&self, unit: usize) -> (usize, usize, usize) {
        assert!(
            unit < self.total_units(),
            "unit {unit} out of range (topology has {})",
            self.total_units()
        );
        let thread = unit % self.threads_per_core;
        let core = (unit / self.threads_per_core) % self.cores_per_socket;
        let socket = unit / self.threads_per_socket();
        (socket, core, thread)
    }

    /// Unit indices of one representative (first thread of the first core)
    /// per socket, ascending.
    pub fn socket_representatives(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.total_units()).step_by(self.threads_per_socket())
    }

    /// Unit indices of one representative (thread 0) per core, ascending.
    pub fn core_representatives(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.total_units()).step_by(self.threads_per_core)
    }

    /// Every unit index, ascending.
    pub fn all_units(&self) -> impl Iterator<Item = usize> {
        0..self.total_units()
    }
}

fn configured_cpus() -> Result<usize> {
    // The configured count includes offline CPUs, matching the device-file
    // numbering, which is what the registry cares about.
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_CONF) };
    if n <= 0 {
        return Err(ThermflowError::TopologyError(
            "sysconf(_SC_NPROCESSORS_CONF) failed".into(),
        ));
    }
    Ok(n as usize)
}

/// Parse `/sys/devices/system/cpu/online` ("0-3,8-11" style) if readable.
fn online_cpus() -> Option<Vec<usize>> {
    let s = std::fs::read_to_string("/sys/devices/system/cpu/online").ok()?;
    parse_cpu_list(&s)
}

fn parse_cpu_list(s: &str) -> Option<Vec<usize>> {
    let mut cpus = Vec::new();
    for part in s.trim().split(',') {
        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start.parse().ok()?;
            let end: usize = end.parse().ok()?;
            cpus.extend(start..=end);
        } else {
            cpus.push(part.parse().ok()?);
        }
    }
    Some(cpus)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_socket_ht() -> Topology {
        Topology::new(2, 8, 2).unwrap()
    }

    #[test]
    fn test_unit_layout_is_socket_major() {
        let t = two_socket_ht();
        assert_eq!(t.unit_of(0, 0, 0), 0);
        assert_eq!(t.unit_of(0, 0, 1), 1);
        assert_eq!(t.unit_of(0, 1, 0), 2);
        assert_eq!(t.unit_of(1, 0, 0), 16);
        assert_eq!(t.unit_of(1, 7, 1), 31);
    }

    #[test]
    fn test_coordinate_bijection() {
        let t = two_socket_ht();
        for socket in 0..2 {
            for core in 0..8 {
                for thread in 0..2 {
                    let unit = t.unit_of(socket, core, thread);
                    assert_eq!(t.coord_of(unit), (socket, core, thread));
                }
            }
        }
        for unit in 0..t.total_units() {
            let (s, c, th) = t.coord_of(unit);
            assert_eq!(t.unit_of(s, c, th), unit);
        }
    }

    #[test]
    #[should_panic(expected = "core 8 out of range")]
    fn test_out_of_range_core_panics() {
        two_socket_ht().unit_of(0, 8, 0);
    }

    #[test]
    #[should_panic(expected = "unit 32 out of range")]
    fn test_out_of_range_unit_panics() {
        two_socket_ht().coord_of(32);
    }

    #[test]
    fn test_representative_strides() {
        let t = two_socket_ht();
        assert_eq!(t.socket_representatives().collect::<Vec<_>>(), [0, 16]);
        assert_eq!(
            t.core_representatives().collect::<Vec<_>>(),
            [0, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 22, 24, 26, 28, 30]
        );
        assert_eq!(t.all_units().count(), 32);
    }

    #[test]
    fn test_degenerate_topology_rejected() {
        assert!(Topology::new(0, 8, 2).is_err());
        assert!(Topology::new(2, 8, 0).is_err());
    }

    #[test]
    fn test_parse_cpu_list() {
        assert_eq!(parse_cpu_list("0-3,8-11").unwrap().len(), 8);
        assert_eq!(parse_cpu_list("0\n").unwrap(), [0]);
        assert!(parse_cpu_list("0-x").is_none());
    }
}
