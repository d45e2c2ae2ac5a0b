//! MSR device registry and scalar/vector register I/O
//!
//! One read/write handle per logical CPU, opened once at startup from the
//! first device-file family that qualifies on *every* unit, and held for
//! the life of the registry. MSR addresses are byte offsets into the
//! device files; every transfer is exactly eight bytes via positioned
//! read/write, so handles need no seek state and concurrent readers are
//! safe. Concurrent writers of the same register are not coordinated here:
//! the read-modify-write cycles built on top assume one owning controller
//! per machine.

use std::fs::OpenOptions;
use std::os::unix::fs::{FileExt, PermissionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use thermflow_raw::RegisterScope;

use crate::common::topology::Topology;
use crate::error::{Result, ThermflowError};

const DEFAULT_DEV_ROOT: &str = "/dev/cpu";

/// Device-file families, in probe priority order
///
/// `msr_safe` (the allowlist-filtered device of the msr-safe kernel
/// module) is preferred over the stock `msr` device, which requires
/// CAP_SYS_RAWIO on recent kernels; `msr_dev` is the legacy raw naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFamily {
    MsrSafe,
    Msr,
    MsrDev,
}

impl DeviceFamily {
    pub const PROBE_ORDER: [DeviceFamily; 3] =
        [DeviceFamily::MsrSafe, DeviceFamily::Msr, DeviceFamily::MsrDev];

    pub fn file_name(&self) -> &'static str {
        match self {
            DeviceFamily::MsrSafe => "msr_safe",
            DeviceFamily::Msr => "msr",
            DeviceFamily::MsrDev => "msr_dev",
        }
    }
}

#[derive(Debug)]
struct MsrHandle {
    file: std::fs::File,
    unit: usize,
}

impl MsrHandle {
    fn read(&self, msr: u64) -> Result<u64> {
        let mut buffer = [0u8; 8];
        self.file
            .read_exact_at(&mut buffer, msr)
            .map_err(|e| ThermflowError::ReadFailed {
                unit: self.unit,
                msr,
                fd: self.file.as_raw_fd(),
                source: e,
            })?;

        let value = u64::from_ne_bytes(buffer);
        tracing::trace!(
            "MSR read: unit {} MSR 0x{:08x} = 0x{:016x}",
            self.unit,
            msr,
            value
        );
        Ok(value)
    }

    fn write(&self, msr: u64, value: u64) -> Result<()> {
        self.file
            .write_all_at(&value.to_ne_bytes(), msr)
            .map_err(|e| ThermflowError::WriteFailed {
                unit: self.unit,
                msr,
                fd: self.file.as_raw_fd(),
                source: e,
            })?;

        tracing::trace!(
            "MSR write: unit {} MSR 0x{:08x} = 0x{:016x}",
            self.unit,
            msr,
            value
        );
        Ok(())
    }
}

/// Process-wide table of per-CPU MSR device handles
///
/// Constructing the registry *is* initialization: holders of a value know
/// discovery succeeded on every unit, so there is no separate initialized
/// state to track. Dropping it closes every handle.
#[derive(Debug)]
pub struct MsrRegistry {
    topology: Topology,
    family: DeviceFamily,
    handles: Vec<MsrHandle>,
}

impl MsrRegistry {
    /// Open handles under `/dev/cpu`.
    pub fn open(topology: Topology) -> Result<Self> {
        Self::open_at(Path::new(DEFAULT_DEV_ROOT), topology)
    }

    /// Open handles under an alternate device root. Each candidate family
    /// must supply an existing, owner-read/write, openable device file for
    /// every logical unit or the whole family is skipped; partial
    /// qualification never mixes families across units.
    pub fn open_at(root: &Path, topology: Topology) -> Result<Self> {
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".into());
        tracing::info!(
            "{host}: probing MSR device files for {} unit(s) under {}",
            topology.total_units(),
            root.display()
        );

        for family in DeviceFamily::PROBE_ORDER {
            match Self::try_family(root, &topology, family) {
                Ok(handles) => {
                    tracing::info!(
                        "{host}: using MSR device family \"{}\"",
                        family.file_name()
                    );
                    return Ok(Self {
                        topology,
                        family,
                        handles,
                    });
                }
                Err(reason) => {
                    // Expected during discovery; it only names why this
                    // family lost, not a failure of the registry.
                    tracing::debug!(
                        "MSR device family \"{}\" rejected: {}",
                        family.file_name(),
                        reason
                    );
                }
            }
        }

        Err(ThermflowError::EnvironmentUnavailable(format!(
            "none of msr_safe, msr, msr_dev qualifies on all {} unit(s) under {} \
             (is the msr or msr-safe kernel module loaded, and are the device \
             files readable and writable by this user?)",
            topology.total_units(),
            root.display()
        )))
    }

    fn try_family(
        root: &Path,
        topology: &Topology,
        family: DeviceFamily,
    ) -> std::result::Result<Vec<MsrHandle>, String> {
        let mut handles = Vec::with_capacity(topology.total_units());

        for unit in topology.all_units() {
            let path = Self::device_path(root, unit, family);

            let metadata = std::fs::metadata(&path)
                .map_err(|e| format!("{}: {e}", path.display()))?;
            if metadata.permissions().mode() & 0o600 != 0o600 {
                return Err(format!(
                    "{}: owner read/write permission missing",
                    path.display()
                ));
            }

            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|e| format!("{}: open failed: {e}", path.display()))?;

            handles.push(MsrHandle { file, unit });
        }

        Ok(handles)
    }

    fn device_path(root: &Path, unit: usize, family: DeviceFamily) -> PathBuf {
        root.join(unit.to_string()).join(family.file_name())
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    fn handle(&self, unit: usize) -> &MsrHandle {
        assert!(
            unit < self.handles.len(),
            "logical unit {unit} out of range ({} units)",
            self.handles.len()
        );
        &self.handles[unit]
    }

    /// Read one 64-bit register on one logical unit.
    pub fn read(&self, unit: usize, msr: u64) -> Result<u64> {
        self.handle(unit).read(msr)
    }

    /// Write one 64-bit register on one logical unit.
    pub fn write(&self, unit: usize, msr: u64, value: u64) -> Result<()> {
        self.handle(unit).write(msr, value)
    }

    pub fn read_by_coord(
        &self,
        socket: usize,
        core: usize,
        thread: usize,
        msr: u64,
    ) -> Result<u64> {
        self.read(self.topology.unit_of(socket, core, thread), msr)
    }

    pub fn write_by_coord(
        &self,
        socket: usize,
        core: usize,
        thread: usize,
        msr: u64,
        value: u64,
    ) -> Result<()> {
        self.write(self.topology.unit_of(socket, core, thread), msr, value)
    }

    /// Read a package-scope register once per socket, ascending socket
    /// order, via each socket's first logical unit.
    pub fn read_all_sockets(&self, msr: u64) -> Result<Vec<u64>> {
        self.topology
            .socket_representatives()
            .map(|unit| self.read(unit, msr))
            .collect()
    }

    /// Read a core-scope register once per core (thread 0), ascending.
    pub fn read_all_cores(&self, msr: u64) -> Result<Vec<u64>> {
        self.topology
            .core_representatives()
            .map(|unit| self.read(unit, msr))
            .collect()
    }

    /// Read a thread-scope register on every logical unit, ascending.
    pub fn read_all_threads(&self, msr: u64) -> Result<Vec<u64>> {
        self.topology
            .all_units()
            .map(|unit| self.read(unit, msr))
            .collect()
    }

    /// Broadcast one value to every socket representative.
    pub fn write_all_sockets(&self, msr: u64, value: u64) -> Result<()> {
        for unit in self.topology.socket_representatives() {
            self.write(unit, msr, value)?;
        }
        Ok(())
    }

    /// Broadcast one value to every core representative.
    pub fn write_all_cores(&self, msr: u64, value: u64) -> Result<()> {
        for unit in self.topology.core_representatives() {
            self.write(unit, msr, value)?;
        }
        Ok(())
    }

    /// Broadcast one value to every logical unit.
    pub fn write_all_threads(&self, msr: u64, value: u64) -> Result<()> {
        for unit in self.topology.all_units() {
            self.write(unit, msr, value)?;
        }
        Ok(())
    }

    /// Write one value per socket, in the order [`read_all_sockets`]
    /// returns them.
    ///
    /// [`read_all_sockets`]: MsrRegistry::read_all_sockets
    pub fn write_all_sockets_v(&self, msr: u64, values: &[u64]) -> Result<()> {
        Self::check_len("socket", self.topology.sockets(), values)?;
        for (unit, &value) in self.topology.socket_representatives().zip(values) {
            self.write(unit, msr, value)?;
        }
        Ok(())
    }

    /// Write one value per core, in the order [`read_all_cores`] returns
    /// them.
    ///
    /// [`read_all_cores`]: MsrRegistry::read_all_cores
    pub fn write_all_cores_v(&self, msr: u64, values: &[u64]) -> Result<()> {
        Self::check_len("core", self.topology.total_cores(), values)?;
        for (unit, &value) in self.topology.core_representatives().zip(values) {
            self.write(unit, msr, value)?;
        }
        Ok(())
    }

    /// Write one value per logical unit, ascending unit order.
    pub fn write_all_threads_v(&self, msr: u64, values: &[u64]) -> Result<()> {
        Self::check_len("thread", self.topology.total_units(), values)?;
        for (unit, &value) in self.topology.all_units().zip(values) {
            self.write(unit, msr, value)?;
        }
        Ok(())
    }

    fn check_len(group: &'static str, expected: usize, values: &[u64]) -> Result<()> {
        if values.len() != expected {
            return Err(ThermflowError::ValueCountMismatch {
                group,
                expected,
                actual: values.len(),
            });
        }
        Ok(())
    }

    /// Number of logical values a register of this scope has.
    pub fn group_count(&self, scope: RegisterScope) -> usize {
        match scope {
            RegisterScope::Thread => self.topology.total_units(),
            RegisterScope::Core => self.topology.total_cores(),
            RegisterScope::Package => self.topology.sockets(),
        }
    }

    /// Scope-dispatched batched read.
    pub fn read_scope(&self, scope: RegisterScope, msr: u64) -> Result<Vec<u64>> {
        match scope {
            RegisterScope::Thread => self.read_all_threads(msr),
            RegisterScope::Core => self.read_all_cores(msr),
            RegisterScope::Package => self.read_all_sockets(msr),
        }
    }

    /// Scope-dispatched vector write, same ordering as [`read_scope`].
    ///
    /// [`read_scope`]: MsrRegistry::read_scope
    pub fn write_scope_v(&self, scope: RegisterScope, msr: u64, values: &[u64]) -> Result<()> {
        match scope {
            RegisterScope::Thread => self.write_all_threads_v(msr, values),
            RegisterScope::Core => self.write_all_cores_v(msr, values),
            RegisterScope::Package => self.write_all_sockets_v(msr, values),
        }
    }
}

impl Drop for MsrRegistry {
    fn drop(&mut self) {
        tracing::debug!(
            "Closing {} \"{}\" device handle(s)",
            self.handles.len(),
            self.family.file_name()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Build a fake /dev/cpu tree of regular files; positioned reads and
    /// writes behave the same as on the kernel's device nodes.
    struct FakeDevRoot {
        root: PathBuf,
    }

    impl FakeDevRoot {
        fn new(name: &str) -> Self {
            let root = std::env::temp_dir().join(format!(
                "thermflow-msr-{name}-{}",
                std::process::id()
            ));
            let _ = fs::remove_dir_all(&root);
            fs::create_dir_all(&root).unwrap();
            Self { root }
        }

        fn add_family(&self, topology: &Topology, family: DeviceFamily) {
            for unit in topology.all_units() {
                let dir = self.root.join(unit.to_string());
                fs::create_dir_all(&dir).unwrap();
                fs::write(dir.join(family.file_name()), b"").unwrap();
            }
        }

        fn chmod(&self, unit: usize, family: DeviceFamily, mode: u32) {
            let path = self
                .root
                .join(unit.to_string())
                .join(family.file_name());
            fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        }
    }

    impl Drop for FakeDevRoot {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    fn topology() -> Topology {
        Topology::new(2, 2, 2).unwrap()
    }

    #[test]
    fn test_no_family_is_fatal() {
        let dev = FakeDevRoot::new("empty");
        let err = MsrRegistry::open_at(&dev.root, topology()).unwrap_err();
        assert!(matches!(err, ThermflowError::EnvironmentUnavailable(_)));
    }

    #[test]
    fn test_preferred_family_wins() {
        let dev = FakeDevRoot::new("preferred");
        dev.add_family(&topology(), DeviceFamily::MsrSafe);
        dev.add_family(&topology(), DeviceFamily::Msr);

        let registry = MsrRegistry::open_at(&dev.root, topology()).unwrap();
        assert_eq!(registry.family(), DeviceFamily::MsrSafe);
    }

    #[test]
    fn test_partial_family_falls_through() {
        // msr_safe exists everywhere but one unit lost its write bit;
        // discovery must reject the whole family, not keep N-1 units.
        let dev = FakeDevRoot::new("fallback");
        dev.add_family(&topology(), DeviceFamily::MsrSafe);
        dev.add_family(&topology(), DeviceFamily::Msr);
        dev.chmod(3, DeviceFamily::MsrSafe, 0o400);

        let registry = MsrRegistry::open_at(&dev.root, topology()).unwrap();
        assert_eq!(registry.family(), DeviceFamily::Msr);
    }

    #[test]
    fn test_missing_unit_rejects_family() {
        let dev = FakeDevRoot::new("missing");
        dev.add_family(&topology(), DeviceFamily::Msr);
        fs::remove_file(dev.root.join("5").join("msr")).unwrap();

        let err = MsrRegistry::open_at(&dev.root, topology()).unwrap_err();
        assert!(matches!(err, ThermflowError::EnvironmentUnavailable(_)));
    }

    #[test]
    fn test_write_read_roundtrip_at_offset() {
        let dev = FakeDevRoot::new("roundtrip");
        dev.add_family(&topology(), DeviceFamily::Msr);
        let registry = MsrRegistry::open_at(&dev.root, topology()).unwrap();

        registry.write(3, 0x19C, 0xDEAD_BEEF_CAFE_F00D).unwrap();
        assert_eq!(registry.read(3, 0x19C).unwrap(), 0xDEAD_BEEF_CAFE_F00D);

        // A neighboring offset on the same unit is untouched data.
        registry.write(3, 0x1A2, 85 << 16).unwrap();
        assert_eq!(registry.read(3, 0x19C).unwrap(), 0xDEAD_BEEF_CAFE_F00D);
    }

    #[test]
    fn test_short_read_is_an_error() {
        let dev = FakeDevRoot::new("short");
        dev.add_family(&topology(), DeviceFamily::Msr);
        let registry = MsrRegistry::open_at(&dev.root, topology()).unwrap();

        // Nothing was ever written at this offset; a regular file returns
        // fewer than 8 bytes, which must surface, not silently zero-fill.
        let err = registry.read(0, 0x611).unwrap_err();
        match err {
            ThermflowError::ReadFailed { unit, msr, .. } => {
                assert_eq!(unit, 0);
                assert_eq!(msr, 0x611);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_batched_read_ordering() {
        let dev = FakeDevRoot::new("ordering");
        let topology = topology();
        dev.add_family(&topology, DeviceFamily::Msr);
        let registry = MsrRegistry::open_at(&dev.root, topology).unwrap();

        for unit in topology.all_units() {
            registry.write(unit, 0x19C, unit as u64).unwrap();
        }

        // 2 sockets x 2 cores x 2 threads: core representatives are the
        // even units, socket representatives are units 0 and 4.
        assert_eq!(registry.read_all_sockets(0x19C).unwrap(), [0, 4]);
        assert_eq!(registry.read_all_cores(0x19C).unwrap(), [0, 2, 4, 6]);
        assert_eq!(
            registry.read_all_threads(0x19C).unwrap(),
            [0, 1, 2, 3, 4, 5, 6, 7]
        );
    }

    #[test]
    fn test_vector_write_matches_read_ordering() {
        let dev = FakeDevRoot::new("vector");
        let topology = topology();
        dev.add_family(&topology, DeviceFamily::Msr);
        let registry = MsrRegistry::open_at(&dev.root, topology).unwrap();

        registry
            .write_all_cores_v(0x19B, &[10, 11, 12, 13])
            .unwrap();
        assert_eq!(registry.read_all_cores(0x19B).unwrap(), [10, 11, 12, 13]);

        // Representatives only: thread 1 of core 0 was never written.
        assert!(registry.read(1, 0x19B).is_err());
    }

    #[test]
    fn test_vector_write_length_mismatch() {
        let dev = FakeDevRoot::new("length");
        dev.add_family(&topology(), DeviceFamily::Msr);
        let registry = MsrRegistry::open_at(&dev.root, topology()).unwrap();

        let err = registry.write_all_sockets_v(0x1B1, &[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            ThermflowError::ValueCountMismatch {
                group: "socket",
                expected: 2,
                actual: 3,
            }
        ));
    }

    #[test]
    fn test_coordinate_addressing_targets_right_unit() {
        let dev = FakeDevRoot::new("coord");
        let topology = topology();
        dev.add_family(&topology, DeviceFamily::Msr);
        let registry = MsrRegistry::open_at(&dev.root, topology).unwrap();

        registry.write_by_coord(1, 1, 0, 0x19C, 0x42).unwrap();
        assert_eq!(registry.read(6, 0x19C).unwrap(), 0x42);
        assert_eq!(registry.read_by_coord(1, 1, 0, 0x19C).unwrap(), 0x42);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_unit_out_of_range_panics() {
        let dev = FakeDevRoot::new("oob");
        dev.add_family(&topology(), DeviceFamily::Msr);
        let registry = MsrRegistry::open_at(&dev.root, topology()).unwrap();
        let _ = registry.read(8, 0x19C);
    }

    #[test]
    fn test_broadcast_write() {
        let dev = FakeDevRoot::new("broadcast");
        let topology = topology();
        dev.add_family(&topology, DeviceFamily::Msr);
        let registry = MsrRegistry::open_at(&dev.root, topology).unwrap();

        registry.write_all_threads(0x1B2, 0x17).unwrap();
        assert_eq!(registry.read_all_threads(0x1B2).unwrap(), [0x17; 8]);
    }
}
