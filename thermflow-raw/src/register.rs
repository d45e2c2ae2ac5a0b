//! Generic register abstractions for type-safe MSR programming

use crate::bitfield;

/// Granularity at which a register's value is architecturally defined.
///
/// The I/O layer samples one representative logical CPU per scope group
/// (package scope: the first thread of each socket; core scope: thread 0 of
/// each core; thread scope: every logical CPU). Callers must pair a
/// register with the group operation matching its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterScope {
    Thread,
    Core,
    Package,
}

/// Trait for register layouts that can be decoded from and applied to raw
/// MSR values.
///
/// This trait provides type-safe conversion between structured register
/// layouts and the raw 64-bit values that are read from and written to
/// MSRs. Unlike a plain serializer, [`RegisterLayout::apply`] takes the
/// register's *current* raw value and overlays only the writable fields:
/// status registers hold hardware-owned bits next to software-clearable
/// ones, so an encode that started from zero would corrupt live state.
///
/// # Example
///
/// ```ignore
/// use thermflow_raw::register::{RegisterLayout, RegisterScope};
/// use thermflow_raw::bitfield::{self, Field};
///
/// #[derive(Debug, Default)]
/// struct MyControl {
///     enable: bool,
/// }
///
/// const ENABLE: Field = Field::rw("enable", 0, 0);
///
/// impl RegisterLayout for MyControl {
///     const ADDRESS: u64 = 0x1A0;
///     const SCOPE: RegisterScope = RegisterScope::Core;
///
///     fn decode(raw: u64) -> Self {
///         Self { enable: bitfield::flag(raw, ENABLE) }
///     }
///
///     fn apply(&self, current: u64) -> bitfield::Result<u64> {
///         bitfield::overlay_flag(current, ENABLE, self.enable)
///     }
/// }
/// ```
pub trait RegisterLayout: Sized {
    /// MSR address, used as the byte offset into the per-CPU device file.
    const ADDRESS: u64;

    /// Scope at which one logical value of this register exists.
    const SCOPE: RegisterScope;

    /// Parse a raw MSR value into this register layout.
    fn decode(raw: u64) -> Self;

    /// Overlay the writable fields of this layout onto `current`, the
    /// register's freshly-read raw value, returning the value to write
    /// back. Bits not covered by a writable field are preserved.
    ///
    /// Read-only registers return `current` unchanged.
    fn apply(&self, current: u64) -> bitfield::Result<u64>;
}
