//! # thermflow-raw
//!
//! Architectural thermal and power register definitions for Intel CPUs.
//!
//! This crate describes MSR layouts only — no I/O lives here. Each register
//! is a plain struct implementing [`RegisterLayout`], built on a small
//! bitfield model that knows each field's documented bit range and whether
//! software may write it. Encoding is always an overlay onto the register's
//! current raw value, so bits a layout does not own are never disturbed.
//!
//! ## Usage
//!
//! ```ignore
//! use thermflow_raw::thermal::CoreThermStatus;
//! use thermflow_raw::RegisterLayout;
//!
//! // Decode a raw value read from IA32_THERM_STATUS.
//! let status = CoreThermStatus::decode(raw);
//!
//! // Clear the sticky threshold log, preserving every other bit.
//! let cleared = CoreThermStatus {
//!     thresh1_log: false,
//!     ..status
//! }
//! .apply(raw)?;
//! ```

pub mod bitfield;
pub mod rapl;
pub mod register;
pub mod thermal;

// Re-export for convenience
pub use bitfield::{Field, FieldError};
pub use register::{RegisterLayout, RegisterScope};
