use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThermflowError {
    /// No device-file family qualified on every logical CPU. There is
    /// nothing to read registers through, so this is fatal at startup.
    #[error("no correctly-configured MSR device files found: {0}")]
    EnvironmentUnavailable(String),

    #[error("failed to open {path}: {source}")]
    OpenFailed { path: PathBuf, source: io::Error },

    #[error("read of MSR 0x{msr:X} on unit {unit} (fd {fd}) failed: {source}")]
    ReadFailed {
        unit: usize,
        msr: u64,
        fd: i32,
        source: io::Error,
    },

    #[error("write of MSR 0x{msr:X} on unit {unit} (fd {fd}) failed: {source}")]
    WriteFailed {
        unit: usize,
        msr: u64,
        fd: i32,
        source: io::Error,
    },

    #[error("{group} write expects {expected} values, got {actual}")]
    ValueCountMismatch {
        group: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("register field rejected: {0}")]
    Field(#[from] thermflow_raw::FieldError),

    #[error("topology probe failed: {0}")]
    TopologyError(String),

    #[error("affinity operation failed: {0}")]
    AffinityError(String),

    #[error("unsupported hardware: {0}")]
    UnsupportedHardware(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Nix error: {0}")]
    NixError(#[from] nix::Error),
}

pub type Result<T> = std::result::Result<T, ThermflowError>;
