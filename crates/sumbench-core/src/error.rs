//! Error types for sumbench-core

use std::path::PathBuf;

/// Result type for sumbench-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running a measurement.
///
/// A kernel disagreeing with the baseline is not an error: it is reported
/// per (kernel, size) in the [`Report`](crate::report::Report). A missing
/// CPU extension is not an error either; the kernel falls back silently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rejected before any buffer is generated.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The native routine could not be bound at startup.
    #[error("Foreign kernel binding failed for {}: {reason}", source_path.display())]
    ForeignBinding {
        source_path: PathBuf,
        reason: ForeignBindingFailure,
    },
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }
}

/// Why a foreign routine was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ForeignBindingFailure {
    #[error("library could not be loaded: {0}")]
    LibraryNotFound(String),

    #[error("symbol `{symbol}` not exported: {message}")]
    SymbolMissing { symbol: String, message: String },

    #[error("ABI version mismatch: expected {expected}, found {found}")]
    AbiMismatch { expected: u32, found: u32 },

    #[error("smoke call returned {actual}, expected {expected}")]
    SmokeTestFailed { expected: f32, actual: f32 },
}
