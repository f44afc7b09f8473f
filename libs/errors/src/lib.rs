//! Unified error handling for modlens tools
//!
//! Library crates keep their own error enums (`DecodeError`, `SourceError`);
//! binaries wrap them in [`ModlensError`], which decides the process exit code.
//! Per-frame decode problems never reach this layer: they are diagnostics.

use modlens_decode::SourceError;
use thiserror::Error;

// ============================================================================
// Exit codes (sysexits.h)
// ============================================================================

/// Command line usage or configuration problem
pub const EXIT_USAGE: i32 = 2;
/// Input file or capture missing
pub const EXIT_NO_INPUT: i32 = 66;
/// I/O failure while reading input or writing output
pub const EXIT_IO: i32 = 74;
/// Anything else
pub const EXIT_FAILURE: i32 = 1;

// ============================================================================
// ModlensError - Main error type
// ============================================================================

/// Main error type for modlens binaries
#[derive(Debug, Error)]
pub enum ModlensError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Configuration load failed: {0}")]
    ConfigLoad(#[from] Box<figment::Error>),

    // ======================================
    // Input Errors
    // ======================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    // ======================================
    // Capture & I/O Errors
    // ======================================
    #[error("Capture error: {0}")]
    Capture(#[from] SourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ======================================
    // Runtime Errors
    // ======================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ModlensError
pub type ModlensResult<T> = Result<T, ModlensError>;

impl ModlensError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_)
            | Self::InvalidConfig { .. }
            | Self::ConfigLoad(_)
            | Self::InvalidInput(_) => EXIT_USAGE,

            Self::FileNotFound(_) => EXIT_NO_INPUT,
            // Only the input source maps NotFound to 66; output paths stay I/O
            Self::Capture(SourceError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                EXIT_NO_INPUT
            },

            Self::Capture(_) | Self::Io(_) => EXIT_IO,

            Self::Serialization(_) | Self::Other(_) => EXIT_FAILURE,
        }
    }

    /// Whether the capture source itself failed (as opposed to setup or output)
    pub fn is_fatal_source(&self) -> bool {
        matches!(self, Self::Capture(_) | Self::FileNotFound(_))
    }

    /// Stable identifier for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::ConfigLoad(_) => "CONFIG_LOAD_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::Capture(_) => "CAPTURE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Other(_) => "OTHER_ERROR",
        }
    }
}

// Conversion traits for common error types
impl From<serde_json::Error> for ModlensError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<figment::Error> for ModlensError {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::ModlensError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::ModlensError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! input_error {
    ($msg:expr) => {
        $crate::ModlensError::InvalidInput($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::ModlensError::InvalidInput(format!($fmt, $($arg)*))
    };
}
