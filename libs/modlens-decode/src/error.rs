//! Error types for modlens-decode
//!
//! Two tiers:
//! - [`DecodeError`]: local to one frame, never fatal. Either the frame is
//!   rejected (no Transaction) or the payload is annotated as `Malformed`.
//! - [`SourceError`]: the capture source itself failed. Propagated to the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Serialisable classification of per-frame problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    FrameTooShort,
    InvalidProtocolId,
    TruncatedPayload,
    ObjectOverrun,
    /// Not a failure: the frame is kept with an `Unknown` payload
    UnsupportedFunctionCode,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::FrameTooShort => "FrameTooShort",
            Self::InvalidProtocolId => "InvalidProtocolId",
            Self::TruncatedPayload => "TruncatedPayload",
            Self::ObjectOverrun => "ObjectOverrun",
            Self::UnsupportedFunctionCode => "UnsupportedFunctionCode",
        };
        f.write_str(name)
    }
}

/// Per-frame decode failure with context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Frame too short: {actual} bytes (need at least {required})")]
    FrameTooShort { actual: usize, required: usize },

    #[error("Invalid protocol ID: expected 0, got {0}")]
    InvalidProtocolId(u16),

    #[error("Truncated payload for FC{function_code:02}: need {required} bytes, got {available}")]
    TruncatedPayload {
        function_code: u8,
        required: usize,
        available: usize,
    },

    #[error("Object #{index} overruns payload: needs {required} bytes, {remaining} remaining")]
    ObjectOverrun {
        index: u8,
        required: usize,
        remaining: usize,
    },

    #[error("Unsupported function code: {0}")]
    UnsupportedFunctionCode(u8),
}

impl DecodeError {
    /// Classification used in diagnostics and `Malformed` payloads
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FrameTooShort { .. } => ErrorKind::FrameTooShort,
            Self::InvalidProtocolId(_) => ErrorKind::InvalidProtocolId,
            Self::TruncatedPayload { .. } => ErrorKind::TruncatedPayload,
            Self::ObjectOverrun { .. } => ErrorKind::ObjectOverrun,
            Self::UnsupportedFunctionCode(_) => ErrorKind::UnsupportedFunctionCode,
        }
    }

    /// Whether the frame is dropped instead of producing a Transaction
    pub fn rejects_frame(&self) -> bool {
        matches!(
            self,
            Self::FrameTooShort { .. } | Self::InvalidProtocolId(_)
        )
    }
}

/// Failure of the byte source feeding the decoder
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Capture file error: {0}")]
    Capture(#[from] pcap_file::PcapError),

    #[error("Unsupported capture link type: {0}")]
    UnsupportedLinkType(String),

    #[error("Stream closed before any data was received")]
    ClosedBeforeData,
}

pub type Result<T> = std::result::Result<T, DecodeError>;
