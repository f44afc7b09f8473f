//! MODBUS/TCP Transaction Decoder
//!
//! Turns captured MODBUS/TCP traffic into typed transactions plus running
//! statistics for downstream anomaly detection and reporting.
//!
//! # Architecture
//!
//! ```text
//! modlens-decode
//!     ├── FrameSource      (MbapCodec, StreamFrameSource, PcapFrameSource)
//!     ├── HeaderDecoder    (Header::parse)
//!     ├── PayloadDecoder   (decode_payload → DecodedPayload)
//!     └── ParserState      (transaction log, StatisticsAggregator, diagnostics)
//! ```
//!
//! Per-frame decoding is synchronous and pure; only frame sources perform
//! I/O. One `ParserState` belongs to one capture stream.
//!
//! # Example
//!
//! ```
//! use modlens_decode::{ParserState, RawFrame};
//!
//! let frame = RawFrame::from_hex("00 01 00 00 00 07 01 03 04 00 01 00 FF").unwrap();
//! let mut state = ParserState::new();
//! state.parse_frame(&frame);
//!
//! assert_eq!(state.statistics().transaction_count, 1);
//! assert_eq!(state.statistics().read_operations, 1);
//! ```

mod codec;
mod constants;
mod error;
mod frame;
mod function_code;
mod header;
mod payload;
pub mod pcap;
mod source;
mod state;
mod transaction;

// ============================================================================
// Decoding
// ============================================================================

pub use error::{DecodeError, ErrorKind, Result, SourceError};
pub use frame::RawFrame;
pub use function_code::FunctionCode;
pub use header::Header;
pub use payload::{
    decode_payload, DecodedPayload, DeviceObject, ObjectOverrun, ReadData, WriteValue,
};
pub use transaction::{decode_frame, Transaction};

// ============================================================================
// Session state
// ============================================================================

pub use state::{Diagnostic, FrameOutcome, ParserState, Statistics, StatisticsAggregator};

// ============================================================================
// Frame sources
// ============================================================================

pub use codec::MbapCodec;
pub use pcap::{CaptureOptions, CaptureStats, PcapFrameSource};
pub use source::{run_batch, run_stream, SourceEvent, StreamFrameSource, StreamSummary};

pub use constants::{
    FRAME_HEADER_LEN, MAX_DECLARED_FRAME_LEN, MBAP_PREFIX_LEN, MODBUS_PROTOCOL_ID,
    MODBUS_TCP_PORT,
};
