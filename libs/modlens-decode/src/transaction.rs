//! Decoded transactions and the per-frame decode entry point

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::Result;
use crate::frame::RawFrame;
use crate::function_code::FunctionCode;
use crate::header::Header;
use crate::payload::{decode_payload, DecodedPayload};

/// One decoded frame. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    header: Header,
    function_code: FunctionCode,
    payload: DecodedPayload,
    raw_hex: String,
    sequence: u64,
    timestamp: Option<DateTime<Utc>>,
    /// Payload bytes handed to the payload decoder
    payload_len: usize,
    /// False when the frame ended before the declared length
    complete: bool,
}

impl Transaction {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn function_code(&self) -> FunctionCode {
        self.function_code
    }

    pub fn payload(&self) -> &DecodedPayload {
        &self.payload
    }

    pub fn raw_hex(&self) -> &str {
        &self.raw_hex
    }

    /// Position assigned by the parser instance, starting at 0
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    pub fn unit_id(&self) -> u8 {
        self.header.unit_id
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Whether the frame carried every byte its Length field announced
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Same content with a different sequence number
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

/// Decode one frame into a Transaction carrying `sequence`.
///
/// Only header-level problems (`FrameTooShort`, `InvalidProtocolId`) are
/// returned as errors; payload problems are folded into the payload.
///
/// A body shorter than the declared Length is still decoded from the bytes
/// present; `is_complete()` is false and the session reports the shortfall.
pub fn decode_frame(frame: &RawFrame, sequence: u64) -> Result<Transaction> {
    let bytes = frame.as_bytes();
    let header = Header::parse(bytes)?;
    let function_code = FunctionCode::from(header.function_code);
    let (payload_bytes, complete) = header.payload(bytes);

    Ok(Transaction {
        header,
        function_code,
        payload: decode_payload(function_code, payload_bytes),
        raw_hex: frame.to_hex(),
        sequence,
        timestamp: frame.timestamp(),
        payload_len: payload_bytes.len(),
        complete,
    })
}

impl Serialize for Transaction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields = if self.timestamp.is_some() { 10 } else { 9 };
        let mut s = serializer.serialize_struct("Transaction", fields)?;
        s.serialize_field("sequence", &self.sequence)?;
        if let Some(ts) = &self.timestamp {
            s.serialize_field("timestamp", ts)?;
        } else {
            s.skip_field("timestamp")?;
        }
        s.serialize_field("transaction_id", &self.header.transaction_id)?;
        s.serialize_field("protocol_id", &self.header.protocol_id)?;
        s.serialize_field("length", &self.header.length)?;
        s.serialize_field("unit_id", &self.header.unit_id)?;
        s.serialize_field("function_code", &self.function_code)?;
        s.serialize_field("function_name", &self.function_code.name())?;
        s.serialize_field("payload", &self.payload)?;
        s.serialize_field("raw_hex", &self.raw_hex)?;
        s.end()
    }
}
