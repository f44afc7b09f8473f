//! MODBUS/TCP header decoding
//!
//! Parses the fixed 8-byte prefix of every frame:
//!
//! ```text
//! offset  0      2      4      6     7
//!         | tid  | pid  | len  | uid | fc | payload ...
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{FRAME_HEADER_LEN, LENGTH_OVERHEAD, MODBUS_PROTOCOL_ID};
use crate::error::{DecodeError, Result};

/// MBAP header plus the function code byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Opaque request/response correlation value, not a global order
    pub transaction_id: u16,
    /// Always 0 for MODBUS/TCP
    pub protocol_id: u16,
    /// Byte count of unit_id + function_code + payload
    pub length: u16,
    pub unit_id: u8,
    pub function_code: u8,
}

impl Header {
    /// Decode the header from the start of `frame`.
    ///
    /// Fails with `FrameTooShort` below 8 bytes and `InvalidProtocolId` when
    /// the protocol identifier is not 0.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < FRAME_HEADER_LEN {
            return Err(DecodeError::FrameTooShort {
                actual: frame.len(),
                required: FRAME_HEADER_LEN,
            });
        }

        let header = Self {
            transaction_id: u16::from_be_bytes([frame[0], frame[1]]),
            protocol_id: u16::from_be_bytes([frame[2], frame[3]]),
            length: u16::from_be_bytes([frame[4], frame[5]]),
            unit_id: frame[6],
            function_code: frame[7],
        };

        if header.protocol_id != MODBUS_PROTOCOL_ID {
            return Err(DecodeError::InvalidProtocolId(header.protocol_id));
        }

        Ok(header)
    }

    /// Payload length announced by the Length field: `max(0, length - 2)`
    pub fn declared_payload_len(&self) -> usize {
        (self.length as usize).saturating_sub(LENGTH_OVERHEAD)
    }

    /// Payload slice of `frame` as announced by the header.
    ///
    /// Returns the slice and whether the frame held the full declared body.
    /// Bytes beyond the declared length are never included.
    pub fn payload<'a>(&self, frame: &'a [u8]) -> (&'a [u8], bool) {
        let body = frame.get(FRAME_HEADER_LEN..).unwrap_or(&[]);
        let declared = self.declared_payload_len();
        if body.len() >= declared {
            (&body[..declared], true)
        } else {
            (body, false)
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_read_holding_registers_response() {
        let frame = [
            0x00, 0x01, // Transaction ID
            0x00, 0x00, // Protocol ID
            0x00, 0x07, // Length
            0x01, // Unit ID
            0x03, // Function code
            0x04, 0x00, 0x01, 0x00, 0xFF,
        ];
        let header = Header::parse(&frame).unwrap();

        assert_eq!(header.transaction_id, 1);
        assert_eq!(header.protocol_id, 0);
        assert_eq!(header.length, 7);
        assert_eq!(header.unit_id, 1);
        assert_eq!(header.function_code, 3);

        let (payload, complete) = header.payload(&frame);
        assert!(complete);
        assert_eq!(payload, &[0x04, 0x00, 0x01, 0x00, 0xFF]);
    }

    #[test]
    fn test_big_endian_fields() {
        let frame = [0xAB, 0xCD, 0x00, 0x00, 0x01, 0x02, 0xFE, 0x10];
        let header = Header::parse(&frame).unwrap();
        assert_eq!(header.transaction_id, 0xABCD);
        assert_eq!(header.length, 0x0102);
        assert_eq!(header.unit_id, 0xFE);
    }

    #[test]
    fn test_too_short() {
        for len in 0..FRAME_HEADER_LEN {
            let frame = vec![0u8; len];
            let err = Header::parse(&frame).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::FrameTooShort);
        }
    }

    #[test]
    fn test_invalid_protocol_id() {
        let frame = [0x00, 0x01, 0x00, 0x01, 0x00, 0x06, 0x01, 0x03];
        let err = Header::parse(&frame).unwrap_err();
        assert_eq!(err, DecodeError::InvalidProtocolId(1));
    }

    #[test]
    fn test_payload_clamped_to_declared_length() {
        // Length says 4 (unit + fc + 2 bytes), frame carries 3 trailing bytes
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0x01, 0x05, 0xAA, 0xBB, 0xCC];
        let header = Header::parse(&frame).unwrap();
        let (payload, complete) = header.payload(&frame);
        assert!(complete);
        assert_eq!(payload, &[0xAA, 0xBB]);
    }

    #[test]
    fn test_payload_short_body() {
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x09, 0x01, 0x03, 0x04, 0x00];
        let header = Header::parse(&frame).unwrap();
        let (payload, complete) = header.payload(&frame);
        assert!(!complete);
        assert_eq!(payload, &[0x04, 0x00]);
    }

    #[test]
    fn test_length_below_overhead() {
        let frame = [0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x01, 0x03];
        let header = Header::parse(&frame).unwrap();
        assert_eq!(header.declared_payload_len(), 0);
        let (payload, complete) = header.payload(&frame);
        assert!(payload.is_empty());
        assert!(complete);
    }
}
