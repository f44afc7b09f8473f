//! MODBUS/TCP framing constants
//!
//! Offsets and sizes used by the frame sources and the header decoder.

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Bytes preceding the MBAP length-delimited body
/// Format: Transaction ID(2) + Protocol ID(2) + Length(2) = 6 bytes
/// The Length field counts everything after these 6 bytes (unit id onwards)
pub const MBAP_PREFIX_LEN: usize = 6;

/// Fixed header decoded for every frame: MBAP prefix + Unit ID(1) + Function Code(1)
pub const FRAME_HEADER_LEN: usize = 8;

/// Bytes of the Length field that are not payload (unit id + function code)
pub const LENGTH_OVERHEAD: usize = 2;

/// Protocol identifier mandated by MODBUS/TCP
pub const MODBUS_PROTOCOL_ID: u16 = 0;

/// Conventional MODBUS/TCP server port
pub const MODBUS_TCP_PORT: u16 = 502;

/// Largest frame a 16-bit Length field can announce, including the prefix.
///
/// Default ceiling for frame sources; a lower ceiling (e.g. 260, the largest
/// frame a conforming device sends) makes corrupt length fields fail fast.
pub const MAX_DECLARED_FRAME_LEN: usize = MBAP_PREFIX_LEN + u16::MAX as usize;

// ============================================================================
// Payload Layout Constants
// ============================================================================

/// Read responses (FC01-04): byte_count
pub const READ_MIN_PAYLOAD: usize = 1;

/// Single/multiple writes (FC05/06/15/16): address(2) + value or quantity(2)
pub const WRITE_MIN_PAYLOAD: usize = 4;

/// Device identification (FC43): mei_type, reading_device_id, conformity_level,
/// more_follows, next_object_id, object_count
pub const DEVICE_ID_MIN_PAYLOAD: usize = 6;

/// FC05 wire value for an energised coil
pub const COIL_ON: u16 = 0xFF00;

/// Calculate total frame size (prefix + declared body)
#[inline]
pub const fn mbap_frame_size(length_field: u16) -> usize {
    MBAP_PREFIX_LEN + length_field as usize
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        assert_eq!(MBAP_PREFIX_LEN, 6);
        assert_eq!(FRAME_HEADER_LEN, MBAP_PREFIX_LEN + LENGTH_OVERHEAD);
    }

    #[test]
    fn test_mbap_frame_size_helper() {
        assert_eq!(mbap_frame_size(0), 6);
        assert_eq!(mbap_frame_size(7), 13);
        assert_eq!(mbap_frame_size(u16::MAX), MAX_DECLARED_FRAME_LEN);
    }
}
