//! MBAP frame delimiting for byte streams
//!
//! A MODBUS/TCP stream is a concatenation of frames whose size is announced by
//! the Length field at offset 4: `frame = 6 + length`. The codec buffers until
//! a whole frame is available and yields it untouched; validation is the
//! decoder's job.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::constants::{mbap_frame_size, MAX_DECLARED_FRAME_LEN, MBAP_PREFIX_LEN};
use crate::error::SourceError;
use crate::frame::RawFrame;
use crate::source::SourceEvent;

/// Splits a byte stream into MBAP-delimited frames
#[derive(Debug, Clone)]
pub struct MbapCodec {
    max_frame_len: usize,
}

impl Default for MbapCodec {
    fn default() -> Self {
        Self {
            max_frame_len: MAX_DECLARED_FRAME_LEN,
        }
    }
}

impl MbapCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames announcing more than `max_frame_len` bytes are discarded
    /// together with everything buffered, since the stream has lost sync.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            max_frame_len: max_frame_len.max(MBAP_PREFIX_LEN),
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Size of the frame at the head of `buf`, once the prefix is readable
    fn announced_size(buf: &[u8]) -> Option<usize> {
        if buf.len() < MBAP_PREFIX_LEN {
            return None;
        }
        Some(mbap_frame_size(u16::from_be_bytes([buf[4], buf[5]])))
    }
}

impl Decoder for MbapCodec {
    type Item = SourceEvent;
    type Error = SourceError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame_size) = Self::announced_size(buf) else {
            return Ok(None);
        };

        if frame_size > self.max_frame_len {
            let discarded = buf.split().freeze();
            return Ok(Some(SourceEvent::Dropped {
                reason: format!(
                    "declared frame size {} exceeds limit {}",
                    frame_size, self.max_frame_len
                ),
                bytes: discarded,
                timestamp: None,
            }));
        }

        if buf.len() < frame_size {
            buf.reserve(frame_size - buf.len());
            return Ok(None);
        }

        let bytes = buf.split_to(frame_size).freeze();
        trace!("MBAP frame: {}B, {}B buffered", frame_size, buf.remaining());
        Ok(Some(SourceEvent::Frame(RawFrame::new(bytes))))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(event) = self.decode(buf)? {
            return Ok(Some(event));
        }
        if buf.is_empty() {
            return Ok(None);
        }

        let reason = match Self::announced_size(buf) {
            Some(size) => format!("stream ended mid-frame ({} of {} bytes)", buf.len(), size),
            None => format!("stream ended inside frame prefix ({} bytes)", buf.len()),
        };
        Ok(Some(SourceEvent::Dropped {
            bytes: buf.split().freeze(),
            reason,
            timestamp: None,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn frame_bytes(event: SourceEvent) -> Vec<u8> {
        match event {
            SourceEvent::Frame(frame) => frame.as_bytes().to_vec(),
            other => panic!("expected frame, got {:?}", other),
        }
    }

    #[test]
    fn test_waits_for_prefix() {
        let mut codec = MbapCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x01, 0x00, 0x00, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_waits_for_full_frame_then_splits() {
        let mut codec = MbapCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0x00, 0x01, 0x00, 0x02, 0xAA]);
        let frame = frame_bytes(codec.decode(&mut buf).unwrap().unwrap());
        assert_eq!(frame.len(), 12);
        assert_eq!(&buf[..], &[0xAA]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut codec = MbapCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x03, 0x00]);
        buf.extend_from_slice(&[0x00, 0x02, 0x00, 0x00, 0x00, 0x02, 0x01, 0x2B]);

        let first = frame_bytes(codec.decode(&mut buf).unwrap().unwrap());
        let second = frame_bytes(codec.decode(&mut buf).unwrap().unwrap());
        assert_eq!(first[1], 0x01);
        assert_eq!(second[1], 0x02);
        assert!(buf.is_empty());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_zero_length_frame_is_prefix_only() {
        // Length 0 still delimits a 6-byte frame; the decoder rejects it later
        let mut codec = MbapCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x09][..]);
        let frame = frame_bytes(codec.decode(&mut buf).unwrap().unwrap());
        assert_eq!(frame.len(), 6);
        assert_eq!(&buf[..], &[0x09]);
    }

    #[test]
    fn test_oversized_frame_discards_buffer() {
        let mut codec = MbapCodec::with_max_frame_len(260);
        let mut buf = BytesMut::from(&[0x00, 0x01, 0x00, 0x00, 0x10, 0x00, 0x01, 0x03][..]);
        match codec.decode(&mut buf).unwrap().unwrap() {
            SourceEvent::Dropped { bytes, reason, .. } => {
                assert_eq!(bytes.len(), 8);
                assert!(reason.contains("exceeds limit 260"));
            },
            other => panic!("expected drop, got {:?}", other),
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn test_eof_reports_partial_frame() {
        let mut codec = MbapCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03][..]);
        match codec.decode_eof(&mut buf).unwrap().unwrap() {
            SourceEvent::Dropped { bytes, reason, .. } => {
                assert_eq!(bytes.len(), 8);
                assert_eq!(reason, "stream ended mid-frame (8 of 13 bytes)");
            },
            other => panic!("expected drop, got {:?}", other),
        }
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_eof_inside_prefix() {
        let mut codec = MbapCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x01, 0x00][..]);
        let event = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert!(matches!(event, SourceEvent::Dropped { ref reason, .. } if reason.contains("prefix")));
    }

    #[test]
    fn test_max_frame_len_floor() {
        assert_eq!(MbapCodec::with_max_frame_len(0).max_frame_len(), MBAP_PREFIX_LEN);
        assert_eq!(MbapCodec::new().max_frame_len(), MAX_DECLARED_FRAME_LEN);
    }
}
