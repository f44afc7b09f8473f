//! Raw frames handed from a frame source to the decoder

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// One MBAP-delimited frame exactly as it appeared on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    bytes: Bytes,
    timestamp: Option<DateTime<Utc>>,
}

impl RawFrame {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            timestamp: None,
        }
    }

    /// Attach the capture or receive time of the frame
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Parse a hex string such as `"00 01 00 00 00 07 01 03 04 00 01 00 FF"`.
    ///
    /// Whitespace, `:` and `-` separators are ignored; case does not matter.
    pub fn from_hex(input: &str) -> Result<Self, hex::FromHexError> {
        let compact: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
            .collect();
        let compact = compact
            .strip_prefix("0x")
            .or_else(|| compact.strip_prefix("0X"))
            .unwrap_or(compact.as_str());
        Ok(Self::new(hex::decode(compact)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Lowercase hex of the whole frame
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}
