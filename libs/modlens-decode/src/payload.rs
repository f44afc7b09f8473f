//! Function-code specific payload decoding
//!
//! Reproduces the response-shaped interpretation used for captured traffic:
//!
//! | FC        | Layout                                                    |
//! |-----------|-----------------------------------------------------------|
//! | 01, 02    | byte_count, packed bits (LSB first)                       |
//! | 03, 04    | byte_count, big-endian 16-bit words                       |
//! | 05, 06    | address(2), value(2)                                      |
//! | 15, 16    | address(2), quantity(2)                                   |
//! | 43        | MEI header(6), objects `{id, len, value}`                 |
//! | other     | raw bytes                                                 |
//!
//! Read request frames (address + quantity, no byte_count) share function
//! codes with read responses and are decoded with the response layout; the
//! capture carries no direction marker at this layer.
//!
//! Decoding is pure: no logging, no allocation beyond the returned value, and
//! it never fails. Anticipated short payloads become [`DecodedPayload::Malformed`].

use serde::{Deserialize, Serialize};

use crate::constants::{COIL_ON, DEVICE_ID_MIN_PAYLOAD, READ_MIN_PAYLOAD, WRITE_MIN_PAYLOAD};
use crate::error::{DecodeError, ErrorKind, Result};
use crate::function_code::FunctionCode;

/// Values carried by a read response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadData {
    /// FC03/04 words
    #[serde(rename = "values")]
    Registers(Vec<u16>),
    /// FC01/02 coils or discrete inputs
    #[serde(rename = "bits")]
    Bits(Vec<bool>),
}

/// Value of a single write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WriteValue {
    /// FC05: 0xFF00 is on, anything else off
    Coil(bool),
    /// FC06
    Register(u16),
}

/// One device identification object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceObject {
    pub id: u8,
    pub value: String,
}

impl DeviceObject {
    /// Standard name of basic and regular objects (ids 0-6)
    pub fn name(&self) -> Option<&'static str> {
        match self.id {
            0x00 => Some("VendorName"),
            0x01 => Some("ProductCode"),
            0x02 => Some("MajorMinorRevision"),
            0x03 => Some("VendorUrl"),
            0x04 => Some("ProductName"),
            0x05 => Some("ModelName"),
            0x06 => Some("UserApplicationName"),
            _ => None,
        }
    }
}

/// Where device-identification decoding stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectOverrun {
    /// Zero-based index of the object that did not fit
    pub index: u8,
    /// Bytes the object needed (2 for a missing id/len pair)
    pub required: usize,
    /// Bytes left in the payload at that point
    pub remaining: usize,
}

impl From<ObjectOverrun> for DecodeError {
    fn from(o: ObjectOverrun) -> Self {
        DecodeError::ObjectOverrun {
            index: o.index,
            required: o.required,
            remaining: o.remaining,
        }
    }
}

/// Typed payload, one variant per function family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DecodedPayload {
    ReadValues {
        byte_count: u8,
        #[serde(flatten)]
        data: ReadData,
    },
    WriteSingle {
        address: u16,
        value: WriteValue,
    },
    WriteMultiple {
        address: u16,
        quantity: u16,
    },
    DeviceIdentification {
        mei_type: u8,
        reading_device_id: u8,
        conformity_level: u8,
        more_follows: u8,
        next_object_id: u8,
        object_count: u8,
        objects: Vec<DeviceObject>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        overrun: Option<ObjectOverrun>,
    },
    Unknown {
        #[serde(with = "hex_bytes")]
        raw: Vec<u8>,
    },
    Malformed {
        reason: ErrorKind,
        #[serde(default, with = "hex_bytes_opt", skip_serializing_if = "Option::is_none")]
        partial: Option<Vec<u8>>,
    },
}

impl DecodedPayload {
    /// Build a `Malformed` payload from a decode error and the bytes seen
    pub fn malformed(error: &DecodeError, payload: &[u8]) -> Self {
        Self::Malformed {
            reason: error.kind(),
            partial: Some(payload.to_vec()),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }

    /// Problem worth a diagnostic, if any
    pub fn problem(&self) -> Option<ErrorKind> {
        match self {
            Self::Malformed { reason, .. } => Some(*reason),
            Self::DeviceIdentification {
                overrun: Some(_), ..
            } => Some(ErrorKind::ObjectOverrun),
            _ => None,
        }
    }
}

/// Decode `payload` (bytes after the function code) for `function_code`.
pub fn decode_payload(function_code: FunctionCode, payload: &[u8]) -> DecodedPayload {
    let result = match function_code {
        FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => {
            decode_read_bits(function_code, payload)
        },
        FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
            decode_read_registers(function_code, payload)
        },
        FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister => {
            decode_write_single(function_code, payload)
        },
        FunctionCode::WriteMultipleCoils | FunctionCode::WriteMultipleRegisters => {
            decode_write_multiple(function_code, payload)
        },
        FunctionCode::ReadDeviceIdentification => decode_device_identification(payload),
        FunctionCode::Unknown(_) => Ok(DecodedPayload::Unknown {
            raw: payload.to_vec(),
        }),
    };

    result.unwrap_or_else(|e| DecodedPayload::malformed(&e, payload))
}

fn require(function_code: FunctionCode, payload: &[u8], required: usize) -> Result<()> {
    if payload.len() < required {
        return Err(DecodeError::TruncatedPayload {
            function_code: function_code.code(),
            required,
            available: payload.len(),
        });
    }
    Ok(())
}

/// Bytes of read data actually present: declared byte_count bounded by the payload
fn read_data(payload: &[u8]) -> (u8, &[u8]) {
    let byte_count = payload[0];
    let available = &payload[1..];
    let end = (byte_count as usize).min(available.len());
    (byte_count, &available[..end])
}

fn decode_read_bits(function_code: FunctionCode, payload: &[u8]) -> Result<DecodedPayload> {
    require(function_code, payload, READ_MIN_PAYLOAD)?;
    let (byte_count, data) = read_data(payload);

    // Whole bytes are unpacked; the requested coil count is not on the wire here
    let bits = data
        .iter()
        .flat_map(|byte| (0..8).map(move |bit| (byte >> bit) & 1 == 1))
        .collect();

    Ok(DecodedPayload::ReadValues {
        byte_count,
        data: ReadData::Bits(bits),
    })
}

fn decode_read_registers(function_code: FunctionCode, payload: &[u8]) -> Result<DecodedPayload> {
    require(function_code, payload, READ_MIN_PAYLOAD)?;
    let (byte_count, data) = read_data(payload);

    // chunks_exact drops an odd trailing byte
    let values = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    Ok(DecodedPayload::ReadValues {
        byte_count,
        data: ReadData::Registers(values),
    })
}

fn address_and_word(payload: &[u8]) -> (u16, u16) {
    (
        u16::from_be_bytes([payload[0], payload[1]]),
        u16::from_be_bytes([payload[2], payload[3]]),
    )
}

fn decode_write_single(function_code: FunctionCode, payload: &[u8]) -> Result<DecodedPayload> {
    require(function_code, payload, WRITE_MIN_PAYLOAD)?;
    let (address, raw) = address_and_word(payload);

    let value = match function_code {
        FunctionCode::WriteSingleCoil => WriteValue::Coil(raw == COIL_ON),
        _ => WriteValue::Register(raw),
    };

    Ok(DecodedPayload::WriteSingle { address, value })
}

fn decode_write_multiple(function_code: FunctionCode, payload: &[u8]) -> Result<DecodedPayload> {
    require(function_code, payload, WRITE_MIN_PAYLOAD)?;
    let (address, quantity) = address_and_word(payload);
    Ok(DecodedPayload::WriteMultiple { address, quantity })
}

fn decode_device_identification(payload: &[u8]) -> Result<DecodedPayload> {
    require(
        FunctionCode::ReadDeviceIdentification,
        payload,
        DEVICE_ID_MIN_PAYLOAD,
    )?;

    let object_count = payload[5];
    let mut objects = Vec::with_capacity(object_count as usize);
    let mut overrun = None;
    let mut offset = DEVICE_ID_MIN_PAYLOAD;

    for index in 0..object_count {
        let remaining = payload.len() - offset;
        if remaining < 2 {
            overrun = Some(ObjectOverrun {
                index,
                required: 2,
                remaining,
            });
            break;
        }

        let id = payload[offset];
        let len = payload[offset + 1] as usize;
        if remaining - 2 < len {
            overrun = Some(ObjectOverrun {
                index,
                required: 2 + len,
                remaining,
            });
            break;
        }

        let start = offset + 2;
        objects.push(DeviceObject {
            id,
            value: ascii_lossy(&payload[start..start + len]),
        });
        offset = start + len;
    }

    Ok(DecodedPayload::DeviceIdentification {
        mei_type: payload[0],
        reading_device_id: payload[1],
        conformity_level: payload[2],
        more_follows: payload[3],
        next_object_id: payload[4],
        object_count,
        objects,
        overrun,
    })
}

/// ASCII text with every non-ASCII byte replaced by U+FFFD
fn ascii_lossy(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
        .collect()
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

mod hex_bytes_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
