//! MODBUS function codes recognised by the decoder

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;

/// Function code carried in byte 7 of every frame
///
/// Closed set of decoded codes plus a catch-all. Payload decoding matches on
/// this exhaustively, so adding a code is a compile-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FunctionCode {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteSingleCoil,
    WriteSingleRegister,
    WriteMultipleCoils,
    WriteMultipleRegisters,
    ReadDeviceIdentification,
    Unknown(u8),
}

impl FunctionCode {
    /// Wire value
    pub fn code(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleCoils => 0x0F,
            Self::WriteMultipleRegisters => 0x10,
            Self::ReadDeviceIdentification => 0x2B,
            Self::Unknown(code) => code,
        }
    }

    /// Human-readable label, `Unknown (N)` for codes outside the known set
    pub fn name(self) -> Cow<'static, str> {
        match self {
            Self::ReadCoils => Cow::Borrowed("Read Coils"),
            Self::ReadDiscreteInputs => Cow::Borrowed("Read Discrete Inputs"),
            Self::ReadHoldingRegisters => Cow::Borrowed("Read Holding Registers"),
            Self::ReadInputRegisters => Cow::Borrowed("Read Input Registers"),
            Self::WriteSingleCoil => Cow::Borrowed("Write Single Coil"),
            Self::WriteSingleRegister => Cow::Borrowed("Write Single Register"),
            Self::WriteMultipleCoils => Cow::Borrowed("Write Multiple Coils"),
            Self::WriteMultipleRegisters => Cow::Borrowed("Write Multiple Registers"),
            Self::ReadDeviceIdentification => Cow::Borrowed("Read Device Identification"),
            Self::Unknown(code) => Cow::Owned(format!("Unknown ({})", code)),
        }
    }

    /// FC01-04
    pub fn is_read(self) -> bool {
        matches!(
            self,
            Self::ReadCoils
                | Self::ReadDiscreteInputs
                | Self::ReadHoldingRegisters
                | Self::ReadInputRegisters
        )
    }

    /// FC05/06/15/16
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Self::WriteSingleCoil
                | Self::WriteSingleRegister
                | Self::WriteMultipleCoils
                | Self::WriteMultipleRegisters
        )
    }
}

impl From<u8> for FunctionCode {
    fn from(code: u8) -> Self {
        match code {
            0x01 => Self::ReadCoils,
            0x02 => Self::ReadDiscreteInputs,
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x05 => Self::WriteSingleCoil,
            0x06 => Self::WriteSingleRegister,
            0x0F => Self::WriteMultipleCoils,
            0x10 => Self::WriteMultipleRegisters,
            0x2B => Self::ReadDeviceIdentification,
            other => Self::Unknown(other),
        }
    }
}

impl From<FunctionCode> for u8 {
    fn from(fc: FunctionCode) -> Self {
        fc.code()
    }
}

impl std::fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FC{:02} ({})", self.code(), self.name())
    }
}

// Serialised as the bare wire value, matching the `function_code` field of records
impl Serialize for FunctionCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for FunctionCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u8::deserialize(deserializer).map(Self::from)
    }
}
