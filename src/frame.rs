// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport-independent protocol data units.

use bytes::Bytes;

/// A Modbus function code is represented by an unsigned 8 bit integer.
pub type FunctionCode = u8;

/// Read Coils (bit access)
pub const FUNC_CODE_READ_COILS: FunctionCode = 0x01;
/// Read Discrete Inputs (bit access)
pub const FUNC_CODE_READ_DISCRETE_INPUTS: FunctionCode = 0x02;
/// Read Holding Registers (16-bit access)
pub const FUNC_CODE_READ_HOLDING_REGISTERS: FunctionCode = 0x03;
/// Read Input Registers (16-bit access)
pub const FUNC_CODE_READ_INPUT_REGISTERS: FunctionCode = 0x04;
/// Write Single Coil (bit access)
pub const FUNC_CODE_WRITE_SINGLE_COIL: FunctionCode = 0x05;
/// Write Single Register (16-bit access)
pub const FUNC_CODE_WRITE_SINGLE_REGISTER: FunctionCode = 0x06;
/// Write Multiple Coils (bit access)
pub const FUNC_CODE_WRITE_MULTIPLE_COILS: FunctionCode = 0x0F;
/// Write Multiple Registers (16-bit access)
pub const FUNC_CODE_WRITE_MULTIPLE_REGISTERS: FunctionCode = 0x10;
/// Mask Write Register (16-bit access)
pub const FUNC_CODE_MASK_WRITE_REGISTER: FunctionCode = 0x16;
/// Read/Write Multiple Registers (16-bit access)
pub const FUNC_CODE_READ_WRITE_MULTIPLE_REGISTERS: FunctionCode = 0x17;
/// Read FIFO Queue (16-bit access)
pub const FUNC_CODE_READ_FIFO_QUEUE: FunctionCode = 0x18;
/// Encapsulated Interface Transport, used for device identification
pub const FUNC_CODE_READ_DEVICE_IDENTIFICATION: FunctionCode = 0x2B;

/// MEI type selecting the device identification sub-function of 0x2B.
pub(crate) const MEI_TYPE_READ_DEVICE_IDENTIFICATION: u8 = 0x0E;

pub const EXCEPTION_CODE_ILLEGAL_FUNCTION: u8 = 1;
pub const EXCEPTION_CODE_ILLEGAL_DATA_ADDRESS: u8 = 2;
pub const EXCEPTION_CODE_ILLEGAL_DATA_VALUE: u8 = 3;
pub const EXCEPTION_CODE_SERVER_DEVICE_FAILURE: u8 = 4;
pub const EXCEPTION_CODE_ACKNOWLEDGE: u8 = 5;
pub const EXCEPTION_CODE_SERVER_DEVICE_BUSY: u8 = 6;
pub const EXCEPTION_CODE_MEMORY_PARITY_ERROR: u8 = 8;
pub const EXCEPTION_CODE_GATEWAY_PATH_UNAVAILABLE: u8 = 10;
pub const EXCEPTION_CODE_GATEWAY_TARGET_DEVICE_FAILED_TO_RESPOND: u8 = 11;

/// Human-readable name of a Modbus exception code.
pub(crate) fn exception_name(code: u8) -> &'static str {
    match code {
        EXCEPTION_CODE_ILLEGAL_FUNCTION => "illegal function",
        EXCEPTION_CODE_ILLEGAL_DATA_ADDRESS => "illegal data address",
        EXCEPTION_CODE_ILLEGAL_DATA_VALUE => "illegal data value",
        EXCEPTION_CODE_SERVER_DEVICE_FAILURE => "server device failure",
        EXCEPTION_CODE_ACKNOWLEDGE => "acknowledge",
        EXCEPTION_CODE_SERVER_DEVICE_BUSY => "server device busy",
        EXCEPTION_CODE_MEMORY_PARITY_ERROR => "memory parity error",
        EXCEPTION_CODE_GATEWAY_PATH_UNAVAILABLE => "gateway path unavailable",
        EXCEPTION_CODE_GATEWAY_TARGET_DEVICE_FAILED_TO_RESPOND => {
            "gateway target device failed to respond"
        }
        _ => "unknown",
    }
}

/// Read Device ID code for function 0x2B / MEI type 0x0E.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadDeviceIdCode {
    /// VendorName, ProductCode and MajorMinorRevision.
    Basic = 1,
    /// VendorUrl, ProductName, ModelName and UserApplicationName.
    Regular = 2,
    /// Regular plus private (custom) objects.
    Extended = 3,
}

impl ReadDeviceIdCode {
    /// First object id of the category, used to start a paged read.
    pub(crate) fn starting_object_id(self) -> u8 {
        match self {
            ReadDeviceIdCode::Basic => 0x00,
            ReadDeviceIdCode::Regular => 0x03,
            ReadDeviceIdCode::Extended => 0x80,
        }
    }
}

/// A protocol data unit: function code plus payload, independent of the
/// underlying transport framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    function: FunctionCode,
    data: Bytes,
}

impl Pdu {
    /// Maximum payload size so that the framed ADU fits every transport.
    pub const MAX_DATA_LEN: usize = 252;

    #[must_use]
    pub fn new(function: FunctionCode, data: impl Into<Bytes>) -> Self {
        Self {
            function,
            data: data.into(),
        }
    }

    #[must_use]
    pub fn function(&self) -> FunctionCode {
        self.function
    }

    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consumes the PDU and hands out its payload.
    #[must_use]
    pub fn into_data(self) -> Bytes {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_names() {
        assert_eq!(exception_name(2), "illegal data address");
        assert_eq!(exception_name(11), "gateway target device failed to respond");
        assert_eq!(exception_name(0x42), "unknown");
    }

    #[test]
    fn device_id_starting_objects() {
        assert_eq!(ReadDeviceIdCode::Basic.starting_object_id(), 0x00);
        assert_eq!(ReadDeviceIdCode::Regular.starting_object_id(), 0x03);
        assert_eq!(ReadDeviceIdCode::Extended.starting_object_id(), 0x80);
    }
}
