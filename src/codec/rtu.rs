// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RTU framing for the serial line and its TCP/UDP tunnelled variants.

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::crc::Crc16;
use crate::codec::Packager;
use crate::error::{Error, Result};
use crate::frame::{self, Pdu};
use crate::slave::Slave;

/// Smallest possible RTU frame: slave id, function code and CRC.
pub(crate) const RTU_MIN_SIZE: usize = 4;

/// Maximum size of an RTU ADU.
pub(crate) const RTU_MAX_SIZE: usize = 256;

/// Size of an RTU exception response.
pub(crate) const RTU_EXCEPTION_SIZE: usize = 5;

/// Packager for the RTU frame style.
#[derive(Debug)]
pub struct RtuPackager {
    slave: Slave,
}

impl RtuPackager {
    #[must_use]
    pub fn new(slave: Slave) -> Self {
        Self { slave }
    }
}

impl Packager for RtuPackager {
    fn set_slave(&mut self, slave: Slave) {
        self.slave = slave;
    }

    fn encode(&self, pdu: &Pdu) -> Result<Bytes> {
        let length = pdu.data().len() + RTU_MIN_SIZE;
        if length > RTU_MAX_SIZE {
            return Err(Error::FrameLength {
                length,
                max: RTU_MAX_SIZE,
            });
        }
        let mut adu = BytesMut::with_capacity(length);
        adu.put_u8(self.slave.into());
        adu.put_u8(pdu.function());
        adu.put_slice(pdu.data());

        let mut crc = Crc16::new();
        crc.push_slice(&adu);
        let checksum = crc.value();
        // Low byte precedes the high byte on the wire.
        adu.put_u8(checksum as u8);
        adu.put_u8((checksum >> 8) as u8);
        Ok(adu.freeze())
    }

    fn verify(&self, request: &[u8], response: &[u8]) -> Result<()> {
        if response.len() < RTU_MIN_SIZE {
            return Err(Error::ShortFrame {
                length: response.len(),
                min: RTU_MIN_SIZE,
            });
        }
        if response[0] != request[0] {
            return Err(Error::SlaveIdMismatch {
                got: response[0],
                expected: request[0],
            });
        }
        Ok(())
    }

    fn decode(&self, adu: &[u8]) -> Result<Pdu> {
        let length = adu.len();
        if length < RTU_MIN_SIZE {
            return Err(Error::ShortFrame {
                length,
                min: RTU_MIN_SIZE,
            });
        }
        let mut crc = Crc16::new();
        crc.push_slice(&adu[..length - 2]);
        let got = u16::from(adu[length - 1]) << 8 | u16::from(adu[length - 2]);
        if got != crc.value() {
            return Err(Error::ChecksumMismatch {
                got,
                expected: crc.value(),
            });
        }
        Ok(Pdu::new(
            adu[1],
            Bytes::copy_from_slice(&adu[2..length - 2]),
        ))
    }
}

/// Expected total length of the RTU response to the given request ADU, or
/// `None` when the layout does not determine it up front (FIFO queue reads,
/// whose byte count only arrives with the response itself).
pub(crate) fn calculate_response_length(request: &[u8]) -> Option<usize> {
    if request.len() < 6 {
        return Some(RTU_MIN_SIZE);
    }
    let mut length = RTU_MIN_SIZE;
    match request[1] {
        frame::FUNC_CODE_READ_COILS | frame::FUNC_CODE_READ_DISCRETE_INPUTS => {
            let count = usize::from(BigEndian::read_u16(&request[4..6]));
            length += 1 + count / 8;
            if count % 8 != 0 {
                length += 1;
            }
        }
        frame::FUNC_CODE_READ_HOLDING_REGISTERS
        | frame::FUNC_CODE_READ_INPUT_REGISTERS
        | frame::FUNC_CODE_READ_WRITE_MULTIPLE_REGISTERS => {
            let count = usize::from(BigEndian::read_u16(&request[4..6]));
            length += 1 + count * 2;
        }
        frame::FUNC_CODE_WRITE_SINGLE_COIL
        | frame::FUNC_CODE_WRITE_SINGLE_REGISTER
        | frame::FUNC_CODE_WRITE_MULTIPLE_COILS
        | frame::FUNC_CODE_WRITE_MULTIPLE_REGISTERS => {
            length += 4;
        }
        frame::FUNC_CODE_MASK_WRITE_REGISTER => {
            length += 6;
        }
        frame::FUNC_CODE_READ_FIFO_QUEUE => {
            return None;
        }
        _ => {}
    }
    Some(length)
}
