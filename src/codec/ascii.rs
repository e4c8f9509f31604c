// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ASCII framing for the serial line and its TCP tunnelled variant.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::lrc::Lrc;
use crate::codec::Packager;
use crate::error::{Error, Result};
use crate::frame::Pdu;
use crate::slave::Slave;

/// Canonical start character. The specification defines ':' but '>' is a
/// common deviation in the field, so [`verify`](Packager::verify) accepts
/// both on receive; only ':' is ever emitted.
pub(crate) const ASCII_START: u8 = b':';
pub(crate) const ASCII_ALT_START: u8 = b'>';

/// Frame terminator.
pub(crate) const ASCII_END: &[u8] = b"\r\n";

/// Shortest prefix that lets a reader look for the terminator.
pub(crate) const ASCII_MIN_SIZE: usize = 3;

/// Maximum size of an ASCII ADU in characters.
pub(crate) const ASCII_MAX_SIZE: usize = 513;

/// Smallest complete frame: start char, slave id, function code and LRC as
/// hex pairs, plus CRLF.
const ASCII_MIN_FRAME: usize = ASCII_MIN_SIZE + 6;

const HEX_TABLE: &[u8; 16] = b"0123456789ABCDEF";

/// Packager for the ASCII frame style.
#[derive(Debug)]
pub struct AsciiPackager {
    slave: Slave,
}

impl AsciiPackager {
    #[must_use]
    pub fn new(slave: Slave) -> Self {
        Self { slave }
    }
}

impl Packager for AsciiPackager {
    fn set_slave(&mut self, slave: Slave) {
        self.slave = slave;
    }

    fn encode(&self, pdu: &Pdu) -> Result<Bytes> {
        let slave_id: u8 = self.slave.into();
        let mut adu = BytesMut::with_capacity(ASCII_MIN_FRAME + 2 * pdu.data().len());
        adu.put_u8(ASCII_START);
        push_hex(&mut adu, &[slave_id, pdu.function()]);
        push_hex(&mut adu, pdu.data());
        // The LRC excludes the start character and the CRLF terminator.
        let mut lrc = Lrc::new();
        lrc.push(slave_id).push(pdu.function()).push_slice(pdu.data());
        push_hex(&mut adu, &[lrc.value()]);
        adu.put_slice(ASCII_END);
        Ok(adu.freeze())
    }

    fn verify(&self, request: &[u8], response: &[u8]) -> Result<()> {
        let length = response.len();
        if length < ASCII_MIN_FRAME {
            return Err(Error::ShortFrame {
                length,
                min: ASCII_MIN_FRAME,
            });
        }
        // Length excluding the start character must be an even number.
        if length % 2 != 1 {
            return Err(Error::AsciiOddLength(length - 1));
        }
        if response[0] != ASCII_START && response[0] != ASCII_ALT_START {
            return Err(Error::AsciiStart(response[0]));
        }
        if &response[length - ASCII_END.len()..] != ASCII_END {
            return Err(Error::AsciiTerminator);
        }
        let got = read_hex(&response[1..])?;
        let expected = read_hex(&request[1..])?;
        if got != expected {
            return Err(Error::SlaveIdMismatch { got, expected });
        }
        Ok(())
    }

    fn decode(&self, adu: &[u8]) -> Result<Pdu> {
        if adu.len() < ASCII_MIN_FRAME {
            return Err(Error::ShortFrame {
                length: adu.len(),
                min: ASCII_MIN_FRAME,
            });
        }
        let slave_id = read_hex(&adu[1..])?;
        let function = read_hex(&adu[3..])?;
        // Everything between the function code and the LRC is payload.
        let data_end = adu.len() - 4;
        let data = decode_hex(&adu[5..data_end])?;

        let got = read_hex(&adu[data_end..])?;
        let mut lrc = Lrc::new();
        lrc.push(slave_id).push(function).push_slice(&data);
        if got != lrc.value() {
            return Err(Error::ChecksumMismatch {
                got: got.into(),
                expected: lrc.value().into(),
            });
        }
        Ok(Pdu::new(function, data))
    }
}

/// Appends the uppercase two-character hex encoding of each byte.
fn push_hex(buf: &mut BytesMut, bytes: &[u8]) {
    for byte in bytes {
        buf.put_u8(HEX_TABLE[usize::from(byte >> 4)]);
        buf.put_u8(HEX_TABLE[usize::from(byte & 0x0F)]);
    }
}

fn hex_digit(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        _ => Err(Error::AsciiHexDigit(c)),
    }
}

/// Decodes the two leading hex characters into one byte, e.g. "8C" => 0x8C.
pub(crate) fn read_hex(chars: &[u8]) -> Result<u8> {
    if chars.len() < 2 {
        return Err(Error::ShortFrame {
            length: chars.len(),
            min: 2,
        });
    }
    Ok(hex_digit(chars[0])? << 4 | hex_digit(chars[1])?)
}

fn decode_hex(chars: &[u8]) -> Result<Bytes> {
    if chars.len() % 2 != 0 {
        return Err(Error::AsciiOddLength(chars.len()));
    }
    let mut decoded = BytesMut::with_capacity(chars.len() / 2);
    for pair in chars.chunks_exact(2) {
        decoded.put_u8(hex_digit(pair[0])? << 4 | hex_digit(pair[1])?);
    }
    Ok(decoded.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_read_request() {
        let packager = AsciiPackager::new(Slave(17));
        let pdu = Pdu::new(3, &[0x00, 0x6B, 0x00, 0x03][..]);
        let adu = packager.encode(&pdu).unwrap();
        assert_eq!(&adu[..], b":1103006B00037E\r\n");
    }

    #[test]
    fn decode_response() {
        let packager = AsciiPackager::new(Slave(247));
        let pdu = packager.decode(b":F7031389000A60\r\n").unwrap();
        assert_eq!(pdu.function(), 3);
        assert_eq!(&pdu.data()[..], &[0x13, 0x89, 0x00, 0x0A]);
    }

    #[test]
    fn decode_rejects_bad_lrc() {
        let packager = AsciiPackager::new(Slave(247));
        assert!(matches!(
            packager.decode(b":F7031389000A61\r\n"),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn round_trip() {
        let packager = AsciiPackager::new(Slave(10));
        let pdu = Pdu::new(1, &[0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09][..]);
        let adu = packager.encode(&pdu).unwrap();
        assert_eq!(packager.decode(&adu).unwrap(), pdu);
    }

    #[test]
    fn verify_accepts_both_start_characters() {
        let packager = AsciiPackager::new(Slave(1));
        let request = b":010300010002F9\r\n";
        assert!(packager.verify(request, b":010304010F1509CA\r\n").is_ok());
        // Not conforming, but common in the field.
        assert!(packager.verify(request, b">010304010F1509CA\r\n").is_ok());
        assert!(matches!(
            packager.verify(request, b"!010304010F1509CA\r\n"),
            Err(Error::AsciiStart(b'!'))
        ));
    }

    #[test]
    fn verify_frame_boundaries() {
        let packager = AsciiPackager::new(Slave(1));
        let request = b":010300010002F9\r\n";
        assert!(matches!(
            packager.verify(request, b":01CA\r\n"),
            Err(Error::ShortFrame { .. })
        ));
        assert!(matches!(
            packager.verify(request, b":010304010F159CA\r\n"),
            Err(Error::AsciiOddLength(_))
        ));
        assert!(matches!(
            packager.verify(request, b":010304010F1509CA\r\r"),
            Err(Error::AsciiTerminator)
        ));
    }

    #[test]
    fn verify_slave_id_echo() {
        let packager = AsciiPackager::new(Slave(1));
        let request = b":010300010002F9\r\n";
        assert!(matches!(
            packager.verify(request, b":020304010F1509CA\r\n"),
            Err(Error::SlaveIdMismatch {
                got: 2,
                expected: 1
            })
        ));
    }
}
