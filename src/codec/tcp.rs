// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MBAP framing for Modbus TCP.

use std::sync::atomic::{AtomicU32, Ordering};

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::Packager;
use crate::error::{Error, Result};
use crate::frame::Pdu;
use crate::slave::Slave;

/// Size of the MBAP prefix: transaction id (2), protocol id (2),
/// length (2), unit id (1).
pub(crate) const TCP_HEADER_LEN: usize = 7;

/// Maximum size of an MBAP ADU.
pub(crate) const TCP_MAX_LENGTH: usize = 260;

const TCP_PROTOCOL_ID: u16 = 0x0000;

/// Packager for the MBAP frame style.
///
/// Owns the 32-bit transaction counter; only its low 16 bits enter the
/// header. The counter is atomic so that a shared packager could encode
/// concurrently without ever repeating a transaction id.
#[derive(Debug)]
pub struct TcpPackager {
    transaction_id: AtomicU32,
    slave: Slave,
}

impl TcpPackager {
    #[must_use]
    pub fn new(slave: Slave) -> Self {
        Self {
            transaction_id: AtomicU32::new(0),
            slave,
        }
    }

    fn next_transaction_id(&self) -> u16 {
        // The counter holds the id of the previous frame, so the increment
        // happens before truncation.
        let next = self.transaction_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        next as u16
    }
}

impl Packager for TcpPackager {
    fn set_slave(&mut self, slave: Slave) {
        self.slave = slave;
    }

    fn encode(&self, pdu: &Pdu) -> Result<Bytes> {
        let mut adu = BytesMut::with_capacity(TCP_HEADER_LEN + 1 + pdu.data().len());
        adu.put_u16(self.next_transaction_id());
        adu.put_u16(TCP_PROTOCOL_ID);
        // Length = sizeof(unit id) + sizeof(function code) + data
        adu.put_u16(1 + 1 + pdu.data().len() as u16);
        adu.put_u8(self.slave.into());
        adu.put_u8(pdu.function());
        adu.put_slice(pdu.data());
        Ok(adu.freeze())
    }

    fn verify(&self, request: &[u8], response: &[u8]) -> Result<()> {
        verify_response(request, response)
    }

    fn decode(&self, adu: &[u8]) -> Result<Pdu> {
        if adu.len() < TCP_HEADER_LEN {
            return Err(Error::ShortFrame {
                length: adu.len(),
                min: TCP_HEADER_LEN + 1,
            });
        }
        let length = usize::from(BigEndian::read_u16(&adu[4..6]));
        let pdu_len = adu.len() - TCP_HEADER_LEN;
        if pdu_len == 0 || pdu_len != length.saturating_sub(1) {
            return Err(Error::DataSize {
                expected: length.saturating_sub(1),
                actual: pdu_len,
            });
        }
        Ok(Pdu::new(
            adu[TCP_HEADER_LEN],
            Bytes::copy_from_slice(&adu[TCP_HEADER_LEN + 1..]),
        ))
    }
}

/// Compares the MBAP identity fields of a response against the request.
///
/// Exposed to the TCP transport, which classifies the returned variants to
/// drive its recovery loops.
pub(crate) fn verify_response(request: &[u8], response: &[u8]) -> Result<()> {
    if request.len() < TCP_HEADER_LEN || response.len() < TCP_HEADER_LEN {
        return Err(Error::ShortFrame {
            length: response.len().min(request.len()),
            min: TCP_HEADER_LEN,
        });
    }
    let got = BigEndian::read_u16(&response[0..2]);
    let expected = BigEndian::read_u16(&request[0..2]);
    if got != expected {
        return Err(Error::TransactionIdMismatch { got, expected });
    }
    let got = BigEndian::read_u16(&response[2..4]);
    let expected = BigEndian::read_u16(&request[2..4]);
    if got != expected {
        return Err(Error::ProtocolIdMismatch { got, expected });
    }
    if response[6] != request[6] {
        return Err(Error::UnitIdMismatch {
            got: response[6],
            expected: request[6],
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_first_request() {
        let packager = TcpPackager::new(Slave(0));
        let pdu = Pdu::new(3, &[0x00, 0x04, 0x00, 0x03][..]);
        let adu = packager.encode(&pdu).unwrap();
        assert_eq!(
            &adu[..],
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x00, 0x03, 0x00, 0x04, 0x00, 0x03]
        );
    }

    #[test]
    fn transaction_ids_increase_strictly() {
        let packager = TcpPackager::new(Slave(17));
        let pdu = Pdu::new(3, &[0x00, 0x04, 0x00, 0x03][..]);
        let mut previous = 0u16;
        for _ in 0..5 {
            let adu = packager.encode(&pdu).unwrap();
            let tx_id = BigEndian::read_u16(&adu[0..2]);
            assert_eq!(tx_id, previous.wrapping_add(1));
            previous = tx_id;
        }
    }

    #[test]
    fn counter_wraps_through_low_16_bits() {
        let packager = TcpPackager {
            transaction_id: AtomicU32::new(0xFFFF),
            slave: Slave(0),
        };
        let pdu = Pdu::new(3, Bytes::new());
        let adu = packager.encode(&pdu).unwrap();
        assert_eq!(BigEndian::read_u16(&adu[0..2]), 0x0000);
    }

    #[test]
    fn length_field_invariant() {
        let packager = TcpPackager::new(Slave(5));
        for data_len in [0usize, 1, 4, 100, 252] {
            let pdu = Pdu::new(0x10, vec![0xAB; data_len]);
            let adu = packager.encode(&pdu).unwrap();
            let length = usize::from(BigEndian::read_u16(&adu[4..6]));
            assert_eq!(length, adu.len() - 6);
        }
    }

    #[test]
    fn decode_response() {
        let packager = TcpPackager::new(Slave(17));
        let adu = [0, 1, 0, 0, 0, 6, 17, 3, 0, 120, 0, 3];
        let pdu = packager.decode(&adu).unwrap();
        assert_eq!(pdu.function(), 3);
        assert_eq!(&pdu.data()[..], &[0, 120, 0, 3]);
    }

    #[test]
    fn decode_rejects_inconsistent_length() {
        let packager = TcpPackager::new(Slave(17));
        // Header announces 6 bytes after the unit id, frame carries 4.
        let adu = [0, 1, 0, 0, 0, 6, 17, 3, 0, 120];
        assert!(matches!(
            packager.decode(&adu),
            Err(Error::DataSize {
                expected: 5,
                actual: 3
            })
        ));
    }

    #[test]
    fn round_trip() {
        let packager = TcpPackager::new(Slave(0xFE));
        let pdu = Pdu::new(0x04, &[0x12, 0x34, 0x56][..]);
        let adu = packager.encode(&pdu).unwrap();
        assert_eq!(packager.decode(&adu).unwrap(), pdu);
    }

    #[test]
    fn verify_transaction_id_mismatch() {
        let request = [0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x11];
        let response = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x11];
        assert!(matches!(
            verify_response(&request, &response),
            Err(Error::TransactionIdMismatch {
                got: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn verify_protocol_and_unit_id() {
        let request = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x11];
        let bad_proto = [0x00, 0x01, 0x33, 0x12, 0x00, 0x06, 0x11];
        assert!(matches!(
            verify_response(&request, &bad_proto),
            Err(Error::ProtocolIdMismatch { .. })
        ));
        let bad_unit = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x12];
        assert!(matches!(
            verify_response(&request, &bad_unit),
            Err(Error::UnitIdMismatch {
                got: 0x12,
                expected: 0x11
            })
        ));
        let good = [0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x11];
        assert!(verify_response(&request, &good).is_ok());
    }
}
