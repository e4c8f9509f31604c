// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! High-level Modbus client.
//!
//! The client validates argument ranges, builds request PDUs and runs them
//! through its packager and transporter pair: encode, send, verify the
//! response against the request, decode. Results are the raw payload bytes
//! of the response PDU; presentation (word order, scaling) is left to the
//! caller.

use std::collections::BTreeMap;
use std::io;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::Packager;
use crate::error::{Error, Result};
use crate::frame::{self, Pdu, ReadDeviceIdCode};
use crate::service::Transporter;
use crate::slave::Slave;

#[cfg(feature = "sync")]
pub mod sync;

/// Asynchronous Modbus client over one packager/transporter pair.
pub struct Client {
    packager: Box<dyn Packager>,
    transporter: Box<dyn Transporter>,
}

impl Client {
    /// Combines a packager and a transporter into a client.
    ///
    /// The packager must match the frame style the transporter speaks.
    /// Transports are clonable handles, so keeping a clone around allows
    /// closing the connection out-of-band.
    #[must_use]
    pub fn new(
        packager: impl Packager + 'static,
        transporter: impl Transporter + 'static,
    ) -> Self {
        Self {
            packager: Box::new(packager),
            transporter: Box::new(transporter),
        }
    }

    /// Builds a client from an address URL.
    ///
    /// Supported schemes: `tcp://host:port`, `udp://host:port`,
    /// `rtu:///dev/path`, `ascii:///dev/path`, `rtuovertcp://host:port`
    /// and `asciiovertcp://host:port`.
    pub fn connect(address: &str) -> Result<Self> {
        let Some((scheme, rest)) = address.split_once("://") else {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("missing scheme in address '{address}'"),
            )));
        };
        match scheme {
            #[cfg(feature = "tcp")]
            "tcp" => Ok(Self::tcp(crate::service::tcp::TcpConfig::new(rest))),
            #[cfg(feature = "udp")]
            "udp" => Ok(Self::rtu_over_udp(
                crate::service::rtu_over_udp::UdpConfig::new(rest),
            )),
            #[cfg(feature = "rtu")]
            "rtu" => Ok(Self::rtu(crate::service::serial::SerialConfig::new(rest))),
            #[cfg(feature = "ascii")]
            "ascii" => Ok(Self::ascii(crate::service::serial::SerialConfig::new(rest))),
            #[cfg(feature = "tcp")]
            "rtuovertcp" => Ok(Self::rtu_over_tcp(crate::service::tcp::TcpConfig::new(rest))),
            #[cfg(feature = "tcp")]
            "asciiovertcp" => Ok(Self::ascii_over_tcp(crate::service::tcp::TcpConfig::new(
                rest,
            ))),
            _ => Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported scheme '{scheme}' in address '{address}'"),
            ))),
        }
    }

    /// Modbus TCP (MBAP) client.
    #[cfg(feature = "tcp")]
    #[must_use]
    pub fn tcp(config: crate::service::tcp::TcpConfig) -> Self {
        let slave = config.slave;
        Self::new(
            crate::codec::tcp::TcpPackager::new(slave),
            crate::service::tcp::TcpTransporter::new(config),
        )
    }

    /// RTU-over-TCP client.
    #[cfg(feature = "tcp")]
    #[must_use]
    pub fn rtu_over_tcp(config: crate::service::tcp::TcpConfig) -> Self {
        let slave = config.slave;
        Self::new(
            crate::codec::rtu::RtuPackager::new(slave),
            crate::service::rtu_over_tcp::RtuOverTcpTransporter::new(config),
        )
    }

    /// ASCII-over-TCP client.
    #[cfg(feature = "tcp")]
    #[must_use]
    pub fn ascii_over_tcp(config: crate::service::tcp::TcpConfig) -> Self {
        let slave = config.slave;
        Self::new(
            crate::codec::ascii::AsciiPackager::new(slave),
            crate::service::ascii_over_tcp::AsciiOverTcpTransporter::new(config),
        )
    }

    /// RTU-over-UDP client.
    #[cfg(feature = "udp")]
    #[must_use]
    pub fn rtu_over_udp(config: crate::service::rtu_over_udp::UdpConfig) -> Self {
        let slave = config.slave;
        Self::new(
            crate::codec::rtu::RtuPackager::new(slave),
            crate::service::rtu_over_udp::RtuOverUdpTransporter::new(config),
        )
    }

    /// Serial-line RTU client.
    #[cfg(feature = "rtu")]
    #[must_use]
    pub fn rtu(config: crate::service::serial::SerialConfig) -> Self {
        let slave = config.slave;
        Self::new(
            crate::codec::rtu::RtuPackager::new(slave),
            crate::service::rtu::RtuTransporter::new(config),
        )
    }

    /// Serial-line ASCII client.
    #[cfg(feature = "ascii")]
    #[must_use]
    pub fn ascii(config: crate::service::serial::SerialConfig) -> Self {
        let slave = config.slave;
        Self::new(
            crate::codec::ascii::AsciiPackager::new(slave),
            crate::service::ascii::AsciiTransporter::new(config),
        )
    }

    /// Selects the slave device for all subsequent requests.
    pub fn set_slave(&mut self, slave: Slave) {
        self.packager.set_slave(slave);
    }

    /// Reads from 1 to 2000 contiguous coils (0x01) and returns the packed
    /// coil status bytes.
    pub async fn read_coils(&self, address: u16, quantity: u16) -> Result<Bytes> {
        check_quantity(quantity, 1, 2000)?;
        let request = Pdu::new(
            frame::FUNC_CODE_READ_COILS,
            data_block(&[address, quantity]),
        );
        let response = self.send_pdu(&request).await?;
        counted_payload(response)
    }

    /// Reads from 1 to 2000 contiguous discrete inputs (0x02) and returns
    /// the packed input status bytes.
    pub async fn read_discrete_inputs(&self, address: u16, quantity: u16) -> Result<Bytes> {
        check_quantity(quantity, 1, 2000)?;
        let request = Pdu::new(
            frame::FUNC_CODE_READ_DISCRETE_INPUTS,
            data_block(&[address, quantity]),
        );
        let response = self.send_pdu(&request).await?;
        counted_payload(response)
    }

    /// Reads from 1 to 125 contiguous holding registers (0x03) and returns
    /// the big-endian register bytes.
    pub async fn read_holding_registers(&self, address: u16, quantity: u16) -> Result<Bytes> {
        check_quantity(quantity, 1, 125)?;
        let request = Pdu::new(
            frame::FUNC_CODE_READ_HOLDING_REGISTERS,
            data_block(&[address, quantity]),
        );
        let response = self.send_pdu(&request).await?;
        register_payload(response, quantity)
    }

    /// Reads from 1 to 125 contiguous input registers (0x04) and returns
    /// the big-endian register bytes.
    pub async fn read_input_registers(&self, address: u16, quantity: u16) -> Result<Bytes> {
        check_quantity(quantity, 1, 125)?;
        let request = Pdu::new(
            frame::FUNC_CODE_READ_INPUT_REGISTERS,
            data_block(&[address, quantity]),
        );
        let response = self.send_pdu(&request).await?;
        register_payload(response, quantity)
    }

    /// Writes a single coil (0x05). The state must be 0xFF00 (ON) or
    /// 0x0000 (OFF); the device echoes it back.
    pub async fn write_single_coil(&self, address: u16, value: u16) -> Result<Bytes> {
        if value != 0xFF00 && value != 0x0000 {
            return Err(Error::InvalidCoilState(value));
        }
        let request = Pdu::new(
            frame::FUNC_CODE_WRITE_SINGLE_COIL,
            data_block(&[address, value]),
        );
        let response = self.send_pdu(&request).await?;
        let data = fixed_echo(response, 4, address)?;
        let got = BigEndian::read_u16(&data[2..4]);
        if got != value {
            return Err(Error::ValueMismatch {
                got,
                expected: value,
            });
        }
        Ok(data.slice(2..))
    }

    /// Writes a single holding register (0x06); the device echoes address
    /// and value.
    pub async fn write_single_register(&self, address: u16, value: u16) -> Result<Bytes> {
        let request = Pdu::new(
            frame::FUNC_CODE_WRITE_SINGLE_REGISTER,
            data_block(&[address, value]),
        );
        let response = self.send_pdu(&request).await?;
        let data = fixed_echo(response, 4, address)?;
        let got = BigEndian::read_u16(&data[2..4]);
        if got != value {
            return Err(Error::ValueMismatch {
                got,
                expected: value,
            });
        }
        Ok(data.slice(2..))
    }

    /// Forces a sequence of 1 to 1968 coils (0x0F). `values` carries the
    /// packed coil bits; the device echoes address and quantity.
    pub async fn write_multiple_coils(
        &self,
        address: u16,
        quantity: u16,
        values: &[u8],
    ) -> Result<Bytes> {
        check_quantity(quantity, 1, 1968)?;
        let request = Pdu::new(
            frame::FUNC_CODE_WRITE_MULTIPLE_COILS,
            data_block_suffix(values, &[address, quantity]),
        );
        let response = self.send_pdu(&request).await?;
        let data = fixed_echo(response, 4, address)?;
        let got = BigEndian::read_u16(&data[2..4]);
        if got != quantity {
            return Err(Error::QuantityMismatch {
                got,
                expected: quantity,
            });
        }
        Ok(data.slice(2..))
    }

    /// Writes a block of 1 to 123 holding registers (0x10). `values`
    /// carries the big-endian register bytes; the device echoes address
    /// and quantity.
    pub async fn write_multiple_registers(
        &self,
        address: u16,
        quantity: u16,
        values: &[u8],
    ) -> Result<Bytes> {
        check_quantity(quantity, 1, 123)?;
        let request = Pdu::new(
            frame::FUNC_CODE_WRITE_MULTIPLE_REGISTERS,
            data_block_suffix(values, &[address, quantity]),
        );
        let response = self.send_pdu(&request).await?;
        let data = fixed_echo(response, 4, address)?;
        let got = BigEndian::read_u16(&data[2..4]);
        if got != quantity {
            return Err(Error::QuantityMismatch {
                got,
                expected: quantity,
            });
        }
        Ok(data.slice(2..))
    }

    /// Modifies a holding register with an AND mask and an OR mask (0x16);
    /// the device echoes address and masks.
    pub async fn mask_write_register(
        &self,
        address: u16,
        and_mask: u16,
        or_mask: u16,
    ) -> Result<Bytes> {
        let request = Pdu::new(
            frame::FUNC_CODE_MASK_WRITE_REGISTER,
            data_block(&[address, and_mask, or_mask]),
        );
        let response = self.send_pdu(&request).await?;
        let data = fixed_echo(response, 6, address)?;
        let got = BigEndian::read_u16(&data[2..4]);
        if got != and_mask {
            return Err(Error::MaskMismatch {
                got,
                expected: and_mask,
            });
        }
        let got = BigEndian::read_u16(&data[4..6]);
        if got != or_mask {
            return Err(Error::MaskMismatch {
                got,
                expected: or_mask,
            });
        }
        Ok(data.slice(2..))
    }

    /// Performs a combined write-then-read (0x17): writes 1 to 121
    /// registers and reads 1 to 125, returning the read register bytes.
    pub async fn read_write_multiple_registers(
        &self,
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        write_quantity: u16,
        values: &[u8],
    ) -> Result<Bytes> {
        check_quantity(read_quantity, 1, 125)?;
        check_quantity(write_quantity, 1, 121)?;
        let request = Pdu::new(
            frame::FUNC_CODE_READ_WRITE_MULTIPLE_REGISTERS,
            data_block_suffix(
                values,
                &[read_address, read_quantity, write_address, write_quantity],
            ),
        );
        let response = self.send_pdu(&request).await?;
        counted_payload(response)
    }

    /// Reads the FIFO queue of registers at the given pointer address
    /// (0x18) and returns the queued register bytes.
    pub async fn read_fifo_queue(&self, address: u16) -> Result<Bytes> {
        let request = Pdu::new(frame::FUNC_CODE_READ_FIFO_QUEUE, data_block(&[address]));
        let response = self.send_pdu(&request).await?;
        let data = response.into_data();
        if data.len() < 4 {
            return Err(Error::DataSize {
                expected: 4,
                actual: data.len(),
            });
        }
        let byte_count = usize::from(BigEndian::read_u16(&data[0..2]));
        if byte_count != data.len() - 2 {
            return Err(Error::DataSize {
                expected: byte_count,
                actual: data.len() - 2,
            });
        }
        let fifo_count = BigEndian::read_u16(&data[2..4]);
        if fifo_count > 31 {
            return Err(Error::FifoCount(fifo_count));
        }
        Ok(data.slice(4..))
    }

    /// Reads the device identification objects (0x2B / MEI 0x0E) of the
    /// given category, following "More Follows" paging until all objects
    /// have been collected.
    pub async fn read_device_identification(
        &self,
        id_code: ReadDeviceIdCode,
    ) -> Result<BTreeMap<u8, Bytes>> {
        self.read_device_identification_with_offset(id_code, 0)
            .await
    }

    /// Like [`read_device_identification`](Self::read_device_identification),
    /// but starts at an object id offset within the category.
    pub async fn read_device_identification_with_offset(
        &self,
        id_code: ReadDeviceIdCode,
        object_id_offset: u8,
    ) -> Result<BTreeMap<u8, Bytes>> {
        let mut results = BTreeMap::new();
        let mut object_id = id_code.starting_object_id().wrapping_add(object_id_offset);
        loop {
            let request = Pdu::new(
                frame::FUNC_CODE_READ_DEVICE_IDENTIFICATION,
                Bytes::from(vec![
                    frame::MEI_TYPE_READ_DEVICE_IDENTIFICATION,
                    id_code as u8,
                    object_id,
                ]),
            );
            let response = self.send_pdu(&request).await?;
            let data = response.data();
            if data.len() < 6 {
                return Err(Error::DataSize {
                    expected: 6,
                    actual: data.len(),
                });
            }
            let more_follows = data[3];
            let next_object_id = data[4];
            let num_objects = usize::from(data[5]);

            let mut offset = 6;
            for index in 0..num_objects {
                if data.len() < offset + 2 {
                    return Err(Error::DeviceIdObject(index));
                }
                let id = data[offset];
                let length = usize::from(data[offset + 1]);
                let start = offset + 2;
                let end = start + length;
                if data.len() < end {
                    return Err(Error::DeviceIdObject(index));
                }
                results.insert(id, data.slice(start..end));
                offset = end;
            }

            if more_follows != 0xFF || next_object_id == 0x00 {
                return Ok(results);
            }
            object_id = next_object_id;
        }
    }

    /// Encodes and sends a request PDU, verifies and decodes the response
    /// and maps exception replies to a typed error.
    async fn send_pdu(&self, request: &Pdu) -> Result<Pdu> {
        let request_adu = self.packager.encode(request)?;
        let response_adu = self.transporter.send(&request_adu).await?;
        self.packager.verify(&request_adu, &response_adu)?;
        let response = self.packager.decode(&response_adu)?;
        if response.function() != request.function() {
            let code = response.data().first().copied().unwrap_or_default();
            return Err(Error::Exception {
                function: response.function(),
                code,
            });
        }
        if response.data().is_empty() {
            return Err(Error::EmptyResponse);
        }
        Ok(response)
    }
}

fn check_quantity(quantity: u16, min: u16, max: u16) -> Result<()> {
    if quantity < min || quantity > max {
        return Err(Error::ArgumentRange {
            value: quantity,
            min,
            max,
        });
    }
    Ok(())
}

/// Serializes a sequence of big-endian words.
fn data_block(values: &[u16]) -> Bytes {
    let mut data = BytesMut::with_capacity(2 * values.len());
    for value in values {
        data.put_u16(*value);
    }
    data.freeze()
}

/// Serializes a sequence of big-endian words followed by a byte-counted
/// suffix.
fn data_block_suffix(suffix: &[u8], values: &[u16]) -> Bytes {
    let mut data = BytesMut::with_capacity(2 * values.len() + 1 + suffix.len());
    for value in values {
        data.put_u16(*value);
    }
    data.put_u8(suffix.len() as u8);
    data.put_slice(suffix);
    data.freeze()
}

/// Splits off the byte-counted payload of a read response.
fn counted_payload(response: Pdu) -> Result<Bytes> {
    let data = response.into_data();
    let count = usize::from(data[0]);
    let length = data.len() - 1;
    if count != length {
        return Err(Error::DataSize {
            expected: count,
            actual: length,
        });
    }
    Ok(data.slice(1..))
}

/// Like [`counted_payload`], additionally checking the register count
/// implied by the request quantity.
fn register_payload(response: Pdu, quantity: u16) -> Result<Bytes> {
    let payload = counted_payload(response)?;
    let expected = 2 * usize::from(quantity);
    if payload.len() != expected {
        return Err(Error::DataSize {
            expected,
            actual: payload.len(),
        });
    }
    Ok(payload)
}

/// Checks the fixed length of a write response and the echoed address.
fn fixed_echo(response: Pdu, expected_len: usize, address: u16) -> Result<Bytes> {
    let data = response.into_data();
    if data.len() != expected_len {
        return Err(Error::DataSize {
            expected: expected_len,
            actual: data.len(),
        });
    }
    let got = BigEndian::read_u16(&data[0..2]);
    if got != address {
        return Err(Error::AddressMismatch {
            got,
            expected: address,
        });
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::codec::rtu::RtuPackager;

    /// Hands out canned ADUs and records every request it sees.
    #[derive(Default)]
    struct MockTransporter {
        responses: Mutex<VecDeque<Bytes>>,
        requests: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl Transporter for MockTransporter {
        async fn send(&self, request: &[u8]) -> Result<Bytes> {
            self.requests.lock().unwrap().push(request.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "no reply")))
        }
    }

    fn rtu_client(responses: Vec<Pdu>) -> Client {
        let server = RtuPackager::new(Slave(0x11));
        let queue = responses
            .iter()
            .map(|pdu| server.encode(pdu).unwrap())
            .collect();
        Client::new(
            RtuPackager::new(Slave(0x11)),
            MockTransporter {
                responses: Mutex::new(queue),
                requests: Mutex::new(Vec::new()),
            },
        )
    }

    #[tokio::test]
    async fn read_holding_registers_returns_register_bytes() {
        let client = rtu_client(vec![Pdu::new(0x03, &[0x04, 0xCA, 0xFE, 0xBA, 0xBE][..])]);
        let payload = client.read_holding_registers(0x006B, 2).await.unwrap();
        assert_eq!(&payload[..], &[0xCA, 0xFE, 0xBA, 0xBE]);
    }

    #[tokio::test]
    async fn read_rejects_out_of_range_quantities() {
        let client = rtu_client(vec![]);
        assert!(matches!(
            client.read_coils(0, 0).await,
            Err(Error::ArgumentRange {
                value: 0,
                min: 1,
                max: 2000
            })
        ));
        assert!(matches!(
            client.read_holding_registers(0, 126).await,
            Err(Error::ArgumentRange { .. })
        ));
        assert!(matches!(
            client.read_write_multiple_registers(0, 1, 0, 122, &[0, 0]).await,
            Err(Error::ArgumentRange { .. })
        ));
    }

    #[tokio::test]
    async fn exception_response_maps_to_typed_error() {
        let client = rtu_client(vec![Pdu::new(0x83, &[0x02][..])]);
        assert!(matches!(
            client.read_holding_registers(0, 1).await,
            Err(Error::Exception {
                function: 0x83,
                code: 0x02
            })
        ));
    }

    #[tokio::test]
    async fn empty_response_is_rejected() {
        let client = rtu_client(vec![Pdu::new(0x03, Bytes::new())]);
        assert!(matches!(
            client.read_holding_registers(0, 1).await,
            Err(Error::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn byte_count_mismatch_is_rejected() {
        // Announces 4 bytes but carries 2.
        let client = rtu_client(vec![Pdu::new(0x03, &[0x04, 0xCA, 0xFE][..])]);
        assert!(matches!(
            client.read_holding_registers(0, 2).await,
            Err(Error::DataSize {
                expected: 4,
                actual: 2
            })
        ));
    }

    #[tokio::test]
    async fn write_single_coil_validates_state_and_echo() {
        let client = rtu_client(vec![]);
        assert!(matches!(
            client.write_single_coil(0x00AC, 0x1234).await,
            Err(Error::InvalidCoilState(0x1234))
        ));

        let client = rtu_client(vec![Pdu::new(0x05, &[0x00, 0xAC, 0xFF, 0x00][..])]);
        let echoed = client.write_single_coil(0x00AC, 0xFF00).await.unwrap();
        assert_eq!(&echoed[..], &[0xFF, 0x00]);

        let client = rtu_client(vec![Pdu::new(0x05, &[0x00, 0xAD, 0xFF, 0x00][..])]);
        assert!(matches!(
            client.write_single_coil(0x00AC, 0xFF00).await,
            Err(Error::AddressMismatch {
                got: 0x00AD,
                expected: 0x00AC
            })
        ));
    }

    #[tokio::test]
    async fn write_multiple_registers_checks_quantity_echo() {
        let client = rtu_client(vec![Pdu::new(0x10, &[0x00, 0x01, 0x00, 0x02][..])]);
        let echoed = client
            .write_multiple_registers(0x0001, 2, &[0x00, 0x0A, 0x01, 0x02])
            .await
            .unwrap();
        assert_eq!(&echoed[..], &[0x00, 0x02]);

        let client = rtu_client(vec![Pdu::new(0x10, &[0x00, 0x01, 0x00, 0x03][..])]);
        assert!(matches!(
            client
                .write_multiple_registers(0x0001, 2, &[0x00, 0x0A, 0x01, 0x02])
                .await,
            Err(Error::QuantityMismatch {
                got: 3,
                expected: 2
            })
        ));
    }

    #[tokio::test]
    async fn mask_write_register_checks_mask_echo() {
        let client = rtu_client(vec![Pdu::new(
            0x16,
            &[0x00, 0x04, 0x00, 0xF2, 0x00, 0x25][..],
        )]);
        let echoed = client.mask_write_register(0x0004, 0x00F2, 0x0025).await.unwrap();
        assert_eq!(&echoed[..], &[0x00, 0xF2, 0x00, 0x25]);

        let client = rtu_client(vec![Pdu::new(
            0x16,
            &[0x00, 0x04, 0x00, 0xF2, 0x00, 0x26][..],
        )]);
        assert!(matches!(
            client.mask_write_register(0x0004, 0x00F2, 0x0025).await,
            Err(Error::MaskMismatch {
                got: 0x26,
                expected: 0x25
            })
        ));
    }

    #[tokio::test]
    async fn read_fifo_queue_unpacks_count_fields() {
        // Byte count 6 = fifo count field plus two registers.
        let client = rtu_client(vec![Pdu::new(
            0x18,
            &[0x00, 0x06, 0x00, 0x02, 0x01, 0xB8, 0x12, 0x84][..],
        )]);
        let payload = client.read_fifo_queue(0x04DE).await.unwrap();
        assert_eq!(&payload[..], &[0x01, 0xB8, 0x12, 0x84]);

        let client = rtu_client(vec![Pdu::new(
            0x18,
            &[0x00, 0x06, 0x00, 0x20, 0x01, 0xB8, 0x12, 0x84][..],
        )]);
        assert!(matches!(
            client.read_fifo_queue(0x04DE).await,
            Err(Error::FifoCount(0x20))
        ));
    }

    #[tokio::test]
    async fn device_identification_follows_paging() {
        // First page: more follows, next object id 0x02, one object.
        let first = Pdu::new(
            0x2B,
            &[
                0x0E, 0x01, 0x01, 0xFF, 0x02, 0x01, // header
                0x00, 0x03, b'A', b'c', b'm', // object 0x00: "Acm"
            ][..],
        );
        // Second page: no more, one object.
        let second = Pdu::new(
            0x2B,
            &[
                0x0E, 0x01, 0x01, 0x00, 0x00, 0x01, // header
                0x02, 0x04, b'v', b'1', b'.', b'2', // object 0x02: "v1.2"
            ][..],
        );
        let client = rtu_client(vec![first, second]);
        let objects = client
            .read_device_identification(ReadDeviceIdCode::Basic)
            .await
            .unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(&objects[&0x00][..], b"Acm");
        assert_eq!(&objects[&0x02][..], b"v1.2");
    }

    #[tokio::test]
    async fn truncated_device_identification_object_is_rejected() {
        let response = Pdu::new(0x2B, &[0x0E, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x09][..]);
        let client = rtu_client(vec![response]);
        assert!(matches!(
            client.read_device_identification(ReadDeviceIdCode::Basic).await,
            Err(Error::DeviceIdObject(0))
        ));
    }
}
