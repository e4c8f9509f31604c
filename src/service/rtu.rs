// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serial-line RTU transport.
//!
//! RTU frames carry no length field up front, so the response is parsed
//! incrementally, one byte at a time, with the expected layout derived from
//! the function code. Inter-frame silence follows the MODBUS Serial Line
//! specification: at baud rates above 19200 the frame delay is a fixed
//! 1750 µs, below that it is 3.5 character durations.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use smallvec::SmallVec;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_serial::SerialPort as _;

use crate::codec::rtu::{calculate_response_length, RTU_MAX_SIZE, RTU_MIN_SIZE};
use crate::error::{Error, Result};
use crate::frame::{self, FunctionCode};
use crate::service::serial::{arm_close_timer, Rs485Config, SerialConfig, SerialShared};
use crate::service::{Connector, Transporter};

/// Transport for RTU frames over a serial port.
///
/// Cloning yields another handle onto the same port and mutex.
#[derive(Clone)]
pub struct RtuTransporter {
    shared: Arc<SerialShared>,
}

impl RtuTransporter {
    #[must_use]
    pub fn new(config: SerialConfig) -> Self {
        Self {
            shared: SerialShared::new(config),
        }
    }
}

/// Minimum transmission duration of one character (11 bits per character).
pub(crate) fn char_duration(baud_rate: u32) -> Duration {
    if baud_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_micros(11_000_000 / u64::from(baud_rate))
}

/// Required minimum silence at the start and end of each frame (T3.5).
pub(crate) fn frame_delay(baud_rate: u32) -> Duration {
    if baud_rate == 0 || baud_rate > 19_200 {
        Duration::from_micros(1750)
    } else {
        Duration::from_micros(38_500_000 / u64::from(baud_rate))
    }
}

#[derive(Clone, Copy)]
enum ParseState {
    SlaveId,
    FunctionCode,
    ReadLength,
    FifoLength { high: Option<u8> },
    Payload { remaining: usize },
    Crc { remaining: u8 },
}

/// Reads one RTU response byte by byte.
///
/// Bytes that precede the expected slave id are bus noise and discarded.
/// Once the response has started, the remaining bytes must arrive within
/// `frame_window`; every single read is additionally bounded by
/// `read_timeout`.
pub(crate) async fn read_incrementally<R>(
    slave_id: u8,
    function: FunctionCode,
    reader: &mut R,
    frame_window: Duration,
    read_timeout: Duration,
) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut byte = [0u8; 1];
    let mut data: SmallVec<[u8; RTU_MAX_SIZE]> = SmallVec::new();
    let mut state = ParseState::SlaveId;
    let mut deadline: Option<Instant> = None;

    loop {
        if let Some(deadline) = deadline {
            // The port may keep spewing noise; the frame window bounds the
            // whole response.
            if Instant::now() > deadline {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "response did not complete within the frame window",
                )));
            }
        }
        read_byte(reader, &mut byte, read_timeout).await?;
        let byte = byte[0];

        match state {
            ParseState::SlaveId => {
                if !frame_window.is_zero() {
                    deadline = Some(Instant::now() + frame_window);
                }
                if byte == slave_id {
                    data.push(byte);
                    state = ParseState::FunctionCode;
                }
                // Anything else is noise between frames; keep hunting.
            }
            ParseState::FunctionCode => {
                if byte == function {
                    data.push(byte);
                    state = match function {
                        frame::FUNC_CODE_READ_COILS
                        | frame::FUNC_CODE_READ_DISCRETE_INPUTS
                        | frame::FUNC_CODE_READ_HOLDING_REGISTERS
                        | frame::FUNC_CODE_READ_INPUT_REGISTERS
                        | frame::FUNC_CODE_READ_WRITE_MULTIPLE_REGISTERS => ParseState::ReadLength,
                        frame::FUNC_CODE_READ_FIFO_QUEUE => ParseState::FifoLength { high: None },
                        frame::FUNC_CODE_WRITE_SINGLE_COIL
                        | frame::FUNC_CODE_WRITE_SINGLE_REGISTER
                        | frame::FUNC_CODE_WRITE_MULTIPLE_COILS
                        | frame::FUNC_CODE_WRITE_MULTIPLE_REGISTERS => {
                            ParseState::Payload { remaining: 4 }
                        }
                        frame::FUNC_CODE_MASK_WRITE_REGISTER => ParseState::Payload { remaining: 6 },
                        _ => return Err(Error::UnsupportedFunctionCode(function)),
                    };
                } else if byte == function | 0x80 {
                    // Exception reply: only the exception code follows.
                    data.push(byte);
                    state = ParseState::Payload { remaining: 1 };
                } else {
                    return Err(Error::FunctionCodeMismatch {
                        got: byte,
                        expected: function,
                    });
                }
            }
            ParseState::ReadLength => {
                // Max length = frame size minus slave id, function code,
                // length byte and CRC.
                if byte == 0 || usize::from(byte) > RTU_MAX_SIZE - 5 {
                    return Err(Error::InvalidLength(byte.into()));
                }
                data.push(byte);
                state = ParseState::Payload {
                    remaining: byte.into(),
                };
            }
            ParseState::FifoLength { high: None } => {
                data.push(byte);
                state = ParseState::FifoLength { high: Some(byte) };
            }
            ParseState::FifoLength { high: Some(high) } => {
                let count = usize::from(high) << 8 | usize::from(byte);
                if count < 2 || count > RTU_MAX_SIZE - 6 {
                    return Err(Error::InvalidLength(count as u16));
                }
                data.push(byte);
                state = ParseState::Payload { remaining: count };
            }
            ParseState::Payload { remaining } => {
                data.push(byte);
                state = if remaining == 1 {
                    ParseState::Crc { remaining: 2 }
                } else {
                    ParseState::Payload {
                        remaining: remaining - 1,
                    }
                };
            }
            ParseState::Crc { remaining } => {
                data.push(byte);
                if remaining == 1 {
                    return Ok(Bytes::copy_from_slice(&data));
                }
                state = ParseState::Crc { remaining: 1 };
            }
        }
    }
}

async fn read_byte<R>(reader: &mut R, buf: &mut [u8; 1], read_timeout: Duration) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    if read_timeout.is_zero() {
        reader.read_exact(&mut buf[..]).await?;
        return Ok(());
    }
    match timeout(read_timeout, reader.read_exact(&mut buf[..])).await {
        Ok(read) => {
            read?;
            Ok(())
        }
        Err(_) => Err(Error::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            "serial read timed out",
        ))),
    }
}

#[async_trait]
impl Transporter for RtuTransporter {
    async fn send(&self, request: &[u8]) -> Result<Bytes> {
        if request.len() < RTU_MIN_SIZE {
            return Err(Error::ShortFrame {
                length: request.len(),
                min: RTU_MIN_SIZE,
            });
        }
        let config = &self.shared.config;
        let mut state = self.shared.state.lock().await;
        self.shared.open_locked(&mut state)?;

        // Honor the inter-frame silence before a new request goes out.
        sleep_until(state.last_activity + frame_delay(config.baud_rate) * 2).await;

        state.last_activity = Instant::now();
        arm_close_timer(&self.shared, &mut state);

        let Some(port) = state.port.as_mut() else {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "port closed",
            )));
        };

        debug!("send: {:02X?}", request);
        if let Some(rs485) = &config.rs485 {
            rts_before_send(port, rs485).await?;
        }
        port.write_all(request).await.map_err(Error::Io)?;

        // Wait until the request has fully left the wire and the device got
        // its silent gap to start replying.
        sleep(char_duration(config.baud_rate) * request.len() as u32 + frame_delay(config.baud_rate))
            .await;

        if let Some(rs485) = &config.rs485 {
            rts_after_send(port, rs485).await?;
        }

        // The response may take one character duration per byte plus an
        // allowed gap of 1.5 characters between bytes (2.5 = 5/2).
        let expected_len = calculate_response_length(request).unwrap_or(RTU_MAX_SIZE);
        let frame_window = char_duration(config.baud_rate) * expected_len as u32 * 5 / 2;

        let result =
            read_incrementally(request[0], request[1], port, frame_window, config.timeout).await;
        state.last_activity = Instant::now();
        let response = result?;
        debug!("recv: {:02X?}", &response[..]);
        Ok(response)
    }
}

async fn rts_before_send(port: &mut tokio_serial::SerialStream, rs485: &Rs485Config) -> Result<()> {
    port.write_request_to_send(rs485.rts_high_during_send)
        .map_err(|err| Error::Io(io::Error::new(io::ErrorKind::Other, err)))?;
    if !rs485.delay_rts_before_send.is_zero() {
        sleep(rs485.delay_rts_before_send).await;
    }
    Ok(())
}

async fn rts_after_send(port: &mut tokio_serial::SerialStream, rs485: &Rs485Config) -> Result<()> {
    if !rs485.delay_rts_after_send.is_zero() {
        sleep(rs485.delay_rts_after_send).await;
    }
    port.write_request_to_send(rs485.rts_high_after_send)
        .map_err(|err| Error::Io(io::Error::new(io::ErrorKind::Other, err)))?;
    Ok(())
}

#[async_trait]
impl Connector for RtuTransporter {
    async fn connect(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        self.shared.open_locked(&mut state)
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        state.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::crc::Crc16;

    fn with_crc(frame: &[u8]) -> Vec<u8> {
        let mut crc = Crc16::new();
        crc.push_slice(frame);
        let checksum = crc.value();
        let mut adu = frame.to_vec();
        adu.push(checksum as u8);
        adu.push((checksum >> 8) as u8);
        adu
    }

    async fn parse(slave_id: u8, function: u8, bytes: &[u8]) -> Result<Bytes> {
        let mut reader = bytes;
        read_incrementally(
            slave_id,
            function,
            &mut reader,
            Duration::ZERO,
            Duration::ZERO,
        )
        .await
    }

    #[tokio::test]
    async fn parses_read_response() {
        let adu = with_crc(&[0x11, 0x03, 0x06, 0xAE, 0x41, 0x56, 0x52, 0x43, 0x40]);
        let parsed = parse(0x11, 0x03, &adu).await.unwrap();
        assert_eq!(&parsed[..], &adu[..]);
    }

    #[tokio::test]
    async fn parses_every_fixed_layout() {
        // Write echoes carry four payload bytes.
        for function in [0x05, 0x06, 0x0F, 0x10] {
            let adu = with_crc(&[0x01, function, 0x00, 0xAC, 0xFF, 0x00]);
            let parsed = parse(0x01, function, &adu).await.unwrap();
            assert_eq!(&parsed[..], &adu[..]);
        }
        // Mask write echoes carry six.
        let adu = with_crc(&[0x01, 0x16, 0x00, 0x04, 0x00, 0xF2, 0x00, 0x25]);
        let parsed = parse(0x01, 0x16, &adu).await.unwrap();
        assert_eq!(&parsed[..], &adu[..]);
    }

    #[tokio::test]
    async fn parses_exception_as_five_bytes() {
        for function in [0x01u8, 0x03, 0x06, 0x10, 0x16, 0x17, 0x18] {
            let adu = with_crc(&[0x0A, function | 0x80, 0x02]);
            let parsed = parse(0x0A, function, &adu).await.unwrap();
            assert_eq!(parsed.len(), 5);
            assert_eq!(parsed[1], function | 0x80);
        }
    }

    #[tokio::test]
    async fn skips_bus_noise_before_slave_id() {
        let mut stream = vec![0x42, 0x43];
        let adu = with_crc(&[0x01, 0x04, 0x02, 0xCA, 0xFE]);
        stream.extend_from_slice(&adu);
        let parsed = parse(0x01, 0x04, &stream).await.unwrap();
        assert_eq!(&parsed[..], &adu[..]);
    }

    #[tokio::test]
    async fn rejects_zero_and_oversize_length() {
        let zero = [0x01, 0x03, 0x00];
        assert!(matches!(
            parse(0x01, 0x03, &zero).await,
            Err(Error::InvalidLength(0))
        ));
        let oversize = [0x01, 0x03, 0xFC];
        assert!(matches!(
            parse(0x01, 0x03, &oversize).await,
            Err(Error::InvalidLength(0xFC))
        ));
    }

    #[tokio::test]
    async fn rejects_foreign_function_code() {
        let adu = [0x01, 0x07, 0x00];
        assert!(matches!(
            parse(0x01, 0x03, &adu).await,
            Err(Error::FunctionCodeMismatch {
                got: 0x07,
                expected: 0x03
            })
        ));
    }

    #[tokio::test]
    async fn parses_fifo_queue_with_two_byte_count() {
        // Byte count 6: fifo count 2 plus two register values.
        let adu = with_crc(&[0x11, 0x18, 0x00, 0x06, 0x00, 0x02, 0x01, 0xB8, 0x12, 0x84]);
        let parsed = parse(0x11, 0x18, &adu).await.unwrap();
        assert_eq!(&parsed[..], &adu[..]);
    }

    #[tokio::test]
    async fn truncated_frame_is_an_io_error() {
        let adu = [0x11, 0x03, 0x06, 0xAE];
        assert!(matches!(
            parse(0x11, 0x03, &adu).await,
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn character_durations() {
        assert_eq!(char_duration(19_200), Duration::from_micros(572));
        assert_eq!(char_duration(9_600), Duration::from_micros(1_145));
        assert_eq!(char_duration(115_200), Duration::from_micros(95));
    }

    #[test]
    fn frame_delays() {
        assert_eq!(frame_delay(2_400), Duration::from_micros(16_041));
        assert_eq!(frame_delay(19_200), Duration::from_micros(2_005));
        // Fixed above 19200 baud.
        assert_eq!(frame_delay(38_400), Duration::from_micros(1_750));
        assert_eq!(frame_delay(115_200), Duration::from_micros(1_750));
    }
}
