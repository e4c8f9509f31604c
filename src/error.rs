// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::io;

use thiserror::Error;

use crate::frame::{exception_name, FunctionCode};

/// Specialized [`Result`](std::result::Result) type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes of the client, the framers and the transports.
///
/// The recovery logic of the TCP transport dispatches on these variants,
/// so framing faults, identity mismatches and link faults each get their
/// own discriminant instead of being folded into an opaque I/O error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A request argument is outside the range permitted by the protocol.
    #[error("modbus: quantity '{value}' must be between '{min}' and '{max}'")]
    ArgumentRange { value: u16, min: u16, max: u16 },

    /// A single-coil write accepts only the two canonical ON/OFF encodings.
    #[error("modbus: state '{0:#06X}' must be either 0xFF00 (ON) or 0x0000 (OFF)")]
    InvalidCoilState(u16),

    /// The length field of an MBAP response header is zero or larger than
    /// the maximum ADU size permits.
    #[error("modbus: length in response header '{0}' must not be zero or greater than '254'")]
    HeaderLength(u16),

    /// The byte count announced by an RTU response would overflow the frame.
    #[error("modbus: invalid length received: {0}")]
    InvalidLength(u16),

    /// An encoded frame would exceed the maximum ADU size of its transport.
    #[error("modbus: frame length '{length}' must not be bigger than '{max}'")]
    FrameLength { length: usize, max: usize },

    /// A response is too short to contain the mandatory framing fields.
    #[error("modbus: response length '{length}' does not meet minimum '{min}'")]
    ShortFrame { length: usize, min: usize },

    /// CRC-16 (RTU) or LRC (ASCII) verification failed.
    #[error("modbus: response checksum '{got:#06X}' does not match expected '{expected:#06X}'")]
    ChecksumMismatch { got: u16, expected: u16 },

    /// An ASCII response does not begin with ':' (or the field-common '>').
    #[error("modbus: response frame does not start with ':' or '>', got '{0:#04X}'")]
    AsciiStart(u8),

    /// An ASCII response is not terminated by CRLF.
    #[error("modbus: response frame is not terminated with CRLF")]
    AsciiTerminator,

    /// The ASCII body (excluding the start character) must hold an even
    /// number of hex characters.
    #[error("modbus: response length '{0}' is not an even number")]
    AsciiOddLength(usize),

    /// A character outside `[0-9A-Fa-f]` appeared in an ASCII frame.
    #[error("modbus: invalid hex character '{0:#04X}' in response frame")]
    AsciiHexDigit(u8),

    /// The MBAP transaction id of the response differs from the request.
    ///
    /// Carries both values so the transport can decide whether the frame is
    /// a late reply to an earlier timed-out request.
    #[error("modbus: response transaction id '{got}' does not match request '{expected}'")]
    TransactionIdMismatch { got: u16, expected: u16 },

    /// The MBAP protocol id of the response differs from the request.
    #[error("modbus: response protocol id '{got}' does not match request '{expected}'")]
    ProtocolIdMismatch { got: u16, expected: u16 },

    /// The MBAP unit id of the response differs from the request.
    #[error("modbus: response unit id '{got}' does not match request '{expected}'")]
    UnitIdMismatch { got: u8, expected: u8 },

    /// The slave address echoed by a serial response differs from the request.
    #[error("modbus: response slave id '{got}' does not match request '{expected}'")]
    SlaveIdMismatch { got: u8, expected: u8 },

    /// A serial response announced a function code that is neither the
    /// requested one nor its exception form.
    #[error("modbus: response function code '{got}' does not match request '{expected}'")]
    FunctionCodeMismatch { got: u8, expected: u8 },

    /// The function code has no known response layout.
    #[error("modbus: function code '{0}' is not supported")]
    UnsupportedFunctionCode(u8),

    /// A fixed-length write response did not echo the request address.
    #[error("modbus: response address '{got}' does not match request '{expected}'")]
    AddressMismatch { got: u16, expected: u16 },

    /// A fixed-length write response did not echo the request value.
    #[error("modbus: response value '{got}' does not match request '{expected}'")]
    ValueMismatch { got: u16, expected: u16 },

    /// A multiple-write response did not echo the request quantity.
    #[error("modbus: response quantity '{got}' does not match request '{expected}'")]
    QuantityMismatch { got: u16, expected: u16 },

    /// A mask-write response did not echo one of the request masks.
    #[error("modbus: response mask '{got:#06X}' does not match request '{expected:#06X}'")]
    MaskMismatch { got: u16, expected: u16 },

    /// The payload size disagrees with the byte count announced by the
    /// response or implied by the request.
    #[error("modbus: response data size '{actual}' does not match expected '{expected}'")]
    DataSize { expected: usize, actual: usize },

    /// A FIFO queue response reported more registers than the protocol allows.
    #[error("modbus: fifo count '{0}' is greater than expected '31'")]
    FifoCount(u16),

    /// A device identification object list ended in the middle of an object.
    #[error("modbus: device identification object #{0} is truncated")]
    DeviceIdObject(usize),

    /// The device replied with a Modbus exception.
    ///
    /// This is an application-level outcome reported by the device, not a
    /// framing fault, and is never retried.
    #[error("modbus: exception '{code}' ({}), function '{}'", exception_name(*code), function & 0x7F)]
    Exception { function: FunctionCode, code: u8 },

    /// The decoded response carries no payload at all.
    #[error("modbus: response data is empty")]
    EmptyResponse,

    /// Connect, read, write or deadline failure on the underlying stream.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns `true` for replies the device itself rejected (as opposed to
    /// transport or framing faults).
    #[must_use]
    pub fn is_exception(&self) -> bool {
        matches!(self, Error::Exception { .. })
    }

    /// Returns `true` if the underlying cause was an elapsed I/O deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Io(err) if err.kind() == io::ErrorKind::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_display() {
        let err = Error::Exception {
            function: 0x83,
            code: 2,
        };
        assert_eq!(
            err.to_string(),
            "modbus: exception '2' (illegal data address), function '3'"
        );
        assert!(err.is_exception());
    }

    #[test]
    fn timeout_classification() {
        let err = Error::Io(io::Error::new(io::ErrorKind::TimedOut, "deadline"));
        assert!(err.is_timeout());
        assert!(!Error::EmptyResponse.is_timeout());
    }
}
