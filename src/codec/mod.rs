// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Frame codecs ("packagers") for the supported wire formats.
//!
//! A packager is pure: it turns a [`Pdu`] into an application data unit
//! for its frame style and back, and checks the framing-level identity
//! fields between a request and its response. All I/O lives in the
//! [`service`](crate::service) layer.

use bytes::Bytes;

use crate::error::Result;
use crate::frame::Pdu;
use crate::slave::Slave;

pub mod ascii;
pub mod crc;
pub mod lrc;
pub mod rtu;
pub mod tcp;

/// Encoding, decoding and verification of one frame style.
pub trait Packager: Send + Sync {
    /// Selects the slave device for all subsequently encoded requests.
    fn set_slave(&mut self, slave: Slave);

    /// Frames a PDU into an ADU.
    fn encode(&self, pdu: &Pdu) -> Result<Bytes>;

    /// Checks the framing-level identity fields of a response against the
    /// request it answers (transaction/protocol/unit id on TCP, slave id
    /// echo and frame boundaries on serial formats).
    fn verify(&self, request: &[u8], response: &[u8]) -> Result<()>;

    /// Extracts the PDU from an ADU, validating checksums where the frame
    /// style carries one.
    fn decode(&self, adu: &[u8]) -> Result<Pdu>;
}
