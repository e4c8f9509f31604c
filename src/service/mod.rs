// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stateful transports ("transporters"), one connection each.
//!
//! A transporter owns at most one connection, opens it lazily on
//! [`send`](Transporter::send) and serializes all access through a single
//! mutex: at most one request/response exchange is ever in flight per
//! transport instance. Transporters are cheap clonable handles over shared
//! state, so multiple clients can drive the same link in turns.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

#[cfg(feature = "ascii")]
pub mod ascii;
#[cfg(feature = "tcp")]
pub mod ascii_over_tcp;
#[cfg(feature = "rtu")]
pub mod rtu;
#[cfg(feature = "tcp")]
pub mod rtu_over_tcp;
#[cfg(feature = "udp")]
pub mod rtu_over_udp;
#[cfg(any(feature = "rtu", feature = "ascii"))]
pub mod serial;
#[cfg(feature = "tcp")]
pub mod tcp;

/// The transport layer: writes one request ADU and awaits exactly one
/// matching response ADU.
///
/// The request must be a frame produced by the matching
/// [`Packager`](crate::codec::Packager).
#[async_trait]
pub trait Transporter: Send + Sync {
    async fn send(&self, request: &[u8]) -> Result<Bytes>;
}

/// Lifecycle control of the underlying channel.
///
/// Connecting is optional; `send` dials lazily. `close` always discards the
/// connection handle, even if tearing down the underlying stream fails.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
}
