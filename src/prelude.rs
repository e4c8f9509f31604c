// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common imports for working with this crate.

pub use crate::client::Client;
#[cfg(feature = "sync")]
pub use crate::client::sync;
pub use crate::codec::Packager;
pub use crate::error::{Error, Result};
pub use crate::frame::{FunctionCode, Pdu, ReadDeviceIdCode};
#[cfg(any(feature = "rtu", feature = "ascii"))]
pub use crate::service::serial::{Rs485Config, SerialConfig};
#[cfg(feature = "udp")]
pub use crate::service::rtu_over_udp::UdpConfig;
#[cfg(feature = "tcp")]
pub use crate::service::tcp::TcpConfig;
pub use crate::service::{Connector, Transporter};
pub use crate::slave::{Slave, SlaveId};
