// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A pure [Rust](https://www.rust-lang.org)
//! [Modbus](https://en.wikipedia.org/wiki/Modbus) client library
//! based on [tokio](https://tokio.rs).
//!
//! The library speaks the Modbus application protocol over several lower
//! layer transports: framed TCP (MBAP), serial RTU, serial ASCII, and the
//! tunnelled RTU-over-TCP, ASCII-over-TCP and RTU-over-UDP variants. Each
//! transport owns exactly one connection, opens it lazily, caches it with
//! an idle-close timer and keeps strictly one request in flight at a time.
//!
//! ## Features
//!
//! - pure Rust library
//! - async (non-blocking) core with optional blocking wrappers
//! - Modbus TCP with link- and protocol-level recovery
//! - Modbus RTU with MODBUS Serial Line conforming inter-frame timing
//! - Modbus ASCII (':' emitted, '>' accepted)
//! - tunnelled RTU/ASCII over TCP and RTU over UDP
//! - Open Source (MIT/Apache-2.0)
//!
//! # Examples
//!
//! ## TCP client
//!
//! ```rust,no_run
//! use tokio_modbus_link::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut config = TcpConfig::new("192.168.0.222:502");
//!     config.slave = Slave(0x11);
//!     let client = Client::tcp(config);
//!     let data = client.read_input_registers(0x1000, 7).await?;
//!     println!("Response is '{data:?}'");
//!     Ok(())
//! }
//! ```
//!
//! ## Sync RTU client
//!
//! ```rust,no_run
//! use tokio_modbus_link::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let mut client = sync::Client::connect("rtu:///dev/ttyUSB0")?;
//!     client.set_slave(Slave(1));
//!     let data = client.read_holding_registers(0x082B, 2)?;
//!     println!("Sensor value is: {data:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Protocol-Specification
//!
//! - [MODBUS Application Protocol Specification v1.1b3 (PDF)](http://modbus.org/docs/Modbus_Application_Protocol_V1_1b3.pdf)
//! - [MODBUS over serial line specification and implementation guide v1.02 (PDF)](http://modbus.org/docs/Modbus_over_serial_line_V1_02.pdf)
//! - [MODBUS Messaging on TCP/IP Implementation Guide v1.0b (PDF)](http://modbus.org/docs/Modbus_Messaging_Implementation_Guide_V1_0b.pdf)

pub mod prelude;

pub mod client;
pub mod codec;
pub mod error;
pub mod frame;
pub mod service;
pub mod slave;

pub use crate::error::{Error, Result};
pub use crate::frame::{FunctionCode, Pdu, ReadDeviceIdCode};
pub use crate::slave::{Slave, SlaveId};
