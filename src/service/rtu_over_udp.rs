// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RTU frames tunnelled over UDP.
//!
//! UDP is connectionless; "connecting" only fixes the peer address on the
//! socket. Datagram boundaries preserve frames, so a response is a single
//! receive. Explicit deadlines bound both directions, otherwise a dropped
//! datagram would hang the call forever.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::codec::rtu::{RTU_MAX_SIZE, RTU_MIN_SIZE};
use crate::error::{Error, Result};
use crate::service::{Connector, Transporter};
use crate::slave::Slave;

/// Configuration of the RTU-over-UDP transport.
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// `host:port` of the peer.
    pub address: String,
    /// Send and receive deadline. Zero disables deadlines.
    pub timeout: Duration,
    /// Slave address for requests built by the matching packager.
    pub slave: Slave,
}

impl UdpConfig {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            timeout: Duration::from_secs(10),
            slave: Slave::broadcast(),
        }
    }
}

struct UdpShared {
    config: UdpConfig,
    state: Mutex<Option<UdpSocket>>,
}

/// Transport for RTU frames over UDP datagrams.
///
/// Cloning yields another handle onto the same socket and mutex.
#[derive(Clone)]
pub struct RtuOverUdpTransporter {
    shared: Arc<UdpShared>,
}

impl RtuOverUdpTransporter {
    #[must_use]
    pub fn new(config: UdpConfig) -> Self {
        Self {
            shared: Arc::new(UdpShared {
                config,
                state: Mutex::new(None),
            }),
        }
    }

    async fn connect_locked(&self, state: &mut Option<UdpSocket>) -> Result<()> {
        if state.is_some() {
            return Ok(());
        }
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(&self.shared.config.address).await?;
        *state = Some(socket);
        Ok(())
    }
}

#[async_trait]
impl Transporter for RtuOverUdpTransporter {
    async fn send(&self, request: &[u8]) -> Result<Bytes> {
        if request.len() < 2 {
            return Err(Error::ShortFrame {
                length: request.len(),
                min: 2,
            });
        }
        let mut state = self.shared.state.lock().await;
        self.connect_locked(&mut state).await?;
        let Some(socket) = state.as_ref() else {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "socket closed",
            )));
        };
        let io_timeout = self.shared.config.timeout;

        debug!("send: {:02X?}", request);
        bounded(io_timeout, socket.send(request)).await??;

        let mut data = [0u8; RTU_MAX_SIZE];
        let n = bounded(io_timeout, socket.recv(&mut data)).await??;
        if n < RTU_MIN_SIZE {
            return Err(Error::ShortFrame {
                length: n,
                min: RTU_MIN_SIZE,
            });
        }
        let response = Bytes::copy_from_slice(&data[..n]);
        debug!("recv: {:02X?}", &response[..]);
        Ok(response)
    }
}

async fn bounded<F, T>(io_timeout: Duration, operation: F) -> Result<io::Result<T>>
where
    F: std::future::Future<Output = io::Result<T>>,
{
    if io_timeout.is_zero() {
        return Ok(operation.await);
    }
    match timeout(io_timeout, operation).await {
        Ok(result) => Ok(result),
        Err(_) => Err(Error::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            "datagram deadline exceeded",
        ))),
    }
}

#[async_trait]
impl Connector for RtuOverUdpTransporter {
    async fn connect(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        self.connect_locked(&mut state).await
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        *state = None;
        Ok(())
    }
}
