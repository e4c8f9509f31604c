// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ASCII frames tunnelled over a TCP connection.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use tokio::io::AsyncReadExt;
use tokio::time::{timeout_at, Instant};

use crate::codec::ascii::{ASCII_END, ASCII_MAX_SIZE, ASCII_MIN_SIZE};
use crate::error::{Error, Result};
use crate::service::tcp::{arm_close_timer, io_deadline, write_all_deadline, TcpConfig, TcpShared};
use crate::service::{Connector, Transporter};

/// Transport for ASCII frames over a cached TCP connection.
///
/// Cloning yields another handle onto the same connection and mutex.
#[derive(Clone)]
pub struct AsciiOverTcpTransporter {
    shared: Arc<TcpShared>,
}

impl AsciiOverTcpTransporter {
    #[must_use]
    pub fn new(config: TcpConfig) -> Self {
        Self {
            shared: TcpShared::new(config),
        }
    }

    /// Whether a connection is currently cached.
    pub async fn is_connected(&self) -> bool {
        self.shared.state.lock().await.conn.is_some()
    }
}

#[async_trait]
impl Transporter for AsciiOverTcpTransporter {
    async fn send(&self, request: &[u8]) -> Result<Bytes> {
        let mut state = self.shared.state.lock().await;
        self.shared.connect_locked(&mut state).await?;
        state.last_activity = Instant::now();
        arm_close_timer(&self.shared, &mut state);
        let deadline = io_deadline(&self.shared.config, state.last_activity);

        let Some(conn) = state.conn.as_mut() else {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "connection closed",
            )));
        };

        debug!("send: {:?}", String::from_utf8_lossy(request));
        write_all_deadline(conn, request, deadline).await?;

        let mut data = [0u8; ASCII_MAX_SIZE];
        let mut length = 0;
        loop {
            let read = conn.read(&mut data[length..]);
            let n = match deadline {
                Some(deadline) => match timeout_at(deadline, read).await {
                    Ok(read) => read.map_err(Error::Io)?,
                    Err(_) => {
                        return Err(Error::Io(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "read deadline exceeded",
                        )))
                    }
                },
                None => read.await.map_err(Error::Io)?,
            };
            length += n;
            if length >= ASCII_MAX_SIZE || n == 0 {
                break;
            }
            if length > ASCII_MIN_SIZE && &data[length - ASCII_END.len()..length] == ASCII_END {
                break;
            }
        }

        let response = Bytes::copy_from_slice(&data[..length]);
        debug!("recv: {:?}", String::from_utf8_lossy(&response));
        if self.shared.config.idle_timeout.is_zero() {
            state.close();
        }
        Ok(response)
    }
}

#[async_trait]
impl Connector for AsciiOverTcpTransporter {
    async fn connect(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        self.shared.connect_locked(&mut state).await
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        state.close();
        Ok(())
    }
}
