// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RTU frames tunnelled over a TCP connection.
//!
//! TCP delivers reliably ordered bytes, so instead of the serial line's
//! timing-driven byte-at-a-time parser this transport reads the minimum
//! frame, inspects the function code and completes the frame to its
//! computed length (or to the exception length).

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use log::debug;

use crate::codec::rtu::{
    calculate_response_length, RTU_EXCEPTION_SIZE, RTU_MAX_SIZE, RTU_MIN_SIZE,
};
use crate::error::{Error, Result};
use crate::service::tcp::{
    arm_close_timer, io_deadline, read_exact_deadline, write_all_deadline, TcpConfig, TcpShared,
};
use crate::service::{Connector, Transporter};
use tokio::time::Instant;

/// Transport for RTU frames over a cached TCP connection.
///
/// Cloning yields another handle onto the same connection and mutex.
#[derive(Clone)]
pub struct RtuOverTcpTransporter {
    shared: Arc<TcpShared>,
}

impl RtuOverTcpTransporter {
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
impl Transporter for RtuOverTcpTransporter {
    async fn send(&self, request: &[u8]) -> Result<Bytes> {
        if request.len() < RTU_MIN_SIZE {
            return Err(Error::ShortFrame {
                length: request.len(),
                min: RTU_MIN_SIZE,
            });
        }
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

        debug!("send: {:02X?}", request);
        write_all_deadline(conn, request, deadline).await?;

        let function = request[1];
        let mut data = [0u8; RTU_MAX_SIZE];
        // Read the minimum frame first, then either the remainder of the
        // regular response or the exception tail, depending on byte 1.
        read_exact_deadline(conn, &mut data[..RTU_MIN_SIZE], deadline).await?;

        let total = if data[1] == function {
            match calculate_response_length(request) {
                Some(total) if total > RTU_MIN_SIZE && total <= RTU_MAX_SIZE => {
                    read_exact_deadline(conn, &mut data[RTU_MIN_SIZE..total], deadline).await?;
                    total
                }
                Some(_) => RTU_MIN_SIZE,
                None => {
                    // FIFO queue reads: the byte count only arrives with the
                    // response itself, in the two bytes after the function
                    // code.
                    let count = usize::from(BigEndian::read_u16(&data[2..4]));
                    let total = RTU_MIN_SIZE + 2 + count;
                    if count < 2 || total > RTU_MAX_SIZE {
                        return Err(Error::InvalidLength(count as u16));
                    }
                    read_exact_deadline(conn, &mut data[RTU_MIN_SIZE..total], deadline).await?;
                    total
                }
            }
        } else if data[1] == function | 0x80 {
            read_exact_deadline(conn, &mut data[RTU_MIN_SIZE..RTU_EXCEPTION_SIZE], deadline)
                .await?;
            RTU_EXCEPTION_SIZE
        } else {
            // Leave the mismatch to the packager's CRC verification.
            RTU_MIN_SIZE
        };

        let response = Bytes::copy_from_slice(&data[..total]);
        debug!("recv: {:02X?}", &response[..]);
        if self.shared.config.idle_timeout.is_zero() {
            state.close();
        }
        Ok(response)
    }
}

#[async_trait]
impl Connector for RtuOverTcpTransporter {
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
