// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared serial-port state used by the RTU and ASCII transports.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_serial::{DataBits, Parity, SerialStream, StopBits};

use crate::error::{Error, Result};
use crate::slave::Slave;

/// Configuration of a serial transport.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub path: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Bound for a single blocking read on the port. Zero disables it.
    pub timeout: Duration,
    /// Close the cached port after this much inactivity. Zero disables
    /// the close timer.
    pub idle_timeout: Duration,
    /// Optional RS485 line control applied around RTU writes.
    pub rs485: Option<Rs485Config>,
    /// Slave address for requests built by the matching packager.
    pub slave: Slave,
}

impl SerialConfig {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            baud_rate: 19_200,
            data_bits: DataBits::Eight,
            parity: Parity::Even,
            stop_bits: StopBits::One,
            timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            rs485: None,
            slave: Slave::broadcast(),
        }
    }
}

/// RS485 half-duplex control via the request-to-send line.
///
/// Only effective where the platform serial driver exposes RTS control.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rs485Config {
    /// Drive RTS high while transmitting.
    pub rts_high_during_send: bool,
    /// Level to leave RTS at once the frame is out.
    pub rts_high_after_send: bool,
    /// Silent period between asserting RTS and the first byte.
    pub delay_rts_before_send: Duration,
    /// Silent period between the last byte and releasing RTS.
    pub delay_rts_after_send: Duration,
}

pub(crate) struct SerialState {
    pub(crate) port: Option<SerialStream>,
    pub(crate) last_activity: Instant,
    close_timer: Option<JoinHandle<()>>,
}

pub(crate) struct SerialShared {
    pub(crate) config: SerialConfig,
    pub(crate) state: Mutex<SerialState>,
}

impl SerialShared {
    pub(crate) fn new(config: SerialConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: Mutex::new(SerialState {
                port: None,
                last_activity: Instant::now(),
                close_timer: None,
            }),
        })
    }

    /// Opens the port if it is not open. Caller must hold the state lock.
    pub(crate) fn open_locked(&self, state: &mut SerialState) -> Result<()> {
        if state.port.is_some() {
            return Ok(());
        }
        let builder = tokio_serial::new(&self.config.path, self.config.baud_rate)
            .data_bits(self.config.data_bits)
            .parity(self.config.parity)
            .stop_bits(self.config.stop_bits);
        let port = SerialStream::open(&builder).map_err(|err| {
            Error::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("could not open {}: {err}", self.config.path),
            ))
        })?;
        state.port = Some(port);
        Ok(())
    }
}

impl SerialState {
    pub(crate) fn close(&mut self) {
        self.port = None;
    }
}

/// Re-arms the single-shot idle-close timer. Caller must hold the state
/// lock. Holds only a weak reference so a dropped transport defuses the
/// timer.
pub(crate) fn arm_close_timer(shared: &Arc<SerialShared>, state: &mut SerialState) {
    let idle_timeout = shared.config.idle_timeout;
    if idle_timeout.is_zero() {
        return;
    }
    if let Some(timer) = state.close_timer.take() {
        timer.abort();
    }
    let shared = Arc::downgrade(shared);
    state.close_timer = Some(tokio::spawn(async move {
        sleep(idle_timeout).await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let mut state = shared.state.lock().await;
        let idle = state.last_activity.elapsed();
        if idle >= idle_timeout {
            debug!("closing port due to idle timeout: {idle:?}");
            state.close();
        }
    }));
}
