// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP transport with link- and protocol-level recovery.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, timeout_at, Instant};

use crate::codec::tcp::{verify_response, TCP_HEADER_LEN, TCP_MAX_LENGTH};
use crate::error::{Error, Result};
use crate::service::{Connector, Transporter};
use crate::slave::Slave;

/// Byte stream usable as a Modbus TCP connection.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Connection for T {}

/// Asynchronous dial hook producing the connection for an address.
///
/// Lets callers wrap the stream in TLS or hand in a pre-dialed socket; the
/// transport itself stays agnostic of anything but the byte stream.
pub type Dialer = Arc<
    dyn Fn(&str) -> Pin<Box<dyn Future<Output = io::Result<Box<dyn Connection>>> + Send>>
        + Send
        + Sync,
>;

/// Configuration of the TCP transport.
#[derive(Clone)]
pub struct TcpConfig {
    /// `host:port` to dial.
    pub address: String,
    /// Connect, read and write deadline. Zero disables deadlines.
    pub timeout: Duration,
    /// Close the cached connection after this much inactivity. Zero
    /// disables caching: the connection is closed at the end of each
    /// successful send and the close timer is never armed.
    pub idle_timeout: Duration,
    /// Enables link-level recovery (close, sleep this long, reconnect)
    /// when the connection drops or the response header is unusable.
    pub link_recovery_timeout: Duration,
    /// Enables frame-level recovery (resend on the same connection) for
    /// malformed or mismatched responses.
    pub protocol_recovery_timeout: Duration,
    /// Silent period after a successful connect that some devices require
    /// before they accept the first request.
    pub connect_delay: Duration,
    /// Custom dial hook; plain `TcpStream::connect` when absent.
    pub dialer: Option<Dialer>,
    /// Unit id for requests built by the matching packager.
    pub slave: Slave,
}

impl TcpConfig {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
            link_recovery_timeout: Duration::ZERO,
            protocol_recovery_timeout: Duration::ZERO,
            connect_delay: Duration::ZERO,
            dialer: None,
            slave: Slave::broadcast(),
        }
    }
}

impl fmt::Debug for TcpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpConfig")
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("link_recovery_timeout", &self.link_recovery_timeout)
            .field("protocol_recovery_timeout", &self.protocol_recovery_timeout)
            .field("connect_delay", &self.connect_delay)
            .field("dialer", &self.dialer.as_ref().map(|_| ".."))
            .field("slave", &self.slave)
            .finish()
    }
}

pub(crate) struct TcpState {
    pub(crate) conn: Option<Box<dyn Connection>>,
    pub(crate) last_activity: Instant,
    close_timer: Option<JoinHandle<()>>,
    last_attempted_tx_id: u16,
    last_successful_tx_id: u16,
}

impl TcpState {
    fn new() -> Self {
        Self {
            conn: None,
            last_activity: Instant::now(),
            close_timer: None,
            last_attempted_tx_id: 0,
            last_successful_tx_id: 0,
        }
    }

    /// Discards the connection handle. Dropping the stream tears the
    /// connection down; there is no error to surface.
    pub(crate) fn close(&mut self) {
        self.conn = None;
    }
}

pub(crate) struct TcpShared {
    pub(crate) config: TcpConfig,
    pub(crate) state: Mutex<TcpState>,
}

impl TcpShared {
    pub(crate) fn new(config: TcpConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: Mutex::new(TcpState::new()),
        })
    }

    /// Dials if there is no cached connection. Caller must hold the state
    /// lock. The connect delay elapses with the lock held, so other callers
    /// observe the silent period as well.
    pub(crate) async fn connect_locked(&self, state: &mut TcpState) -> Result<()> {
        if state.conn.is_some() {
            return Ok(());
        }
        let conn: Box<dyn Connection> = match &self.config.dialer {
            Some(dial) => dial(&self.config.address).await?,
            None => {
                let connect = TcpStream::connect(&self.config.address);
                let stream = if self.config.timeout.is_zero() {
                    connect.await?
                } else {
                    match timeout(self.config.timeout, connect).await {
                        Ok(connected) => connected?,
                        Err(_) => {
                            return Err(Error::Io(io::Error::new(
                                io::ErrorKind::TimedOut,
                                "connect deadline exceeded",
                            )))
                        }
                    }
                };
                Box::new(stream)
            }
        };
        state.conn = Some(conn);
        if !self.config.connect_delay.is_zero() {
            sleep(self.config.connect_delay).await;
        }
        Ok(())
    }
}

/// Re-arms the single-shot idle-close timer. Caller must hold the state
/// lock. The timer holds only a weak reference, so dropping the transport
/// defuses any armed timer.
pub(crate) fn arm_close_timer(shared: &Arc<TcpShared>, state: &mut TcpState) {
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
        // Contends with any in-flight send; re-check after acquiring the
        // lock so a request that slipped in keeps its connection.
        let mut state = shared.state.lock().await;
        let idle = state.last_activity.elapsed();
        if idle >= idle_timeout {
            debug!("closing connection due to idle timeout: {idle:?}");
            state.close();
        }
    }));
}

/// Read/write deadline for the current exchange.
pub(crate) fn io_deadline(config: &TcpConfig, last_activity: Instant) -> Option<Instant> {
    if config.timeout.is_zero() {
        None
    } else {
        Some(last_activity + config.timeout)
    }
}

pub(crate) async fn write_all_deadline<W>(
    conn: &mut W,
    buf: &[u8],
    deadline: Option<Instant>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    match deadline {
        Some(deadline) => match timeout_at(deadline, conn.write_all(buf)).await {
            Ok(written) => written,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "write deadline exceeded",
            )),
        },
        None => conn.write_all(buf).await,
    }
}

pub(crate) async fn read_exact_deadline<R>(
    conn: &mut R,
    buf: &mut [u8],
    deadline: Option<Instant>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match deadline {
        Some(deadline) => match timeout_at(deadline, conn.read_exact(buf)).await {
            Ok(read) => read.map(|_| ()),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "read deadline exceeded",
            )),
        },
        None => conn.read_exact(buf).await.map(|_| ()),
    }
}

/// What the response reader decided the send loop should do next.
enum ReadOutcome {
    /// Success, or an error that is surfaced to the caller unchanged.
    Done(Result<Bytes>),
    /// Resend the request on the same connection.
    Retry,
    /// Close the connection, sleep the link recovery timeout, reconnect.
    CloseRetry(Error),
}

/// Transport for MBAP frames over a single cached TCP connection.
///
/// Cloning yields another handle onto the same connection and mutex.
#[derive(Clone)]
pub struct TcpTransporter {
    pub(crate) shared: Arc<TcpShared>,
}

impl TcpTransporter {
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

    async fn read_response(
        &self,
        state: &mut TcpState,
        request: &[u8],
        deadline: Option<Instant>,
        recovery_deadline: Instant,
    ) -> ReadOutcome {
        let config = &self.shared.config;
        let mut header = [0u8; TCP_HEADER_LEN];
        loop {
            let header_read = match state.conn.as_mut() {
                Some(conn) => read_exact_deadline(conn, &mut header, deadline).await,
                None => Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "connection closed",
                )),
            };
            match header_read {
                Ok(()) => {
                    let err = match self.process_response(state, &header, deadline).await {
                        Ok(adu) => match verify_response(request, &adu) {
                            Ok(()) => return ReadOutcome::Done(Ok(adu)),
                            Err(err) => err,
                        },
                        Err(err) => err,
                    };
                    // No time left for another attempt: report the error.
                    if Instant::now() >= recovery_deadline {
                        return ReadOutcome::Done(Err(err));
                    }
                    match err {
                        Error::HeaderLength(_) => {
                            if !config.link_recovery_timeout.is_zero() {
                                return ReadOutcome::CloseRetry(err);
                            }
                            return ReadOutcome::Done(Err(err));
                        }
                        Error::TransactionIdMismatch { got, .. } => {
                            if in_reply_window(
                                got,
                                state.last_successful_tx_id,
                                state.last_attempted_tx_id,
                            ) {
                                // Most likely a late reply to an earlier
                                // request that timed out. Keep reading the
                                // same connection without sending another
                                // query: a new request would only push the
                                // counter further ahead of the buffered
                                // responses.
                                debug!("ignoring late response with transaction id '{got}'");
                                continue;
                            }
                            if !config.protocol_recovery_timeout.is_zero() {
                                return ReadOutcome::Retry;
                            }
                            return ReadOutcome::Done(Err(err));
                        }
                        err => {
                            // Header was consumed but the frame is unusable.
                            if !config.protocol_recovery_timeout.is_zero() {
                                return ReadOutcome::Retry;
                            }
                            return ReadOutcome::Done(Err(err));
                        }
                    }
                }
                Err(err) => {
                    // Only a dropped link is worth reconnecting for;
                    // deadlines and other I/O faults are fatal for the call.
                    if err.kind() == io::ErrorKind::UnexpectedEof
                        && !config.link_recovery_timeout.is_zero()
                        && Instant::now() < recovery_deadline
                    {
                        return ReadOutcome::CloseRetry(err.into());
                    }
                    return ReadOutcome::Done(Err(err.into()));
                }
            }
        }
    }

    /// Validates the header length field and completes the frame.
    async fn process_response(
        &self,
        state: &mut TcpState,
        header: &[u8; TCP_HEADER_LEN],
        deadline: Option<Instant>,
    ) -> Result<Bytes> {
        let length = usize::from(BigEndian::read_u16(&header[4..6]));
        if length == 0 || length > TCP_MAX_LENGTH - (TCP_HEADER_LEN - 1) {
            // Drain whatever follows the broken header so stale body bytes
            // cannot be mistaken for the next response header.
            flush(state).await;
            return Err(Error::HeaderLength(length as u16));
        }
        let mut adu = vec![0u8; TCP_HEADER_LEN - 1 + length];
        adu[..TCP_HEADER_LEN].copy_from_slice(header);
        match state.conn.as_mut() {
            Some(conn) => {
                read_exact_deadline(conn, &mut adu[TCP_HEADER_LEN..], deadline).await?;
            }
            None => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "connection closed",
                )))
            }
        }
        Ok(Bytes::from(adu))
    }
}

/// Non-blocking drain of any buffered inbound bytes.
async fn flush(state: &mut TcpState) {
    let Some(conn) = state.conn.as_mut() else {
        return;
    };
    let mut scratch = [0u8; TCP_MAX_LENGTH];
    loop {
        // A deadline of "now" polls the read once: buffered data is
        // consumed, an empty socket ends the drain.
        match timeout_at(Instant::now(), conn.read(&mut scratch)).await {
            Ok(Ok(n)) if n > 0 => continue,
            _ => return,
        }
    }
}

/// Whether a mismatched transaction id belongs to an earlier request of
/// this connection, i.e. lies in the window between the last successful
/// and the last attempted id, taking counter wrap into account: if the
/// last attempt is smaller than the last success the counter wrapped, and
/// the id may be above the last success or below the last attempt, but
/// not both.
fn in_reply_window(got: u16, last_successful: u16, last_attempted: u16) -> bool {
    (got > last_successful && got < last_attempted)
        || (last_attempted < last_successful && (got > last_successful || got < last_attempted))
}

#[async_trait]
impl Transporter for TcpTransporter {
    async fn send(&self, request: &[u8]) -> Result<Bytes> {
        if request.len() < TCP_HEADER_LEN + 1 {
            return Err(Error::ShortFrame {
                length: request.len(),
                min: TCP_HEADER_LEN + 1,
            });
        }
        let mut state = self.shared.state.lock().await;
        let recovery_deadline = Instant::now() + self.shared.config.idle_timeout;

        loop {
            self.shared.connect_locked(&mut state).await?;
            state.last_activity = Instant::now();
            arm_close_timer(&self.shared, &mut state);
            let deadline = io_deadline(&self.shared.config, state.last_activity);

            debug!("send: {:02X?}", request);
            match state.conn.as_mut() {
                Some(conn) => {
                    // A write failure is fatal for this call: part of the
                    // frame may already be on the wire and resending would
                    // double-send.
                    write_all_deadline(conn, request, deadline).await?;
                }
                None => {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::NotConnected,
                        "connection closed",
                    )))
                }
            }
            state.last_attempted_tx_id = BigEndian::read_u16(&request[0..2]);

            match self
                .read_response(&mut state, request, deadline, recovery_deadline)
                .await
            {
                ReadOutcome::Done(result) => {
                    let response = result?;
                    state.last_successful_tx_id = BigEndian::read_u16(&response[0..2]);
                    debug!("recv: {:02X?}", &response[..]);
                    if self.shared.config.idle_timeout.is_zero() {
                        // Caching is disabled.
                        state.close();
                    }
                    return Ok(response);
                }
                ReadOutcome::Retry => continue,
                ReadOutcome::CloseRetry(err) => {
                    warn!("close connection and retry, because of {err}");
                    state.close();
                    sleep(self.shared.config.link_recovery_timeout).await;
                }
            }
        }
    }
}

#[async_trait]
impl Connector for TcpTransporter {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_window_linear() {
        // (last_successful, last_attempted) = (5, 10)
        assert!(!in_reply_window(5, 5, 10));
        assert!(in_reply_window(6, 5, 10));
        assert!(in_reply_window(9, 5, 10));
        assert!(!in_reply_window(10, 5, 10));
        assert!(!in_reply_window(11, 5, 10));
        assert!(!in_reply_window(2, 5, 10));
    }

    #[test]
    fn reply_window_wrapped() {
        // The counter wrapped between the last success and the last attempt.
        assert!(in_reply_window(0xFFF5, 0xFFF0, 5));
        assert!(in_reply_window(0, 0xFFF0, 5));
        assert!(in_reply_window(4, 0xFFF0, 5));
        assert!(!in_reply_window(5, 0xFFF0, 5));
        assert!(!in_reply_window(0xFFF0, 0xFFF0, 5));
        assert!(!in_reply_window(0x8000, 0xFFF0, 5));
    }

    #[test]
    fn deadline_disabled_without_timeout() {
        let mut config = TcpConfig::new("localhost:502");
        config.timeout = Duration::ZERO;
        assert!(io_deadline(&config, Instant::now()).is_none());
        config.timeout = Duration::from_secs(1);
        assert!(io_deadline(&config, Instant::now()).is_some());
    }
}
