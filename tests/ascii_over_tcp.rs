// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ASCII-over-TCP tunnel against local fake servers.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use tokio_modbus_link::codec::ascii::AsciiPackager;
use tokio_modbus_link::prelude::*;

/// Accepts one connection, reads one CRLF-terminated request and writes
/// the canned response frame.
async fn serve_one(listener: TcpListener, response: Vec<u8>) {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut request = Vec::new();
    let mut byte = [0u8; 1];
    while !request.ends_with(b"\r\n") {
        socket.read_exact(&mut byte).await.unwrap();
        request.push(byte[0]);
    }
    socket.write_all(&response).await.unwrap();
    let mut sink = [0u8; 64];
    while socket.read(&mut sink).await.unwrap_or(0) > 0 {}
}

fn client_for(addr: std::net::SocketAddr) -> Client {
    let mut config = TcpConfig::new(addr.to_string());
    config.timeout = Duration::from_secs(1);
    config.slave = Slave(0x11);
    Client::ascii_over_tcp(config)
}

#[tokio::test]
async fn reads_holding_registers() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let packager = AsciiPackager::new(Slave(0x11));
    let response = packager
        .encode(&Pdu::new(
            0x03,
            &[0x06, 0xAE, 0x41, 0x56, 0x52, 0x43, 0x40][..],
        ))
        .unwrap();
    tokio::spawn(serve_one(listener, response.to_vec()));

    let payload = client_for(addr).read_holding_registers(0x6B, 3).await.unwrap();
    assert_eq!(&payload[..], &[0xAE, 0x41, 0x56, 0x52, 0x43, 0x40]);
}

#[tokio::test]
async fn accepts_alternate_start_character() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let packager = AsciiPackager::new(Slave(0x11));
    let mut response = packager
        .encode(&Pdu::new(
            0x03,
            &[0x06, 0xAE, 0x41, 0x56, 0x52, 0x43, 0x40][..],
        ))
        .unwrap()
        .to_vec();
    // Some field devices reply with '>' instead of ':'.
    response[0] = b'>';
    tokio::spawn(serve_one(listener, response));

    let payload = client_for(addr).read_holding_registers(0x6B, 3).await.unwrap();
    assert_eq!(&payload[..], &[0xAE, 0x41, 0x56, 0x52, 0x43, 0x40]);
}

#[tokio::test]
async fn surfaces_exception_responses() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let packager = AsciiPackager::new(Slave(0x11));
    let response = packager.encode(&Pdu::new(0x83, &[0x02][..])).unwrap();
    tokio::spawn(serve_one(listener, response.to_vec()));

    let err = client_for(addr)
        .read_holding_registers(0x6B, 3)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Exception {
            function: 0x83,
            code: 0x02
        }
    ));
}
