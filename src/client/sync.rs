// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blocking wrappers around the asynchronous client.
//!
//! Each instance owns a small runtime with a single background worker, so
//! idle-close timers keep firing between calls just like in async code.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::frame::ReadDeviceIdCode;
use crate::slave::Slave;

/// Synchronous Modbus client.
pub struct Client {
    runtime: tokio::runtime::Runtime,
    inner: super::Client,
}

impl Client {
    /// Wraps an asynchronous client for blocking callers.
    pub fn new(inner: super::Client) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(Error::Io)?;
        Ok(Self { runtime, inner })
    }

    /// Builds a blocking client from an address URL; see
    /// [`Client::connect`](super::Client::connect) for the schemes.
    pub fn connect(address: &str) -> Result<Self> {
        Self::new(super::Client::connect(address)?)
    }

    /// Selects the slave device for all subsequent requests.
    pub fn set_slave(&mut self, slave: Slave) {
        self.inner.set_slave(slave);
    }

    pub fn read_coils(&self, address: u16, quantity: u16) -> Result<Bytes> {
        self.runtime.block_on(self.inner.read_coils(address, quantity))
    }

    pub fn read_discrete_inputs(&self, address: u16, quantity: u16) -> Result<Bytes> {
        self.runtime
            .block_on(self.inner.read_discrete_inputs(address, quantity))
    }

    pub fn read_holding_registers(&self, address: u16, quantity: u16) -> Result<Bytes> {
        self.runtime
            .block_on(self.inner.read_holding_registers(address, quantity))
    }

    pub fn read_input_registers(&self, address: u16, quantity: u16) -> Result<Bytes> {
        self.runtime
            .block_on(self.inner.read_input_registers(address, quantity))
    }

    pub fn write_single_coil(&self, address: u16, value: u16) -> Result<Bytes> {
        self.runtime
            .block_on(self.inner.write_single_coil(address, value))
    }

    pub fn write_single_register(&self, address: u16, value: u16) -> Result<Bytes> {
        self.runtime
            .block_on(self.inner.write_single_register(address, value))
    }

    pub fn write_multiple_coils(
        &self,
        address: u16,
        quantity: u16,
        values: &[u8],
    ) -> Result<Bytes> {
        self.runtime
            .block_on(self.inner.write_multiple_coils(address, quantity, values))
    }

    pub fn write_multiple_registers(
        &self,
        address: u16,
        quantity: u16,
        values: &[u8],
    ) -> Result<Bytes> {
        self.runtime
            .block_on(self.inner.write_multiple_registers(address, quantity, values))
    }

    pub fn mask_write_register(
        &self,
        address: u16,
        and_mask: u16,
        or_mask: u16,
    ) -> Result<Bytes> {
        self.runtime
            .block_on(self.inner.mask_write_register(address, and_mask, or_mask))
    }

    pub fn read_write_multiple_registers(
        &self,
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        write_quantity: u16,
        values: &[u8],
    ) -> Result<Bytes> {
        self.runtime.block_on(self.inner.read_write_multiple_registers(
            read_address,
            read_quantity,
            write_address,
            write_quantity,
            values,
        ))
    }

    pub fn read_fifo_queue(&self, address: u16) -> Result<Bytes> {
        self.runtime.block_on(self.inner.read_fifo_queue(address))
    }

    pub fn read_device_identification(
        &self,
        id_code: ReadDeviceIdCode,
    ) -> Result<BTreeMap<u8, Bytes>> {
        self.runtime
            .block_on(self.inner.read_device_identification(id_code))
    }

    pub fn read_device_identification_with_offset(
        &self,
        id_code: ReadDeviceIdCode,
        object_id_offset: u8,
    ) -> Result<BTreeMap<u8, Bytes>> {
        self.runtime.block_on(
            self.inner
                .read_device_identification_with_offset(id_code, object_id_offset),
        )
    }
}
