// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use bytes::Bytes;

use super::Command;
use crate::{
    descriptor::Descriptor,
    frame::{Address, DevAddr, Quantity, Request},
    link::Link,
    Result,
};

/// Reads `quantity` registers of a device behind the datalogger.
///
/// Returns the register bytes exactly as sent by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegReadRaw {
    pub dev_addr: DevAddr,
    pub function: u8,
    pub address: Address,
    pub quantity: Quantity,
}

/// Writes raw register bytes to a device behind the datalogger.
///
/// Returns the echoed address and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegWriteRaw {
    pub dev_addr: DevAddr,
    pub function: u8,
    pub address: Address,
    pub data: Bytes,
}

#[async_trait]
impl Command for RegReadRaw {
    type Output = Bytes;

    async fn handle(&self, link: &mut Link, _: Option<&Descriptor>) -> Result<Bytes> {
        let req = Request::forward_read(self.dev_addr, self.function, self.address, self.quantity);
        let rsp = link.call(&req).await?;
        Ok(rsp.body)
    }
}

#[async_trait]
impl Command for RegWriteRaw {
    type Output = Bytes;

    async fn handle(&self, link: &mut Link, _: Option<&Descriptor>) -> Result<Bytes> {
        let req = Request::forward_write(
            self.dev_addr,
            self.function,
            self.address,
            self.data.clone(),
        );
        let rsp = link.call(&req).await?;
        Ok(rsp.body)
    }
}
