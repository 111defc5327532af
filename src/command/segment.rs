// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{require, Command, RegReadRaw};
use crate::{
    descriptor::{Descriptor, Segment},
    error::DescriptorError,
    frame::Address,
    link::Link,
    value::RegValue,
    Result,
};

/// Decoded registers of a segment by address.
pub type SegmentValues = BTreeMap<Address, RegValue>;

/// Reads and decodes all registers of a segment.
///
/// Editable segments are read register by register, all others with a
/// single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegReadSeg {
    pub segment: Segment,
}

impl RegReadSeg {
    async fn read_contiguous(
        &self,
        link: &mut Link,
        descriptor: &Descriptor,
    ) -> Result<SegmentValues> {
        let read = RegReadRaw {
            dev_addr: descriptor.dev_addr()?,
            function: self.segment.fun_number,
            address: self.segment.start_address,
            quantity: self.segment.length,
        };
        let data = read.handle(link, Some(descriptor)).await?;

        let mut values = SegmentValues::new();
        let mut addr = self.segment.start_address;
        let mut offset = 0;
        while offset < data.len() {
            let reg = descriptor
                .find_register_by_addr(addr)
                .ok_or(DescriptorError::UnknownAddress(addr))?;
            let words = reg.word_count().max(1);
            let end = (offset + 2 * usize::from(words)).min(data.len());
            values.insert(addr, RegValue::decode(&data[offset..end], reg, descriptor));
            offset = end;
            addr = addr.wrapping_add(words);
        }
        Ok(values)
    }

    async fn read_sparse(&self, link: &mut Link, descriptor: &Descriptor) -> Result<SegmentValues> {
        let dev_addr = descriptor.dev_addr()?;
        let mut values = SegmentValues::new();
        let mut next = u32::from(self.segment.start_address);
        while next < self.segment.end_address() {
            let Ok(addr) = Address::try_from(next) else {
                break;
            };
            let Some(reg) = descriptor.find_register_by_addr(addr) else {
                log::debug!("No register at address {addr}, skipping");
                next += 1;
                continue;
            };
            let words = reg.word_count().max(1);
            next += u32::from(words);
            let read = RegReadRaw {
                dev_addr,
                function: self.segment.fun_number,
                address: addr,
                quantity: words,
            };
            match read.handle(link, Some(descriptor)).await {
                Ok(data) => {
                    values.insert(addr, RegValue::decode(&data, reg, descriptor));
                }
                Err(err) if err.is_connection_lost() => return Err(err),
                Err(err) => {
                    log::warn!("Failed to read register {addr}: {err}");
                }
            }
        }
        Ok(values)
    }
}

#[async_trait]
impl Command for RegReadSeg {
    type Output = SegmentValues;

    async fn handle(
        &self,
        link: &mut Link,
        descriptor: Option<&Descriptor>,
    ) -> Result<SegmentValues> {
        let descriptor = require(descriptor)?;
        if self.segment.can_edit {
            self.read_sparse(link, descriptor).await
        } else {
            self.read_contiguous(link, descriptor).await
        }
    }
}
