// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use bytes::Bytes;

use super::{require, Command, RegReadRaw, RegWriteRaw};
use crate::{
    descriptor::{Descriptor, Register, Segment},
    error::DescriptorError,
    link::Link,
    value::{self, RegValue},
    Result,
};

/// The only value type the register commands can handle.
const SUPPORTED_VALUE_TYPE: i32 = 1;

fn check_value_type(reg: &Register) -> Result<()> {
    if reg.value_type != SUPPORTED_VALUE_TYPE {
        return Err(DescriptorError::UnsupportedValueType(reg.value_type).into());
    }
    Ok(())
}

fn resolve(descriptor: &Descriptor, name: &str) -> Result<(Segment, Register), DescriptorError> {
    match descriptor.find_register(name) {
        None => Err(DescriptorError::UnknownRegister(name.to_owned())),
        Some((None, reg)) => Err(DescriptorError::MissingSegment {
            name: name.to_owned(),
            address: reg.address,
        }),
        Some((Some(segment), reg)) => Ok((*segment, reg.clone())),
    }
}

/// Reads and decodes a single register.
#[derive(Debug, Clone, PartialEq)]
pub struct RegReadDescr {
    pub segment: Segment,
    pub register: Register,
}

impl RegReadDescr {
    /// Looks up the register by its display name.
    pub fn named(descriptor: &Descriptor, name: &str) -> Result<Self, DescriptorError> {
        let (segment, register) = resolve(descriptor, name)?;
        Ok(Self { segment, register })
    }
}

#[async_trait]
impl Command for RegReadDescr {
    type Output = RegValue;

    async fn handle(&self, link: &mut Link, descriptor: Option<&Descriptor>) -> Result<RegValue> {
        let descriptor = require(descriptor)?;
        check_value_type(&self.register)?;
        let read = RegReadRaw {
            dev_addr: descriptor.dev_addr()?,
            function: self.segment.fun_number,
            address: self.register.address,
            quantity: self.register.word_count(),
        };
        let data = read.handle(link, Some(descriptor)).await?;
        Ok(RegValue::decode(&data, &self.register, descriptor))
    }
}

/// Encodes and writes a single word register.
///
/// Returns the echoed address and value.
#[derive(Debug, Clone, PartialEq)]
pub struct RegWriteDescr {
    pub segment: Segment,
    pub register: Register,
    pub value: f32,
}

impl RegWriteDescr {
    /// Looks up the register by its display name.
    pub fn named(descriptor: &Descriptor, name: &str, value: f32) -> Result<Self, DescriptorError> {
        let (segment, register) = resolve(descriptor, name)?;
        Ok(Self {
            segment,
            register,
            value,
        })
    }
}

#[async_trait]
impl Command for RegWriteDescr {
    type Output = Bytes;

    async fn handle(&self, link: &mut Link, descriptor: Option<&Descriptor>) -> Result<Bytes> {
        let descriptor = require(descriptor)?;
        check_value_type(&self.register)?;
        let data = value::encode(self.value, &self.register)?;
        let write = RegWriteRaw {
            dev_addr: descriptor.dev_addr()?,
            function: descriptor.configuration.write_one_fun_code,
            address: self.register.address,
            data: Bytes::copy_from_slice(&data),
        };
        log::debug!(
            "Writing {} to register {} as {data:02X?}",
            self.value,
            self.register.address
        );
        write.handle(link, Some(descriptor)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::tests::descriptor;

    #[test]
    fn named_registers() {
        let descr = descriptor();
        let cmd = RegReadDescr::named(&descr, "Voltage").unwrap();
        assert_eq!(cmd.register.address, 101);
        assert_eq!(cmd.segment.start_address, 100);

        let cmd = RegWriteDescr::named(&descr, "Charge limit", 80.0).unwrap();
        assert_eq!(cmd.segment.start_address, 200);
        assert!(cmd.segment.can_edit);
    }

    #[test]
    fn named_register_errors() {
        let descr = descriptor();
        assert!(matches!(
            RegReadDescr::named(&descr, "Nonexistent"),
            Err(DescriptorError::UnknownRegister(name)) if name == "Nonexistent"
        ));
        assert!(matches!(
            RegWriteDescr::named(&descr, "Unplaced", 1.0),
            Err(DescriptorError::MissingSegment { address: 300, .. })
        ));
    }
}
