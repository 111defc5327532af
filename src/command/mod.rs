// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Datalogger commands
//!
//! A command performs one or more exchanges over a [`Link`]. Higher level
//! commands are composed of the raw register commands.

use async_trait::async_trait;

use crate::{descriptor::Descriptor, error::DescriptorError, link::Link, Result};

mod descr;
mod info;
mod param;
mod ping;
mod raw;
mod segment;

pub use self::{
    descr::{RegReadDescr, RegWriteDescr},
    info::{DeviceInfo, DeviceInfoResult},
    param::{SetParam, PARAM_PASSWORD, PARAM_RESTART, PARAM_SSID},
    ping::{Ping, PingResult},
    raw::{RegReadRaw, RegWriteRaw},
    segment::{RegReadSeg, SegmentValues},
};

/// Transport independent command trait
#[async_trait]
pub trait Command: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Runs the command.
    ///
    /// `descriptor` is the register map of the connected datalogger, if it
    /// has been loaded.
    async fn handle(&self, link: &mut Link, descriptor: Option<&Descriptor>)
        -> Result<Self::Output>;
}

fn require(descriptor: Option<&Descriptor>) -> Result<&Descriptor> {
    descriptor.ok_or_else(|| DescriptorError::NotLoaded.into())
}
