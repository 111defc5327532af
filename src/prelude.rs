// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types and traits

///////////////////////////////////////////////////////////////////
/// Modules
///////////////////////////////////////////////////////////////////
pub use crate::{client, collector, command};

///////////////////////////////////////////////////////////////////
/// Types
///////////////////////////////////////////////////////////////////
pub use crate::client::{Client, Config};
pub use crate::collector::{Collector, Event};
pub use crate::command::{
    DeviceInfo, Ping, RegReadDescr, RegReadRaw, RegReadSeg, RegWriteDescr, RegWriteRaw, SetParam,
};
pub use crate::descriptor::{Descriptor, Register, Segment};
pub use crate::link::Link;
pub use crate::value::{RegValue, Value};
pub use crate::{Error, Result};

///////////////////////////////////////////////////////////////////
/// Traits
///////////////////////////////////////////////////////////////////
pub use crate::client::Connector;
pub use crate::command::Command;
