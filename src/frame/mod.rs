// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Datalogger messages.
//!
//! Every request is a fixed [`Header`] followed by a body. The body knows how
//! to encode itself and how to decode the body of the matching response.

pub(crate) mod collector;
pub(crate) mod forward;
pub(crate) mod heartbeat;

use std::{
    fmt::{self, Display},
    time::Duration,
};

use bytes::{Bytes, BytesMut};

use crate::Result;

pub use self::{
    collector::{CollectorParam, Param, QueryCollector, SetCollector, SetCollectorStatus},
    forward::{ForwardRead, ForwardWrite},
    heartbeat::{Heartbeat, HeartbeatResponse},
};

/// Transaction identifier.
pub type TransactionId = u16;

/// Device code of the datalogger itself.
pub type DevCode = u16;

/// Bus address of a device, either the datalogger (`0xFF`) or a device
/// behind it.
pub type DevAddr = u8;

/// A register address.
pub type Address = u16;

/// Number of 16 bit register words.
pub type Quantity = u16;

/// The device address that targets the datalogger itself.
pub const DATALOGGER_ADDR: DevAddr = 0xFF;

/// A datalogger function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionCode {
    /// 01 (0x01) Heartbeat.
    Heartbeat,

    /// 02 (0x02) Query collector parameters.
    QueryCollector,

    /// 03 (0x03) Set a collector parameter.
    SetCollector,

    /// 04 (0x04) Forward a _Modbus_ RTU frame to a device behind the datalogger.
    Forward,

    /// Any other function code.
    Custom(u8),
}

impl FunctionCode {
    /// Create a new [`FunctionCode`] with `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        match value {
            0x01 => Self::Heartbeat,
            0x02 => Self::QueryCollector,
            0x03 => Self::SetCollector,
            0x04 => Self::Forward,
            code => Self::Custom(code),
        }
    }

    /// Gets the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Heartbeat => 0x01,
            Self::QueryCollector => 0x02,
            Self::SetCollector => 0x03,
            Self::Forward => 0x04,
            Self::Custom(code) => code,
        }
    }
}

impl Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// The fixed 8 byte frame header.
///
/// `size` is the length of the body that follows. On the wire the field
/// carries `size + 2`, the codec adds and removes the offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub transaction_id: TransactionId,
    pub dev_code: DevCode,
    pub size: u16,
    pub dev_addr: DevAddr,
    pub function: FunctionCode,
}

impl Header {
    /// A header addressed to the datalogger itself.
    #[must_use]
    pub const fn datalogger(transaction_id: TransactionId, function: FunctionCode) -> Self {
        Self {
            transaction_id,
            dev_code: 1,
            size: 0,
            dev_addr: DATALOGGER_ADDR,
            function,
        }
    }
}

/// The body of a request, paired with the decoder of its response.
pub trait RequestBody {
    /// The decoded response body.
    type Response;

    /// Appends the encoded body to `buf`.
    fn encode(&self, buf: &mut BytesMut);

    /// Decodes the body of a response to this request.
    fn decode_response(&self, body: Bytes) -> Result<Self::Response>;
}

/// A request: header, body and an optional deadline for its response.
///
/// Without an explicit timeout the default of the link applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<B> {
    pub hdr: Header,
    pub body: B,
    pub timeout: Option<Duration>,
}

/// A decoded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<R> {
    pub hdr: Header,
    pub body: R,
}

/// A _Modbus_ exception reported by a device behind the datalogger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    /// 0x01
    IllegalFunction,
    /// 0x02
    IllegalDataAddress,
    /// 0x03
    IllegalDataValue,
    /// 0x04
    ServerDeviceFailure,
    /// 0x05
    Acknowledge,
    /// 0x06
    ServerDeviceBusy,
    /// 0x08
    MemoryParityError,
    /// 0x0A
    GatewayPathUnavailable,
    /// 0x0B
    GatewayTargetDevice,
    /// None of the above.
    Custom(u8),
}

impl ExceptionCode {
    /// Create a new [`ExceptionCode`] with `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        use ExceptionCode::*;

        match value {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            other => Custom(other),
        }
    }

    fn description(&self) -> &str {
        use ExceptionCode::*;

        match *self {
            IllegalFunction => "Illegal function",
            IllegalDataAddress => "Illegal data address",
            IllegalDataValue => "Illegal data value",
            ServerDeviceFailure => "Server device failure",
            Acknowledge => "Acknowledge",
            ServerDeviceBusy => "Server device busy",
            MemoryParityError => "Memory parity error",
            GatewayPathUnavailable => "Gateway path unavailable",
            GatewayTargetDevice => "Gateway target device failed to respond",
            Custom(_) => "Custom",
        }
    }
}

impl From<ExceptionCode> for u8 {
    fn from(from: ExceptionCode) -> Self {
        use ExceptionCode::*;

        match from {
            IllegalFunction => 0x01,
            IllegalDataAddress => 0x02,
            IllegalDataValue => 0x03,
            ServerDeviceFailure => 0x04,
            Acknowledge => 0x05,
            ServerDeviceBusy => 0x06,
            MemoryParityError => 0x08,
            GatewayPathUnavailable => 0x0A,
            GatewayTargetDevice => 0x0B,
            Custom(code) => code,
        }
    }
}

impl Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), u8::from(*self))
    }
}
