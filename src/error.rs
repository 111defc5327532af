// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::io;

use thiserror::Error;

use crate::frame::{ExceptionCode, FunctionCode};

/// Protocol or transport errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The datalogger answered, but not the way the request expected.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The descriptor does not support the requested operation.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// The underlying link failed or a deadline expired.
    #[error(transparent)]
    Transport(#[from] io::Error),

    /// A setting cannot be used as given.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The background task owning the link has terminated.
    #[error("client task terminated")]
    Closed,
}

impl Error {
    /// Whether this error means the link must be torn down and rebuilt.
    ///
    /// Only end-of-stream, broken or reset connections and expired read
    /// deadlines qualify. Everything else leaves the link usable.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Self::Transport(err) => is_connection_lost_kind(err.kind()),
            _ => false,
        }
    }
}

pub(crate) const fn is_connection_lost_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

/// _Protocol_ errors, i.e. responses that do not match the request.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The function codes of request and response differ.
    #[error("unexpected function code in response (expected {request} got {response})")]
    FunctionCodeMismatch {
        request: FunctionCode,
        response: FunctionCode,
    },

    /// A parameter query was answered with a parameter that was never asked for.
    #[error("unknown parameter {param} = {data:?}")]
    UnknownParameter { param: u8, data: String },

    /// The device behind the datalogger responded with a _Modbus_ exception.
    #[error("exception for function 0x{function:02X}: {exception}")]
    Exception {
        function: u8,
        exception: ExceptionCode,
    },

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The checksum of a forwarded frame is wrong.
    #[error("CRC is not correct: 0x{actual:04X} instead of 0x{expected:04X}")]
    CrcMismatch { expected: u16, actual: u16 },
}

/// Errors caused by the register descriptor or by using it wrongly.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("failed to read descriptor: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse descriptor: {0}")]
    Json(#[from] serde_json::Error),

    /// Only the default address offset mode (`OffsetType` 0) is supported.
    #[error("unsupported addressing mode (offset type {0} != 0)")]
    UnsupportedAddressing(i64),

    #[error("descriptor is not loaded")]
    NotLoaded,

    #[error("descriptor lists no device address")]
    NoDeviceAddress,

    #[error("register {0:?} not found")]
    UnknownRegister(String),

    /// The register exists, but no segment covers its address.
    #[error("no segment covers register {name:?} at address {address}")]
    MissingSegment { name: String, address: u16 },

    /// The device returned data for an address the descriptor does not know.
    #[error("no register at address {0} (descriptor does not match device)")]
    UnknownAddress(u16),

    #[error("unsupported value type {0}")]
    UnsupportedValueType(i32),

    #[error("unsupported register length {0}")]
    UnsupportedLength(u16),

    /// The value does not fit into a single register word.
    #[error("value {0} is out of range for a register")]
    ValueOutOfRange(f32),
}
