// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! _Modbus_ RTU frames tunneled through the datalogger.

use bytes::{BufMut as _, Bytes, BytesMut};

use crate::{codec::rtu::calc_crc, error::ProtocolError};

use super::*;

const FORWARD_TRANSACTION_ID: TransactionId = 1;

/// Size of the trailing checksum.
const CRC_SIZE: usize = 2;

/// Payload of a write response: echoed address and value (or quantity).
const WRITE_RESPONSE_PAYLOAD_SIZE: usize = 4;

/// Read `quantity` registers starting at `address` from device `dev_addr`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardRead {
    pub dev_addr: DevAddr,
    pub function: u8,
    pub address: Address,
    pub quantity: Quantity,
}

/// Write `data` to device `dev_addr` starting at `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardWrite {
    pub dev_addr: DevAddr,
    pub function: u8,
    pub address: Address,
    pub data: Bytes,
}

impl<B> Request<B> {
    fn forward(body: B) -> Self {
        Self {
            hdr: Header::datalogger(FORWARD_TRANSACTION_ID, FunctionCode::Forward),
            body,
            timeout: None,
        }
    }
}

impl Request<ForwardRead> {
    #[must_use]
    pub fn forward_read(
        dev_addr: DevAddr,
        function: u8,
        address: Address,
        quantity: Quantity,
    ) -> Self {
        Self::forward(ForwardRead {
            dev_addr,
            function,
            address,
            quantity,
        })
    }
}

impl Request<ForwardWrite> {
    #[must_use]
    pub fn forward_write(
        dev_addr: DevAddr,
        function: u8,
        address: Address,
        data: impl Into<Bytes>,
    ) -> Self {
        Self::forward(ForwardWrite {
            dev_addr,
            function,
            address,
            data: data.into(),
        })
    }
}

fn put_crc(buf: &mut BytesMut, start: usize) {
    let crc = calc_crc(&buf[start..]);
    buf.put_u16(crc);
}

fn invalid(msg: impl Into<String>) -> crate::Error {
    ProtocolError::InvalidResponse(msg.into()).into()
}

/// Validates the RTU envelope of a forwarded response and returns the
/// frame without its checksum.
///
/// `payload_len` computes the payload size from the frame start, it is only
/// called once at least 3 bytes are present. Bytes after the checksum are
/// ignored.
fn check_rtu_response(
    body: &Bytes,
    dev_addr: DevAddr,
    function: u8,
    payload_len: impl FnOnce(&[u8]) -> usize,
) -> Result<Bytes> {
    if body.len() < 3 {
        return Err(invalid(format!("truncated RTU frame: {body:02X?}")));
    }
    let (rsp_addr, rsp_function) = (body[0], body[1]);
    if rsp_function == function | 0x80 {
        let exception = ExceptionCode::new(body[2]);
        return Err(ProtocolError::Exception {
            function,
            exception,
        }
        .into());
    }
    if rsp_function != function {
        return Err(invalid(format!(
            "RTU function mismatch: expected 0x{function:02X}, got 0x{rsp_function:02X}"
        )));
    }
    if rsp_addr != dev_addr {
        return Err(invalid(format!(
            "RTU device address mismatch: expected {dev_addr}, got {rsp_addr}"
        )));
    }
    let frame_len = 2 + payload_len(&body[..]);
    if body.len() < frame_len + CRC_SIZE {
        return Err(invalid(format!(
            "RTU frame too short: need {} bytes, got {}",
            frame_len + CRC_SIZE,
            body.len()
        )));
    }
    if body.len() > frame_len + CRC_SIZE {
        log::trace!(
            "Ignoring {} trailing bytes after RTU frame",
            body.len() - frame_len - CRC_SIZE
        );
    }
    let expected = calc_crc(&body[..frame_len]);
    let actual = u16::from_be_bytes([body[frame_len], body[frame_len + 1]]);
    if expected != actual {
        return Err(ProtocolError::CrcMismatch { expected, actual }.into());
    }
    Ok(body.slice(..frame_len))
}

impl RequestBody for ForwardRead {
    /// The register bytes as returned by the device.
    type Response = Bytes;

    fn encode(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.put_u8(self.dev_addr);
        buf.put_u8(self.function);
        buf.put_u16(self.address);
        buf.put_u16(self.quantity);
        put_crc(buf, start);
    }

    fn decode_response(&self, body: Bytes) -> Result<Self::Response> {
        let frame = check_rtu_response(&body, self.dev_addr, self.function, |frame| {
            1 + usize::from(frame[2])
        })?;
        Ok(frame.slice(3..))
    }
}

impl RequestBody for ForwardWrite {
    /// The echoed address and value as returned by the device.
    type Response = Bytes;

    fn encode(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.put_u8(self.dev_addr);
        buf.put_u8(self.function);
        buf.put_u16(self.address);
        buf.put_slice(&self.data);
        put_crc(buf, start);
    }

    fn decode_response(&self, body: Bytes) -> Result<Self::Response> {
        let frame = check_rtu_response(&body, self.dev_addr, self.function, |_| {
            WRITE_RESPONSE_PAYLOAD_SIZE
        })?;
        Ok(frame.slice(2..))
    }
}
