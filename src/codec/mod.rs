// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::{self, Error, ErrorKind};

use bytes::{Buf as _, BufMut as _, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{FunctionCode, Header};

pub(crate) mod rtu;

pub(crate) const HEADER_SIZE: usize = 8;

/// The wire `Size` field counts two bytes more than the body.
const SIZE_OFFSET: u16 = 2;

/// An encoded request: header plus body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestAdu {
    pub(crate) hdr: Header,
    pub(crate) body: Bytes,
}

/// A received response: header plus raw body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponseAdu {
    pub(crate) hdr: Header,
    pub(crate) body: Bytes,
    /// The raw `Size` field if it is too small to describe a body.
    pub(crate) invalid_size: Option<u16>,
}

pub(crate) fn encode_header(hdr: &Header, buf: &mut BytesMut) -> io::Result<()> {
    let size = hdr.size.checked_add(SIZE_OFFSET).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("invalid body size {}", hdr.size),
        )
    })?;
    buf.reserve(HEADER_SIZE);
    buf.put_u16(hdr.transaction_id);
    buf.put_u16(hdr.dev_code);
    buf.put_u16(size);
    buf.put_u8(hdr.dev_addr);
    buf.put_u8(hdr.function.value());
    Ok(())
}

/// Decodes a complete header from the first [`HEADER_SIZE`] bytes of `buf`.
///
/// A `Size` field below the offset is returned as error.
pub(crate) fn decode_header(buf: &[u8]) -> Result<Header, InvalidSize> {
    debug_assert!(buf.len() >= HEADER_SIZE);
    let hdr = decode_header_lossy(buf);
    let raw_size = u16::from_be_bytes([buf[4], buf[5]]);
    if raw_size < SIZE_OFFSET {
        return Err(InvalidSize { hdr, raw_size });
    }
    Ok(hdr)
}

/// A header whose `Size` field cannot describe a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InvalidSize {
    /// The header with an empty body.
    pub(crate) hdr: Header,
    pub(crate) raw_size: u16,
}

fn decode_header_lossy(mut buf: &[u8]) -> Header {
    let transaction_id = buf.get_u16();
    let dev_code = buf.get_u16();
    let size = buf.get_u16().saturating_sub(SIZE_OFFSET);
    let dev_addr = buf.get_u8();
    let function = FunctionCode::new(buf.get_u8());
    Header {
        transaction_id,
        dev_code,
        size,
        dev_addr,
        function,
    }
}

#[derive(Debug, Default)]
pub(crate) struct ClientCodec {
    _private: (),
}

impl Decoder for ClientCodec {
    type Item = ResponseAdu;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<ResponseAdu>> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }
        let hdr = match decode_header(&buf[..HEADER_SIZE]) {
            Ok(hdr) => hdr,
            Err(InvalidSize { hdr, raw_size }) => {
                // The body length is unknown, only the header is consumed.
                buf.advance(HEADER_SIZE);
                log::warn!("Received frame {hdr:?} with invalid size field {raw_size}");
                return Ok(Some(ResponseAdu {
                    hdr,
                    body: Bytes::new(),
                    invalid_size: Some(raw_size),
                }));
            }
        };
        let body_len = usize::from(hdr.size);
        if buf.len() < HEADER_SIZE + body_len {
            buf.reserve(HEADER_SIZE + body_len - buf.len());
            return Ok(None);
        }
        buf.advance(HEADER_SIZE);
        let body = buf.split_to(body_len).freeze();
        log::trace!("Received frame {hdr:?} body {body:02X?}");
        Ok(Some(ResponseAdu {
            hdr,
            body,
            invalid_size: None,
        }))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<ResponseAdu>> {
        match self.decode(buf)? {
            Some(adu) => Ok(Some(adu)),
            None if buf.is_empty() => Ok(None),
            None => Err(Error::new(
                ErrorKind::UnexpectedEof,
                format!("connection closed with {} bytes of a partial frame", buf.len()),
            )),
        }
    }
}

impl Encoder<RequestAdu> for ClientCodec {
    type Error = Error;

    fn encode(&mut self, adu: RequestAdu, buf: &mut BytesMut) -> io::Result<()> {
        let RequestAdu { mut hdr, body } = adu;
        hdr.size = u16::try_from(body.len()).map_err(|_| {
            Error::new(
                ErrorKind::InvalidInput,
                format!("body of {} bytes does not fit into a frame", body.len()),
            )
        })?;
        buf.reserve(HEADER_SIZE + body.len());
        encode_header(&hdr, buf)?;
        buf.put_slice(&body);
        log::trace!("Sending frame {hdr:?} body {body:02X?}");
        Ok(())
    }
}
