// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use bytes::{Buf as _, BufMut as _, Bytes, BytesMut};

use crate::error::ProtocolError;

use super::*;

const COLLECTOR_TRANSACTION_ID: TransactionId = 1;

/// A collector parameter code.
pub type Param = u8;

/// Query one or more collector parameters.
///
/// The datalogger answers with one frame per parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCollector {
    pub params: Vec<Param>,
}

/// A single answered parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorParam {
    pub code: u8,
    pub param: Param,
    pub data: String,
}

/// Set a single collector parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCollector {
    pub param: Param,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetCollectorStatus {
    pub status: u8,
    pub param: Param,
}

impl Request<QueryCollector> {
    #[must_use]
    pub fn query_collector(params: impl Into<Vec<Param>>) -> Self {
        Self {
            hdr: Header::datalogger(COLLECTOR_TRANSACTION_ID, FunctionCode::QueryCollector),
            body: QueryCollector {
                params: params.into(),
            },
            timeout: None,
        }
    }
}

impl Request<SetCollector> {
    #[must_use]
    pub fn set_collector(param: Param, value: impl Into<String>) -> Self {
        Self {
            hdr: Header::datalogger(COLLECTOR_TRANSACTION_ID, FunctionCode::SetCollector),
            body: SetCollector {
                param,
                value: value.into(),
            },
            timeout: None,
        }
    }
}

fn check_min_len(body: &Bytes, min_len: usize) -> Result<()> {
    if body.len() < min_len {
        return Err(ProtocolError::InvalidResponse(format!(
            "expected at least {min_len} bytes, got {}",
            body.len()
        ))
        .into());
    }
    Ok(())
}

impl RequestBody for QueryCollector {
    type Response = CollectorParam;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.params);
    }

    fn decode_response(&self, mut body: Bytes) -> Result<Self::Response> {
        check_min_len(&body, 2)?;
        let code = body.get_u8();
        let param = body.get_u8();
        let data = String::from_utf8_lossy(&body).into_owned();
        Ok(CollectorParam { code, param, data })
    }
}

impl RequestBody for SetCollector {
    type Response = SetCollectorStatus;

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.param);
        buf.put_slice(self.value.as_bytes());
    }

    fn decode_response(&self, mut body: Bytes) -> Result<Self::Response> {
        check_min_len(&body, 2)?;
        Ok(SetCollectorStatus {
            status: body.get_u8(),
            param: body.get_u8(),
        })
    }
}
