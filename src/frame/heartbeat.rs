// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use bytes::{BufMut as _, Bytes, BytesMut};
use chrono::{DateTime, Datelike as _, Timelike as _, Utc};

use super::*;

const HEARTBEAT_TRANSACTION_ID: TransactionId = 0xBEEF;

/// Interval announced to the datalogger, in seconds.
const HEARTBEAT_INTERVAL: u16 = 300;

/// Heartbeats are answered quickly or not at all.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_millis(500);

/// Keep-alive carrying the current UTC time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub timestamp: DateTime<Utc>,
    pub interval: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatResponse {
    /// The response body as lowercase hex.
    pub pn: String,
}

impl Request<Heartbeat> {
    #[must_use]
    pub fn heartbeat() -> Self {
        Self::heartbeat_at(Utc::now())
    }

    #[must_use]
    pub fn heartbeat_at(timestamp: DateTime<Utc>) -> Self {
        Self {
            hdr: Header::datalogger(HEARTBEAT_TRANSACTION_ID, FunctionCode::Heartbeat),
            body: Heartbeat {
                timestamp,
                interval: HEARTBEAT_INTERVAL,
            },
            timeout: Some(HEARTBEAT_TIMEOUT),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
impl RequestBody for Heartbeat {
    type Response = HeartbeatResponse;

    fn encode(&self, buf: &mut BytesMut) {
        let ts = &self.timestamp;
        log::trace!("Heartbeat at {ts}");
        buf.put_u8(((ts.year() - 2000).rem_euclid(256)) as u8);
        buf.put_u8(ts.month() as u8);
        buf.put_u8(ts.day() as u8);
        buf.put_u8(ts.hour() as u8);
        buf.put_u8(ts.minute() as u8);
        buf.put_u8(ts.second() as u8);
        buf.put_u16(self.interval);
    }

    fn decode_response(&self, body: Bytes) -> Result<Self::Response> {
        Ok(HeartbeatResponse {
            pn: hex::encode(body),
        })
    }
}
