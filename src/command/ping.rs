// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use super::Command;
use crate::{descriptor::Descriptor, frame::Request, link::Link, Result};

/// Heartbeat carrying the current time.
///
/// Also sent automatically while the link is idle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ping;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingResult {
    pub pn: String,
}

#[async_trait]
impl Command for Ping {
    type Output = PingResult;

    async fn handle(&self, link: &mut Link, _: Option<&Descriptor>) -> Result<PingResult> {
        let rsp = link.call(&Request::heartbeat()).await?;
        log::debug!("Heartbeat answered with {}", rsp.body.pn);
        Ok(PingResult { pn: rsp.body.pn })
    }
}
