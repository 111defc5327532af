// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use super::Command;
use crate::{
    descriptor::Descriptor,
    frame::{Param, Request},
    link::Link,
    Result,
};

/// WiFi network name.
pub const PARAM_SSID: Param = 41;

/// WiFi password.
pub const PARAM_PASSWORD: Param = 43;

/// Restarts the datalogger.
pub const PARAM_RESTART: Param = 29;

/// Sets a single collector parameter and returns the status byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetParam {
    pub param: Param,
    pub value: String,
}

impl SetParam {
    #[must_use]
    pub fn new(param: Param, value: impl Into<String>) -> Self {
        Self {
            param,
            value: value.into(),
        }
    }
}

#[async_trait]
impl Command for SetParam {
    type Output = u8;

    async fn handle(&self, link: &mut Link, _: Option<&Descriptor>) -> Result<u8> {
        let req = Request::set_collector(self.param, self.value.clone());
        let rsp = link.call(&req).await?;
        log::debug!(
            "Parameter {} set with status {}",
            rsp.body.param,
            rsp.body.status
        );
        Ok(rsp.body.status)
    }
}
