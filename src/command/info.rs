// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use super::Command;
use crate::{
    descriptor::Descriptor,
    error::ProtocolError,
    frame::{Param, Request},
    link::Link,
    Result,
};

const DEVICE_TYPE: Param = 1;
const SERIAL_NUMBER: Param = 2;
const MANUFACTURER: Param = 3;
const PROTOCOL_VERSION: Param = 4;
const FIRMWARE_VERSION: Param = 5;
const HARDWARE_VERSION: Param = 6;
const FACTORY_TIME: Param = 7;
const DEVICES_ONLINE: Param = 11;
const MONITORED_DEVICES: Param = 12;
const DEVICE_PROPS: Param = 14;
const SERIAL_BAUDRATE: Param = 34;
const SSID: Param = 41;
const CONNECTION_STATUS: Param = 48;

/// Queried in this order.
const PARAMS: [Param; 13] = [
    DEVICE_TYPE,
    SERIAL_NUMBER,
    FIRMWARE_VERSION,
    HARDWARE_VERSION,
    FACTORY_TIME,
    DEVICES_ONLINE,
    MONITORED_DEVICES,
    CONNECTION_STATUS,
    MANUFACTURER,
    PROTOCOL_VERSION,
    DEVICE_PROPS,
    SERIAL_BAUDRATE,
    SSID,
];

/// Queries the identification of the datalogger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceInfo;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfoResult {
    pub device_type: String,
    pub serial_number: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub factory_time: String,
    pub devices_online: String,
    pub monitored_devices: String,
    pub connection_status: String,
    pub manufacturer: String,
    pub protocol_version: String,
    pub device_props: String,
    pub serial_baudrate: String,
    pub ssid: String,
}

impl DeviceInfoResult {
    /// Identifies the descriptor file of the connected device.
    #[must_use]
    pub fn protocol_token(&self) -> &str {
        self.device_props
            .split(',')
            .next()
            .unwrap_or_default()
    }

    fn field_mut(&mut self, param: Param) -> Option<&mut String> {
        let field = match param {
            DEVICE_TYPE => &mut self.device_type,
            SERIAL_NUMBER => &mut self.serial_number,
            MANUFACTURER => &mut self.manufacturer,
            PROTOCOL_VERSION => &mut self.protocol_version,
            FIRMWARE_VERSION => &mut self.firmware_version,
            HARDWARE_VERSION => &mut self.hardware_version,
            FACTORY_TIME => &mut self.factory_time,
            DEVICES_ONLINE => &mut self.devices_online,
            MONITORED_DEVICES => &mut self.monitored_devices,
            DEVICE_PROPS => &mut self.device_props,
            SERIAL_BAUDRATE => &mut self.serial_baudrate,
            SSID => &mut self.ssid,
            CONNECTION_STATUS => &mut self.connection_status,
            _ => return None,
        };
        Some(field)
    }
}

#[async_trait]
impl Command for DeviceInfo {
    type Output = DeviceInfoResult;

    async fn handle(&self, link: &mut Link, _: Option<&Descriptor>) -> Result<DeviceInfoResult> {
        let req = Request::query_collector(PARAMS);
        link.write_request(&req).await?;

        // One response frame per parameter.
        let mut info = DeviceInfoResult::default();
        for _ in 0..req.body.params.len() {
            let rsp = link.read_response(&req).await?;
            let param = rsp.body;
            log::debug!("Got parameter {} = {:?}", param.param, param.data);
            let Some(field) = info.field_mut(param.param) else {
                return Err(ProtocolError::UnknownParameter {
                    param: param.param,
                    data: param.data,
                }
                .into());
            };
            *field = param.data;
        }
        Ok(info)
    }
}
