// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic polling of named registers
//!
//! A [`Collector`] reads a configured set of registers through a [`Client`]
//! on every tick and hands out [`Event`]s: connectivity transitions and
//! snapshots of the latest values.

use std::{collections::BTreeMap, time::Duration};

use serde::Deserialize;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::{
    client::Client,
    command::RegReadDescr,
    descriptor::{Register, Segment},
    error::DescriptorError,
    value::RegValue,
    Error, Result,
};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Collector settings.
///
/// Deserializes from the keys `Enabled`, `Interval` and `Registers`.
/// `Interval` is a duration string like `"10s"` or `"1m 30s"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "Enabled")]
    pub enabled: bool,

    #[serde(rename = "Interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Register display name by export id.
    #[serde(rename = "Registers")]
    pub registers: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: DEFAULT_INTERVAL,
            registers: BTreeMap::new(),
        }
    }
}

/// A register being polled together with its most recent reading.
#[derive(Debug, Clone, PartialEq)]
pub struct PolledRegister {
    pub segment: Segment,
    pub register: Register,
    pub last_value: Option<RegValue>,
}

/// Polled registers by export id.
pub type PollState = BTreeMap<String, PolledRegister>;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The datalogger went offline (`false`) or came (back) online (`true`).
    Connectivity(bool),

    /// The state after a completed poll.
    Snapshot(PollState),
}

/// Receiving end of a polling task.
#[derive(Debug)]
pub struct Collector {
    events: mpsc::Receiver<Event>,
}

impl Collector {
    /// Starts polling.
    ///
    /// Waits for the client to connect and resolves the configured register
    /// names against the loaded descriptor. Names that cannot be resolved
    /// are skipped.
    ///
    /// A disabled collector never produces any events. An enabled one
    /// needs a non-zero interval.
    pub async fn start(client: Client, config: Config) -> Result<Self> {
        let (tx, rx) = mpsc::channel(1);
        if !config.enabled {
            log::info!("Collector is disabled");
            return Ok(Self { events: rx });
        }
        if config.interval.is_zero() {
            return Err(Error::Config("collector interval must be non-zero".to_owned()));
        }

        client.wait_connection().await?;
        let descriptor = client.descriptor().ok_or(DescriptorError::NotLoaded)?;

        let mut state = PollState::new();
        for (export_id, name) in &config.registers {
            match RegReadDescr::named(&descriptor, name) {
                Ok(RegReadDescr { segment, register }) => {
                    state.insert(
                        export_id.clone(),
                        PolledRegister {
                            segment,
                            register,
                            last_value: None,
                        },
                    );
                }
                Err(err) => {
                    log::error!("Skipping register {name:?} from polling: {err}");
                }
            }
        }
        log::info!(
            "Polling {} register(s) every {}",
            state.len(),
            humantime::format_duration(config.interval)
        );

        let task = PollTask {
            client,
            interval: config.interval,
            state,
            events: tx,
        };
        tokio::spawn(task.run());

        Ok(Self { events: rx })
    }

    /// Receives the next event.
    ///
    /// Returns `None` after polling has stopped.
    pub async fn next_event(&mut self) -> Option<Event> {
        self.events.recv().await
    }
}

struct PollTask {
    client: Client,
    interval: Duration,
    state: PollState,
    events: mpsc::Sender<Event>,
}

impl PollTask {
    async fn run(mut self) {
        let mut ticks = interval_at(Instant::now() + self.interval, self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut first_poll = true;
        loop {
            ticks.tick().await;

            let offline = !self.client.is_connected();
            if offline && self.events.send(Event::Connectivity(false)).await.is_err() {
                break;
            }
            log::debug!("Waiting for connection");
            if let Err(err) = self.client.wait_connection().await {
                log::debug!("Stop polling: {err}");
                break;
            }
            let online = offline || first_poll;
            if online && self.events.send(Event::Connectivity(true)).await.is_err() {
                break;
            }
            first_poll = false;

            self.poll().await;

            match self.events.try_send(Event::Snapshot(self.state.clone())) {
                Ok(()) => log::debug!("Sent updated state"),
                Err(TrySendError::Full(_)) => log::debug!("Consumer busy, dropping snapshot"),
                Err(TrySendError::Closed(_)) => break,
            }
        }
        log::debug!("Collector terminated");
    }

    async fn poll(&mut self) {
        for (export_id, polled) in &mut self.state {
            log::debug!("Polling register {export_id}");
            let cmd = RegReadDescr {
                segment: polled.segment,
                register: polled.register.clone(),
            };
            match self.client.send_command(cmd).await {
                Ok(value) => polled.last_value = Some(value),
                Err(err) => log::error!("Failed to read register {export_id}: {err}"),
            }
        }
    }
}
