// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};

use super::{backoff::Backoff, Config, Connector};
use crate::{
    command::{Command, DeviceInfo, Ping},
    descriptor::Descriptor,
    link::Link,
    Result,
};

/// The only protocol variant verified against real hardware.
const TESTED_PROTOCOL: &str = "0925";

/// Connection state shared with all [`super::Client`] handles.
#[derive(Debug, Clone, Default)]
pub(super) struct State {
    pub(super) connected: bool,
    pub(super) descriptor: Option<Arc<Descriptor>>,
}

/// A type-erased command together with the channel for its result.
#[async_trait]
pub(super) trait Job: Send {
    /// Executes the command and returns `true` if the link has been lost.
    async fn run(self: Box<Self>, link: &mut Link, descriptor: Option<&Descriptor>) -> bool;
}

pub(super) struct Pending<C: Command> {
    cmd: C,
    tx: oneshot::Sender<Result<C::Output>>,
}

impl<C: Command> Pending<C> {
    pub(super) fn new(cmd: C, tx: oneshot::Sender<Result<C::Output>>) -> Self {
        Self { cmd, tx }
    }
}

#[async_trait]
impl<C: Command> Job for Pending<C> {
    async fn run(self: Box<Self>, link: &mut Link, descriptor: Option<&Descriptor>) -> bool {
        let Self { cmd, tx } = *self;
        let res = cmd.handle(link, descriptor).await;
        let lost = match &res {
            Err(err) if err.is_connection_lost() => {
                log::error!("Connection lost: {err}");
                true
            }
            _ => false,
        };
        if tx.send(res).is_err() {
            log::debug!("Caller has gone away before receiving the result");
        }
        lost
    }
}

pub(super) struct Task<C> {
    config: Config,
    connector: C,
    jobs: mpsc::Receiver<Box<dyn Job>>,
    state: watch::Sender<State>,
    backoff: Backoff,
}

impl<C: Connector> Task<C> {
    pub(super) fn new(
        config: Config,
        connector: C,
        jobs: mpsc::Receiver<Box<dyn Job>>,
        state: watch::Sender<State>,
    ) -> Self {
        let backoff = Backoff::new(config.initial_backoff, config.max_backoff);
        Self {
            config,
            connector,
            jobs,
            state,
            backoff,
        }
    }

    pub(super) async fn run(mut self) {
        while let Some(mut link) = self.establish().await {
            let lost = self.serve(&mut link).await;
            if let Err(err) = link.close().await {
                log::debug!("Failed to close link: {err}");
            }
            self.state.send_modify(|state| state.connected = false);
            if !lost {
                break;
            }
        }
        log::debug!("All clients dropped, terminating");
    }

    /// Connects and publishes the new descriptor.
    ///
    /// Returns `None` once no client handle is left.
    async fn establish(&mut self) -> Option<Link> {
        loop {
            let attempt = tokio::select! {
                attempt = self.connect() => attempt,
                () = self.state.closed() => return None,
            };
            match attempt {
                Ok((link, descriptor)) => {
                    self.state.send_modify(|state| {
                        state.descriptor = Some(Arc::new(descriptor));
                        state.connected = true;
                    });
                    return Some(link);
                }
                Err(err) => {
                    let delay = self.backoff.next_delay();
                    log::error!("Failed to connect: {err}, will try again in {delay:?}");
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = self.state.closed() => return None,
                    }
                }
            }
        }
    }

    async fn connect(&self) -> Result<(Link, Descriptor)> {
        log::info!("Connecting to datalogger {}", self.config.device_addr);
        let mut link = self.connector.connect().await?;

        let info = DeviceInfo.handle(&mut link, None).await?;
        log::info!(
            "Connected to datalogger: manufacturer {} device type {} (protocol v{} props {})",
            info.manufacturer,
            info.device_type,
            info.protocol_version,
            info.device_props
        );
        log::debug!("Datalogger info {info:?}");

        let token = info.protocol_token();
        if token != TESTED_PROTOCOL {
            log::warn!("Protocols other than {TESTED_PROTOCOL} are untested, got {token:?}");
        }
        let path = self.config.proto_path.join(format!("{token}.json"));
        let descriptor = Descriptor::load(&path)?;
        log::info!("Loaded protocol descriptor {}", path.display());

        Ok((link, descriptor))
    }

    /// Executes commands and idle heartbeats until the link is lost.
    ///
    /// Returns `false` once no client handle is left.
    async fn serve(&mut self, link: &mut Link) -> bool {
        let descriptor = self.state.borrow().descriptor.clone();
        loop {
            tokio::select! {
                job = self.jobs.recv() => {
                    let Some(job) = job else {
                        return false;
                    };
                    if job.run(link, descriptor.as_deref()).await {
                        return true;
                    }
                }
                () = tokio::time::sleep(self.config.heartbeat_interval) => {
                    log::debug!("Sending heartbeat");
                    match Ping.handle(link, descriptor.as_deref()).await {
                        Ok(_) => {}
                        Err(err) if err.is_connection_lost() => {
                            log::error!("Connection lost: {err}");
                            return true;
                        }
                        Err(err) => log::debug!("Heartbeat failed: {err}"),
                    }
                }
            }
        }
    }
}
