// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Datalogger client
//!
//! A [`Client`] is a cheap handle to a background task that owns the
//! [`Link`]. The task connects, loads the descriptor of the connected device,
//! executes submitted commands one at a time, keeps the link alive with
//! heartbeats and reconnects after the link has been lost.

use std::{fmt::Debug, io, path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot, watch};

use crate::{command::Command, descriptor::Descriptor, link::Link, Error, Result};

mod backoff;
mod task;

use self::task::{Job, Pending, State, Task};

/// Default local port of the rendezvous listener.
pub const DEFAULT_LOCAL_PORT: u16 = 8899;

/// Client settings.
///
/// Deserializes from the keys `BindPort`, `DeviceAddr` and `ProtoPath`.
/// The timing tunables are not part of the file format.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local TCP port the datalogger connects back to.
    #[serde(rename = "BindPort")]
    pub local_port: u16,

    /// UDP address of the datalogger, i.e. `host:port`.
    #[serde(rename = "DeviceAddr")]
    pub device_addr: String,

    /// Directory containing the `<protocol>.json` descriptor files.
    #[serde(rename = "ProtoPath")]
    pub proto_path: PathBuf,

    #[serde(skip)]
    pub default_timeout: Duration,

    #[serde(skip)]
    pub heartbeat_interval: Duration,

    #[serde(skip)]
    pub initial_backoff: Duration,

    #[serde(skip)]
    pub max_backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_port: DEFAULT_LOCAL_PORT,
            device_addr: String::new(),
            proto_path: PathBuf::from("."),
            default_timeout: crate::link::DEFAULT_TIMEOUT,
            heartbeat_interval: Duration::from_secs(3),
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(300),
        }
    }
}

impl Config {
    #[must_use]
    pub fn new(device_addr: impl Into<String>, proto_path: impl Into<PathBuf>) -> Self {
        Self {
            device_addr: device_addr.into(),
            proto_path: proto_path.into(),
            ..Default::default()
        }
    }
}

/// Trait for (re-)creating links on demand.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Establishes a new link. Called again after every failure.
    async fn connect(&self) -> io::Result<Link>;
}

/// Connects through the UDP/TCP rendezvous handshake.
#[derive(Debug, Clone)]
pub struct Rendezvous {
    device_addr: String,
    local_port: u16,
    default_timeout: Duration,
}

impl From<&Config> for Rendezvous {
    fn from(config: &Config) -> Self {
        Self {
            device_addr: config.device_addr.clone(),
            local_port: config.local_port,
            default_timeout: config.default_timeout,
        }
    }
}

#[async_trait]
impl Connector for Rendezvous {
    async fn connect(&self) -> io::Result<Link> {
        crate::link::connect(
            self.device_addr.as_str(),
            self.local_port,
            self.default_timeout,
        )
        .await
    }
}

/// Handle to the background task owning the connection.
///
/// Clones share the same task. The task stops once all handles are dropped.
#[derive(Debug, Clone)]
pub struct Client {
    jobs: mpsc::Sender<Box<dyn Job>>,
    state: watch::Receiver<State>,
}

impl Client {
    /// Starts a client that connects via [`Rendezvous`].
    ///
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn start(config: Config) -> Self {
        let connector = Rendezvous::from(&config);
        Self::with_connector(config, connector)
    }

    /// Starts a client using a custom [`Connector`].
    #[must_use]
    pub fn with_connector(config: Config, connector: impl Connector) -> Self {
        // Submissions wait until the task picks them up.
        let (jobs_tx, jobs_rx) = mpsc::channel(1);
        let (state_tx, state_rx) = watch::channel(State::default());
        let task = Task::new(config, connector, jobs_rx, state_tx);
        tokio::spawn(task.run());
        Self {
            jobs: jobs_tx,
            state: state_rx,
        }
    }

    /// Executes a command on the connected datalogger.
    ///
    /// Commands are executed in order of arrival. While disconnected the
    /// command waits for the next connection.
    pub async fn send_command<C: Command>(&self, cmd: C) -> Result<C::Output> {
        let (tx, rx) = oneshot::channel();
        self.jobs
            .send(Box::new(Pending::new(cmd, tx)))
            .await
            .map_err(|_| Error::Closed)?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Waits until the client is connected.
    pub async fn wait_connection(&self) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|state| state.connected)
            .await
            .map_err(|_| Error::Closed)?;
        Ok(())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    /// The descriptor loaded for the most recent connection.
    #[must_use]
    pub fn descriptor(&self) -> Option<Arc<Descriptor>> {
        self.state.borrow().descriptor.clone()
    }
}
