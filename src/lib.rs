// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An async client for energy storage dataloggers
//! based on [tokio](https://tokio.rs).
//!
//! The datalogger cannot be dialed directly. It is asked via UDP to connect
//! back to a local TCP port, and all further communication happens over
//! that single connection as framed requests and responses. Registers of
//! the attached device are forwarded as Modbus RTU frames and interpreted
//! according to a JSON register map, the [`Descriptor`](descriptor::Descriptor).
//!
//! ## Example
//!
//! ```no_run
//! use openess::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::start(Config::new("192.168.1.20:58899", "protocols"));
//!     client.wait_connection().await?;
//!
//!     let descriptor = client.descriptor().ok_or("no descriptor")?;
//!     let cmd = RegReadDescr::named(&descriptor, "Battery SOC")?;
//!     let value = client.send_command(cmd).await?;
//!     println!("Battery SOC: {value}");
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod collector;
pub mod command;
pub mod descriptor;
pub mod link;
pub mod prelude;
pub mod value;

mod codec;

mod error;
pub use self::error::{DescriptorError, Error, ProtocolError};

mod frame;
pub use self::frame::*;

/// Specialized [`std::result::Result`] type for datalogger operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
