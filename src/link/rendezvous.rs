// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection establishment.
//!
//! The datalogger cannot be dialed directly. It is asked via UDP to connect
//! back to a local TCP listener, and that single inbound connection becomes
//! the [`Link`].

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use socket2::{Domain, Socket, Type};
use tokio::net::{TcpListener, ToSocketAddrs, UdpSocket};

use super::Link;

/// Deadline for each UDP step of the handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

const ACK_PREFIX: &str = "rsp>server=";

/// Maximum size of the acknowledgment datagram.
const MAX_REPLY_SIZE: usize = 512;

fn listener(port: u16) -> io::Result<TcpListener> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = Socket::new(Domain::IPV4, Type::STREAM, None)?;
    // The same port is bound again after every reconnect.
    listener.set_reuse_address(true)?;
    listener.set_nonblocking(true)?;
    listener.bind(&addr.into())?;
    listener.listen(1)?;
    TcpListener::from_std(listener.into())
}

fn timed_out(step: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("{step} timed out after {HANDSHAKE_TIMEOUT:?}"),
    )
}

#[must_use]
pub(crate) fn callback_command(addr: SocketAddr) -> String {
    format!("set>server={}:{};", addr.ip(), addr.port())
}

/// Checks the acknowledgment and returns it up to the terminating `;`.
pub(crate) fn parse_reply(reply: &[u8]) -> io::Result<&str> {
    let reply = std::str::from_utf8(reply)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    let reply = match reply.find(';') {
        Some(end) => &reply[..=end],
        None => reply,
    };
    if !reply.starts_with(ACK_PREFIX) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected answer: {reply:?}"),
        ));
    }
    Ok(reply)
}

/// Performs the rendezvous handshake with the datalogger at `device_addr`.
///
/// Listens on `local_port` (all interfaces), asks the datalogger to connect
/// back and waits without a deadline for that connection. No retries.
pub async fn connect(
    device_addr: impl ToSocketAddrs,
    local_port: u16,
    default_timeout: Duration,
) -> io::Result<Link> {
    log::debug!("Starting up TCP listener on port {local_port}");
    let listener = listener(local_port)?;
    let local_port = listener.local_addr()?.port();

    let udp = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;
    udp.connect(device_addr).await?;
    let callback_addr = SocketAddr::new(udp.local_addr()?.ip(), local_port);

    log::debug!("Requesting datalogger connection to {callback_addr}");
    let command = callback_command(callback_addr);
    tokio::time::timeout(HANDSHAKE_TIMEOUT, udp.send(command.as_bytes()))
        .await
        .map_err(|_| timed_out("sending connection request"))??;

    let mut buf = [0; MAX_REPLY_SIZE];
    let len = tokio::time::timeout(HANDSHAKE_TIMEOUT, udp.recv(&mut buf))
        .await
        .map_err(|_| timed_out("waiting for connection acknowledgment"))??;
    let reply = parse_reply(&buf[..len])?;
    log::debug!("Datalogger acknowledged with {reply:?}");
    drop(udp);

    let (stream, peer) = listener.accept().await?;
    drop(listener);
    stream.set_nodelay(true)?;
    log::info!("Datalogger connected from {peer}");

    Ok(Link::with_timeout(stream, default_timeout))
}
