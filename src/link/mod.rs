// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Framed request/response exchange with a connected datalogger.

use std::{fmt, future::Future, io, time::Duration};

use bytes::BytesMut;
use futures_util::{SinkExt as _, StreamExt as _};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::{
    codec::{ClientCodec, RequestAdu, ResponseAdu},
    error::ProtocolError,
    frame::{Request, RequestBody, Response},
    Result,
};

pub mod rendezvous;

pub use self::rendezvous::connect;

/// Deadline of an exchange unless the request overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A bidirectional byte stream that can carry a [`Link`].
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug + 'static {}

/// An established connection to a datalogger.
///
/// Exactly one exchange can be in flight at a time, which is enforced by
/// requiring `&mut self`.
#[derive(Debug)]
pub struct Link {
    framed: Framed<Box<dyn Transport>, ClientCodec>,
    default_timeout: Duration,
}

async fn with_deadline<T, F>(deadline: Duration, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    tokio::time::timeout(deadline, fut).await.map_err(|_| {
        io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no response within {deadline:?}"),
        )
    })?
}

impl Link {
    pub fn new(transport: impl Transport) -> Self {
        Self::with_timeout(transport, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(transport: impl Transport, default_timeout: Duration) -> Self {
        let transport: Box<dyn Transport> = Box::new(transport);
        let framed = Framed::new(transport, ClientCodec::default());
        Self {
            framed,
            default_timeout,
        }
    }

    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    fn deadline<B>(&self, req: &Request<B>) -> Duration {
        req.timeout.unwrap_or(self.default_timeout)
    }

    /// Sends a request as a single frame.
    pub async fn write_request<B: RequestBody>(&mut self, req: &Request<B>) -> Result<()> {
        let mut body = BytesMut::new();
        req.body.encode(&mut body);
        let adu = RequestAdu {
            hdr: req.hdr,
            body: body.freeze(),
        };
        log::debug!("Sending request with function {}", req.hdr.function);

        // Anything left over belongs to a previous, abandoned exchange.
        self.framed.read_buffer_mut().clear();

        let deadline = self.deadline(req);
        with_deadline(deadline, self.framed.send(adu)).await?;
        Ok(())
    }

    /// Receives the next response frame and decodes it for `req`.
    ///
    /// Can be called repeatedly after a single [`Link::write_request`] if the
    /// datalogger answers with more than one frame.
    pub async fn read_response<B: RequestBody>(
        &mut self,
        req: &Request<B>,
    ) -> Result<Response<B::Response>> {
        let deadline = self.deadline(req);
        let ResponseAdu {
            hdr,
            body,
            invalid_size,
        } = with_deadline(deadline, async {
            self.framed.next().await.unwrap_or_else(|| {
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by datalogger",
                ))
            })
        })
        .await?;
        if let Some(raw_size) = invalid_size {
            return Err(ProtocolError::InvalidResponse(format!(
                "invalid size field {raw_size} in frame header"
            ))
            .into());
        }
        if hdr.function != req.hdr.function {
            return Err(ProtocolError::FunctionCodeMismatch {
                request: req.hdr.function,
                response: hdr.function,
            }
            .into());
        }
        let body = req.body.decode_response(body)?;
        Ok(Response { hdr, body })
    }

    /// A single request/response exchange.
    pub async fn call<B: RequestBody>(
        &mut self,
        req: &Request<B>,
    ) -> Result<Response<B::Response>> {
        self.write_request(req).await?;
        self.read_response(req).await
    }

    /// Flushes pending output and shuts down the write half.
    pub async fn close(mut self) -> io::Result<()> {
        match self.framed.close().await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err),
        }
    }
}
