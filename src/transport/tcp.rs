//! TCP stream transport.
//!
//! Implements [`Link`] over `tokio::net::TcpStream` and [`Acceptor`] over
//! `tokio::net::TcpListener`. Readiness uses the stream's own
//! `readable()`/`try_read()` pair, so waiting never consumes bytes.

use std::io;
use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use super::{Acceptor, Link, LinkType, Result};
use crate::error::TransportError;

/// A participant link over a TCP stream.
#[derive(Debug)]
pub struct TcpLink {
    stream: TcpStream,
    peer: SocketAddr,
    closed: bool,
}

impl TcpLink {
    /// Wraps an accepted or connected stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer address cannot be read.
    pub fn new(stream: TcpStream) -> Result<Self> {
        let peer = stream.peer_addr()?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "could not disable Nagle");
        }
        Ok(Self {
            stream,
            peer,
            closed: false,
        })
    }
}

#[async_trait::async_trait]
impl Link for TcpLink {
    async fn readable(&mut self) -> io::Result<()> {
        self.stream.readable().await
    }

    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.try_read(buf)
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        if self.closed {
            return Err(TransportError::ConnectionClosed(format!(
                "link to {} already closed",
                self.peer
            )));
        }
        let written = self.stream.write(frame).await?;
        if written != frame.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: frame.len(),
            });
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(peer = %self.peer, error = %e, "shutdown on broken link");
        }
        Ok(())
    }

    fn link_type(&self) -> LinkType {
        LinkType::Tcp
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}

/// Accepts participant links on a TCP listener.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Binds a listener on `addr` (e.g. `0.0.0.0:5000`, or port 0 for an
    /// ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Bind` if the address cannot be bound.
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self { listener })
    }
}

#[async_trait::async_trait]
impl Acceptor for TcpAcceptor {
    async fn accept(&mut self) -> Result<Box<dyn Link>> {
        let (stream, _) = self.listener.accept().await?;
        Ok(Box::new(TcpLink::new(stream)?))
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }
}
