//! In-process transport.
//!
//! A [`MemoryLink`] is the controller half and a [`MemoryPeer`] the agent
//! half of a channel pair backed by unbounded tokio mpsc queues. Each
//! `send` from the peer is delivered as one read-sized chunk, so the text
//! codec's one-token-per-read framing behaves as it would on a socket
//! where writes are not coalesced.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Buf, Bytes, BytesMut};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tokio_util::codec::Decoder;

use super::{Acceptor, Link, LinkType, Result};
use crate::codec::{Message, MessageCodec};
use crate::error::TransportError;

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// Creates a connected link/peer pair.
#[must_use]
pub fn pair() -> (MemoryLink, MemoryPeer) {
    let (to_link, from_peer) = mpsc::unbounded_channel();
    let (to_peer, from_link) = mpsc::unbounded_channel();
    let id = NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed);

    let link = MemoryLink {
        id,
        inbound: from_peer,
        outbound: Some(to_peer),
        pending: Bytes::new(),
        eof: false,
    };
    let peer = MemoryPeer {
        outbound: Some(to_link),
        inbound: from_link,
        buffer: BytesMut::new(),
    };
    (link, peer)
}

/// Creates an acceptor and the connector that feeds it.
#[must_use]
pub fn listener() -> (MemoryAcceptor, MemoryConnector) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MemoryAcceptor { incoming: rx }, MemoryConnector { tx })
}

/// Controller half of an in-process channel pair.
#[derive(Debug)]
pub struct MemoryLink {
    id: u64,
    inbound: UnboundedReceiver<Bytes>,
    outbound: Option<UnboundedSender<Bytes>>,
    pending: Bytes,
    eof: bool,
}

#[async_trait::async_trait]
impl Link for MemoryLink {
    async fn readable(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() || self.eof {
            return Ok(());
        }
        // `recv` is cancel-safe: a dropped wait loses no chunk.
        match self.inbound.recv().await {
            Some(chunk) => self.pending = chunk,
            None => self.eof = true,
        }
        Ok(())
    }

    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() && !self.eof {
            match self.inbound.try_recv() {
                Ok(chunk) => self.pending = chunk,
                Err(TryRecvError::Empty) => return Err(io::ErrorKind::WouldBlock.into()),
                Err(TryRecvError::Disconnected) => self.eof = true,
            }
        }
        if self.pending.is_empty() {
            return Ok(0);
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        let Some(outbound) = &self.outbound else {
            return Err(TransportError::ConnectionClosed(format!(
                "memory link {} already closed",
                self.id
            )));
        };
        outbound
            .send(Bytes::copy_from_slice(frame))
            .map_err(|_| TransportError::ConnectionClosed("peer dropped".to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.outbound = None;
        self.inbound.close();
        Ok(())
    }

    fn link_type(&self) -> LinkType {
        LinkType::Memory
    }

    fn peer(&self) -> String {
        format!("memory#{}", self.id)
    }
}

/// Agent half of an in-process channel pair.
#[derive(Debug)]
pub struct MemoryPeer {
    outbound: Option<UnboundedSender<Bytes>>,
    inbound: UnboundedReceiver<Bytes>,
    buffer: BytesMut,
}

impl MemoryPeer {
    /// Sends raw bytes as one read-sized chunk.
    ///
    /// Returns `false` if the link side is gone or this peer has
    /// disconnected. Empty chunks are ignored.
    pub fn send(&self, bytes: impl Into<Bytes>) -> bool {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return true;
        }
        self.outbound
            .as_ref()
            .is_some_and(|tx| tx.send(bytes).is_ok())
    }

    /// Encodes and sends one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the codec rejects the message or the link is gone.
    pub fn send_message(&self, codec: MessageCodec, message: &Message) -> Result<()> {
        let frame = codec.frame(message)?;
        if self.send(frame) {
            Ok(())
        } else {
            Err(TransportError::ConnectionClosed("link dropped".to_string()))
        }
    }

    /// Receives the next raw chunk; `None` once the link has closed and
    /// everything sent before the close has been drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.inbound.recv().await
    }

    /// Receives and decodes the next message; `None` once the link has
    /// closed.
    pub async fn recv_message(&mut self, codec: &mut MessageCodec) -> Option<Message> {
        loop {
            if let Ok(Some(message)) = codec.decode(&mut self.buffer) {
                return Some(message);
            }
            let chunk = self.inbound.recv().await?;
            self.buffer.extend_from_slice(&chunk);
        }
    }

    /// Closes the agent's sending half; the link then reads EOF.
    pub fn disconnect(&mut self) {
        self.outbound = None;
    }
}

/// Acceptor fed by a [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryAcceptor {
    incoming: UnboundedReceiver<MemoryLink>,
}

#[async_trait::async_trait]
impl Acceptor for MemoryAcceptor {
    async fn accept(&mut self) -> Result<Box<dyn Link>> {
        match self.incoming.recv().await {
            Some(link) => Ok(Box::new(link)),
            None => Err(TransportError::ConnectionClosed(
                "memory connector dropped".to_string(),
            )),
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Client-side handle that opens links to a [`MemoryAcceptor`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    tx: UnboundedSender<MemoryLink>,
}

impl MemoryConnector {
    /// Opens a new link; the acceptor yields its controller half.
    ///
    /// # Errors
    ///
    /// Returns an error if the acceptor has been dropped.
    pub fn connect(&self) -> Result<MemoryPeer> {
        let (link, peer) = pair();
        self.tx
            .send(link)
            .map_err(|_| TransportError::ConnectionClosed("acceptor dropped".to_string()))?;
        Ok(peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecMode, MessageType};

    #[tokio::test]
    async fn chunks_keep_read_boundaries() {
        let (mut link, peer) = pair();
        assert!(peer.send(&b"ACK:TARGET"[..]));
        assert!(peer.send(&b"READY"[..]));

        link.readable().await.unwrap();
        let mut buf = [0u8; 64];
        let n = link.try_read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ACK:TARGET");
        let n = link.try_read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"READY");
        assert_eq!(
            link.try_read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
    }

    #[tokio::test]
    async fn small_buffer_reads_chunk_in_pieces() {
        let (mut link, peer) = pair();
        peer.send(vec![1u8, 2, 3]);
        let mut buf = [0u8; 2];
        assert_eq!(link.try_read(&mut buf).unwrap(), 2);
        assert_eq!(link.try_read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 3);
    }

    #[tokio::test]
    async fn disconnect_reads_eof() {
        let (mut link, mut peer) = pair();
        peer.disconnect();
        link.readable().await.unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(link.try_read(&mut buf).unwrap(), 0);
        assert!(!peer.send(vec![1u8]));
    }

    #[tokio::test]
    async fn close_is_observed_by_peer() {
        let (mut link, mut peer) = pair();
        link.write_frame(&[3]).await.unwrap();
        link.close().await.unwrap();
        assert!(link.write_frame(&[3]).await.is_err());

        assert_eq!(peer.recv().await.as_deref(), Some(&[3u8][..]));
        assert_eq!(peer.recv().await, None);
    }

    #[tokio::test]
    async fn peer_decodes_messages() {
        let (mut link, mut peer) = pair();
        let codec = MessageCodec::new(CodecMode::Binary);
        link.write_frame(&codec.frame(&Message::Type(MessageType::Rtl)).unwrap())
            .await
            .unwrap();

        let mut codec = codec;
        assert_eq!(
            peer.recv_message(&mut codec).await,
            Some(Message::Type(MessageType::Rtl))
        );
    }

    #[tokio::test]
    async fn acceptor_yields_connected_links() {
        let (mut acceptor, connector) = listener();
        let peer = connector.connect().unwrap();
        let mut link = acceptor.accept().await.unwrap();
        assert_eq!(link.link_type(), LinkType::Memory);
        assert!(link.peer().starts_with("memory#"));

        peer.send(vec![2u8]);
        link.readable().await.unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(link.try_read(&mut buf).unwrap(), 1);
    }

    #[tokio::test]
    async fn acceptor_fails_when_connector_dropped() {
        let (mut acceptor, connector) = listener();
        drop(connector);
        assert!(acceptor.accept().await.is_err());
    }
}
