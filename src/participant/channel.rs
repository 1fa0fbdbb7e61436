//! Buffered, codec-aware wrapper around one participant link.
//!
//! A [`ParticipantChannel`] accumulates raw bytes from its [`Link`] and
//! hands out complete messages one at a time. Polling never blocks; the
//! only suspension point is [`ParticipantChannel::readable`], which the
//! multiplexer awaits across many channels at once.
//!
//! Once a channel is closed (remote EOF, transport error, or a failed
//! write) it is never read from or written to again.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::{CodecMode, Message, MessageCodec};
use crate::error::TransportError;
use crate::transport::{Link, LinkType, READ_CHUNK_SIZE};

/// Outcome of one non-blocking poll.
#[derive(Debug)]
pub enum ChannelPoll {
    /// A complete message was decoded.
    Ready(Message),
    /// No complete message is available yet.
    NotReady,
    /// The channel is closed; the error says why.
    Closed(TransportError),
}

/// One participant's link plus its partial-frame buffer.
pub struct ParticipantChannel {
    link: Box<dyn Link>,
    codec: MessageCodec,
    buffer: BytesMut,
    scratch: Vec<u8>,
    closed: bool,
    released: bool,
}

impl ParticipantChannel {
    /// Wraps `link` with a codec in the given mode.
    #[must_use]
    pub fn new(link: Box<dyn Link>, mode: CodecMode) -> Self {
        Self {
            link,
            codec: MessageCodec::new(mode),
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
            scratch: vec![0; READ_CHUNK_SIZE],
            closed: false,
            released: false,
        }
    }

    /// Returns the link's peer description.
    #[must_use]
    pub fn peer(&self) -> String {
        self.link.peer()
    }

    /// Returns the link type.
    #[must_use]
    pub fn link_type(&self) -> LinkType {
        self.link.link_type()
    }

    /// Returns whether the channel has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns whether the buffer already holds a complete frame.
    ///
    /// Buffered frames do not make the underlying link readable again, so
    /// the multiplexer checks this before waiting.
    #[must_use]
    pub fn has_buffered_frame(&self) -> bool {
        !self.closed && self.codec.frame_ready(&self.buffer)
    }

    /// Attempts to produce one complete message without blocking.
    ///
    /// Buffered bytes are decoded first; only when they hold no complete
    /// frame is the link read, at most `reads` more times. Each read
    /// decrements `reads`. Once it reaches zero only buffered bytes are
    /// decoded. EOF or a read error closes the channel.
    pub fn poll(&mut self, reads: &mut usize) -> ChannelPoll {
        if self.closed {
            return ChannelPoll::Closed(TransportError::ConnectionClosed(
                "channel already closed".to_string(),
            ));
        }

        loop {
            match self.codec.decode(&mut self.buffer) {
                Ok(Some(message)) => return ChannelPoll::Ready(message),
                Ok(None) => {}
                Err(e) => return self.fail(e),
            }

            if *reads == 0 {
                return ChannelPoll::NotReady;
            }
            *reads -= 1;

            match self.link.try_read(&mut self.scratch) {
                Ok(0) => {
                    let pending = self.buffer.len();
                    return self.fail(TransportError::ConnectionClosed(if pending == 0 {
                        "remote closed the connection".to_string()
                    } else {
                        format!("remote closed the connection with {pending} unframed bytes")
                    }));
                }
                Ok(n) => {
                    tracing::trace!(peer = %self.link.peer(), bytes = n, "read");
                    self.buffer.extend_from_slice(&self.scratch[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return ChannelPoll::NotReady,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return self.fail(TransportError::Io(e)),
            }
        }
    }

    /// Encodes `message` and writes it as one frame.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Protocol` if the codec mode cannot carry
    /// the message (the channel stays open), or the transport error that
    /// closed the channel.
    pub async fn write(&mut self, message: &Message) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed(
                "channel already closed".to_string(),
            ));
        }
        let frame = self.codec.frame(message)?;
        if let Err(e) = self.link.write_frame(&frame).await {
            self.closed = true;
            return Err(e);
        }
        tracing::trace!(peer = %self.link.peer(), bytes = frame.len(), "wrote frame");
        Ok(())
    }

    /// Waits until the link has something to read.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` immediately for a closed channel, or the
    /// link's readiness error.
    pub async fn readable(&mut self) -> io::Result<()> {
        if self.closed {
            return Err(io::ErrorKind::NotConnected.into());
        }
        self.link.readable().await
    }

    /// Closes the channel and releases the link. Idempotent.
    pub async fn close(&mut self) {
        self.closed = true;
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.link.close().await {
            tracing::debug!(peer = %self.link.peer(), error = %e, "error closing link");
        }
    }

    /// Returns whether the underlying link has been released.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    fn fail(&mut self, error: TransportError) -> ChannelPoll {
        self.closed = true;
        self.buffer.clear();
        ChannelPoll::Closed(error)
    }
}

impl std::fmt::Debug for ParticipantChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantChannel")
            .field("peer", &self.link.peer())
            .field("mode", &self.codec.mode())
            .field("buffered", &self.buffer.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
