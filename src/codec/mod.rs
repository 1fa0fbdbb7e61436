//! Message codec for the participant wire protocol.
//!
//! Two framing disciplines exist and exactly one is selected per mission:
//!
//! - [`CodecMode::Binary`]: one tag byte, plus 24 bytes of little-endian
//!   coordinates for TARGET frames (see [`binary`]).
//! - [`CodecMode::Text`]: newline-free tokens such as `ACK:TARGET` or
//!   `READY`, one per read or per line (see [`text`]).
//!
//! [`MessageCodec`] implements `tokio_util`'s [`Decoder`] and [`Encoder`],
//! so decoding is resumable: an incomplete frame yields `Ok(None)` and
//! consumes nothing.

pub mod binary;
pub mod message;
pub mod text;

pub use message::{Message, MessageType, Target};

use std::fmt;

use bytes::{Bytes, BytesMut};
use serde::Deserialize;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::TransportError;

/// Framing discipline used for an entire mission run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CodecMode {
    /// Fixed-size typed binary frames.
    #[default]
    Binary,
    /// Delimited text tokens.
    Text,
}

impl fmt::Display for CodecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => write!(f, "binary"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// Stateless codec bound to one [`CodecMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageCodec {
    mode: CodecMode,
}

impl MessageCodec {
    /// Creates a codec for the given mode.
    #[must_use]
    pub const fn new(mode: CodecMode) -> Self {
        Self { mode }
    }

    /// Returns the codec's framing mode.
    #[must_use]
    pub const fn mode(&self) -> CodecMode {
        self.mode
    }

    /// Encodes a single message into a standalone frame.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Protocol` if the message kind is not
    /// carried by this codec's mode.
    pub fn frame(&self, message: &Message) -> Result<Bytes, TransportError> {
        let mut buf = BytesMut::new();
        self.encode_into(message, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Returns whether `buf` starts with a complete frame, without
    /// consuming anything.
    #[must_use]
    pub fn frame_ready(&self, buf: &[u8]) -> bool {
        match self.mode {
            CodecMode::Binary => binary::frame_ready(buf),
            CodecMode::Text => text::frame_ready(buf),
        }
    }

    fn encode_into(&self, message: &Message, dst: &mut BytesMut) -> Result<(), TransportError> {
        match self.mode {
            CodecMode::Binary => binary::encode(message, dst),
            CodecMode::Text => text::encode(message, dst),
        }
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, TransportError> {
        Ok(match self.mode {
            CodecMode::Binary => binary::decode(src),
            CodecMode::Text => text::decode(src),
        })
    }
}

impl Encoder<&Message> for MessageCodec {
    type Error = TransportError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), TransportError> {
        self.encode_into(item, dst)
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), TransportError> {
        self.encode_into(&item, dst)
    }
}
