//! Transport abstraction layer.
//!
//! The controller core consumes transport only through two traits:
//! [`Acceptor`] produces one [`Link`] per participant, and a [`Link`] is a
//! bidirectional byte channel with non-blocking read semantics. Concrete
//! implementations live in [`tcp`] (stream sockets) and [`memory`]
//! (in-process pairs used by tests and embedders).

pub mod memory;
pub mod tcp;

pub use memory::{MemoryAcceptor, MemoryConnector, MemoryLink, MemoryPeer};
pub use tcp::{TcpAcceptor, TcpLink};

use crate::error::TransportError;

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Size of the scratch buffer used for a single non-blocking read.
pub const READ_CHUNK_SIZE: usize = 4 * 1024;

/// One participant's bidirectional byte channel.
///
/// Reads are split into an awaitable readiness signal and a non-blocking
/// read so that many links can be waited on at once without consuming
/// data. Both methods take `&mut self`; a link is owned by exactly one
/// participant channel.
#[async_trait::async_trait]
pub trait Link: Send {
    /// Waits until the link has bytes to read, has reached EOF, or has
    /// failed. Must be cancel-safe: dropping the future loses no data.
    async fn readable(&mut self) -> io::Result<()>;

    /// Reads whatever is available without blocking.
    ///
    /// Returns `Ok(0)` on EOF and `Err(WouldBlock)` when nothing is
    /// buffered.
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes one complete frame in a single transport write.
    ///
    /// A write that accepts fewer bytes than the frame is reported as
    /// [`TransportError::ShortWrite`].
    async fn write_frame(&mut self, frame: &[u8]) -> Result<()>;

    /// Closes the link. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Returns the type of this link for logging.
    fn link_type(&self) -> LinkType;

    /// Returns a human-readable peer description.
    fn peer(&self) -> String;
}

/// Source of new participant links.
#[async_trait::async_trait]
pub trait Acceptor: Send {
    /// Waits for and returns the next participant link.
    async fn accept(&mut self) -> Result<Box<dyn Link>>;

    /// Returns the local listening address, if the acceptor has one.
    fn local_addr(&self) -> Option<SocketAddr>;
}

/// Link type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkType {
    /// TCP stream socket.
    Tcp,
    /// In-process channel pair.
    Memory,
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Memory => write!(f, "memory"),
        }
    }
}
