//! # Transports
//!
//! Ordered byte sources and sinks that carry protocol messages.
//!
//! ## Components
//! - **Transport**: the blocking byte-stream trait used by the processor and client
//! - **MemoryBuffer**: growable in-memory transport for tests and HTTP bodies
//! - **BufferedTransport**: read-ahead and write-batching decorator
//! - **SocketTransport**: blocking TCP stream
//! - **tcp**: TCP server and client constructors
//! - **http**: HTTP/1.1 server and client transport
//!
//! Reads are bounded and return 0 at end of stream. Writes only append;
//! nothing is guaranteed to reach the peer before [`Transport::flush`].

pub mod buffered;
pub mod http;
pub mod memory;
pub mod socket;
pub mod tcp;

pub use buffered::BufferedTransport;
pub use memory::MemoryBuffer;
pub use socket::SocketTransport;

use crate::error::{ProtocolError, Result};

/// Blocking byte-stream transport.
pub trait Transport {
    /// Read up to `buf.len()` bytes. Returns 0 at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Append `buf` to the outgoing data.
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Release all appended data to the peer.
    fn flush(&mut self) -> Result<()>;

    /// Fill `buf` entirely or fail with [`ProtocolError::ConnectionClosed`].
    fn read_exact(&mut self, mut buf: &mut [u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.read(buf)? {
                0 => return Err(ProtocolError::ConnectionClosed),
                n => buf = &mut buf[n..],
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
