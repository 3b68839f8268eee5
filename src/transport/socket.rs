//! Blocking TCP socket transport.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use tracing::debug;

use super::Transport;
use crate::config::ClientConfig;
use crate::error::{ProtocolError, Result};

#[derive(Debug)]
pub struct SocketTransport {
    stream: TcpStream,
    open: bool,
}

impl SocketTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream, open: true }
    }

    /// Connect using the client timeouts.
    pub fn connect(address: &str, config: &ClientConfig) -> Result<Self> {
        let addr = resolve(address)?;
        let stream = TcpStream::connect_timeout(&addr, config.connection_timeout)?;
        stream.set_read_timeout(Some(config.response_timeout))?;
        stream.set_nodelay(true)?;
        debug!(peer = %addr, "connected");
        Ok(Self::new(stream))
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

pub(crate) fn resolve(address: &str) -> Result<SocketAddr> {
    address
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| ProtocolError::TransportError(format!("cannot resolve '{address}'")))
}

impl Transport for SocketTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.stream.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        Ok(self.stream.write_all(buf)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.stream.flush()?)
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            match self.stream.shutdown(Shutdown::Both) {
                Ok(()) => {}
                // Peer already gone.
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
