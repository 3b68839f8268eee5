//! In-memory transport backed by a growable byte buffer.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::Transport;
use crate::error::Result;

/// Reads consume from the front, writes append to the back.
#[derive(Debug, Default, Clone)]
pub struct MemoryBuffer {
    buf: BytesMut,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unread bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

impl From<Vec<u8>> for MemoryBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self {
            buf: BytesMut::from(&data[..]),
        }
    }
}

impl From<&[u8]> for MemoryBuffer {
    fn from(data: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(data),
        }
    }
}

impl From<Bytes> for MemoryBuffer {
    fn from(data: Bytes) -> Self {
        Self {
            buf: BytesMut::from(&data[..]),
        }
    }
}

impl Transport for MemoryBuffer {
    fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        let n = out.len().min(self.buf.len());
        self.buf.copy_to_slice(&mut out[..n]);
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.buf.put_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
