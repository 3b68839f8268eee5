//! # Buffered Transport
//!
//! Decorator that batches I/O over another transport.
//!
//! - Reads are served from a read-ahead buffer refilled in `read_capacity` chunks
//! - Writes accumulate in memory and reach the inner transport only on
//!   [`Transport::flush`], as a single write followed by an inner flush

use super::Transport;
use crate::error::Result;

/// Default read-ahead and initial write buffer size.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

pub struct BufferedTransport<T> {
    inner: T,
    rbuf: Box<[u8]>,
    rpos: usize,
    rlen: usize,
    wbuf: Vec<u8>,
}

impl<T: Transport> BufferedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self::with_capacity(inner, DEFAULT_BUFFER_SIZE, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(inner: T, read_capacity: usize, write_capacity: usize) -> Self {
        Self {
            inner,
            rbuf: vec![0u8; read_capacity.max(1)].into_boxed_slice(),
            rpos: 0,
            rlen: 0,
            wbuf: Vec::with_capacity(write_capacity),
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Bytes written but not yet flushed.
    pub fn pending(&self) -> usize {
        self.wbuf.len()
    }

    /// Unwrap, discarding unflushed writes and unread buffered input.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Transport> Transport for BufferedTransport<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.rpos == self.rlen {
            // Large reads bypass the buffer entirely.
            if buf.len() >= self.rbuf.len() {
                return self.inner.read(buf);
            }
            self.rlen = self.inner.read(&mut self.rbuf)?;
            self.rpos = 0;
            if self.rlen == 0 {
                return Ok(0);
            }
        }

        let n = buf.len().min(self.rlen - self.rpos);
        buf[..n].copy_from_slice(&self.rbuf[self.rpos..self.rpos + n]);
        self.rpos += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.wbuf.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.wbuf.is_empty() {
            let result = self.inner.write(&self.wbuf);
            self.wbuf.clear();
            result?;
        }
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::transport::MemoryBuffer;

    /// Counts calls reaching the wrapped transport.
    #[derive(Default)]
    struct Counting {
        mem: MemoryBuffer,
        reads: usize,
        writes: usize,
        flushes: usize,
    }

    impl Transport for Counting {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.reads += 1;
            self.mem.read(buf)
        }

        fn write(&mut self, buf: &[u8]) -> Result<()> {
            self.writes += 1;
            self.mem.write(buf)
        }

        fn flush(&mut self) -> Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_writes_held_until_flush() {
        let mut t = BufferedTransport::new(Counting::default());
        t.write(b"[1,").unwrap();
        t.write(b"\"x\"]").unwrap();
        assert_eq!(t.get_ref().writes, 0);
        assert_eq!(t.pending(), 7);

        t.flush().unwrap();
        assert_eq!(t.get_ref().writes, 1);
        assert_eq!(t.get_ref().flushes, 1);
        assert_eq!(t.get_ref().mem.as_bytes(), b"[1,\"x\"]");
        assert_eq!(t.pending(), 0);
    }

    #[test]
    fn test_small_reads_are_batched() {
        let inner = Counting {
            mem: MemoryBuffer::from(&b"abcdefgh"[..]),
            ..Default::default()
        };
        let mut t = BufferedTransport::with_capacity(inner, 16, 16);

        let mut byte = [0u8; 1];
        let mut collected = Vec::new();
        while t.read(&mut byte).unwrap() == 1 {
            collected.push(byte[0]);
        }
        assert_eq!(collected, b"abcdefgh");
        // one fill plus one end-of-stream probe
        assert_eq!(t.get_ref().reads, 2);
    }
}
