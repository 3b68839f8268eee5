//! # Message Framing
//!
//! Messages on a byte stream carry no length prefix. A frame is exactly one
//! top-level JSON array or object; the reader tracks nesting depth, string
//! literals and escapes so it stops on the closing bracket and never consumes
//! bytes belonging to the next message.
//!
//! ## Errors
//! - End of stream (or an I/O failure) before the first byte: `ConnectionClosed`
//! - Read timeout at any point: `Io` with `WouldBlock` or `TimedOut`
//! - End of stream inside a frame: `Io(UnexpectedEof)`
//! - Frame longer than the configured limit: `OversizedMessage`
//! - First byte not `[` or `{`: `TransportError`, the stream position is lost

use std::io;

use crate::error::{constants, ProtocolError, Result};
use crate::transport::Transport;

/// Read one complete JSON frame from `transport`.
pub fn read_frame(transport: &mut dyn Transport, max_size: usize) -> Result<Vec<u8>> {
    let mut scanner = FrameScanner::default();
    let mut frame = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        let n = match transport.read(&mut byte) {
            Ok(n) => n,
            Err(e) if frame.is_empty() && !is_timeout(&e) => {
                return Err(ProtocolError::ConnectionClosed)
            }
            Err(e) => return Err(e),
        };
        if n == 0 {
            if frame.is_empty() {
                return Err(ProtocolError::ConnectionClosed);
            }
            return Err(ProtocolError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended after {} bytes of a message", frame.len()),
            )));
        }

        let b = byte[0];
        if frame.is_empty() && b.is_ascii_whitespace() {
            continue;
        }
        if frame.is_empty() && b != b'[' && b != b'{' {
            return Err(ProtocolError::TransportError(
                constants::ERR_FRAME_START.to_string(),
            ));
        }

        frame.push(b);
        if frame.len() > max_size {
            return Err(ProtocolError::OversizedMessage(frame.len()));
        }
        if scanner.feed(b) {
            return Ok(frame);
        }
    }
}

/// A silent peer is not a closed one.
fn is_timeout(err: &ProtocolError) -> bool {
    matches!(
        err,
        ProtocolError::Io(e)
            if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
    )
}

/// Incremental bracket matcher over JSON text.
#[derive(Debug, Default)]
struct FrameScanner {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl FrameScanner {
    /// Feed one byte; returns true when the top-level value just closed.
    fn feed(&mut self, b: u8) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == b'"' {
                self.in_string = false;
            }
            return false;
        }

        match b {
            b'"' => self.in_string = true,
            b'[' | b'{' => self.depth += 1,
            b']' | b'}' => {
                self.depth = self.depth.saturating_sub(1);
                return self.depth == 0;
            }
            _ => {}
        }
        false
    }
}
