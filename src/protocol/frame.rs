//! Line framing over a byte stream.
//!
//! The transport may split a line across reads or pack several lines into a
//! single read. `LineBuffer` hides both: bytes are appended as they arrive and
//! complete lines are pulled out one at a time, so decoding is the same no
//! matter how the stream was chunked.

use bytes::{Buf, Bytes, BytesMut};

/// Line delimiter.
pub const DELIMITER: u8 = b'\n';

/// Largest line the server accepts, delimiter included.
pub const SERVER_LINE_CAPACITY: usize = 64;

/// Largest line the client accepts, delimiter included.
pub const CLIENT_LINE_CAPACITY: usize = 256;

/// Reported when `capacity` bytes accumulated without a delimiter.
///
/// The offending bytes have already been dropped; decoding continues with
/// whatever follows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow {
    pub discarded: usize,
}

impl std::fmt::Display for Overflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line exceeded buffer, discarded {} bytes", self.discarded)
    }
}

/// Bounded accumulator for newline-delimited frames.
///
/// Unconsumed bytes after the last extracted frame stay at the front of the
/// buffer for the next call. They are only dropped on overflow.
#[derive(Debug)]
pub struct LineBuffer {
    buf: BytesMut,
    capacity: usize,
}

impl LineBuffer {
    /// Create a buffer that holds at most `capacity` bytes of one line.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Append bytes read from the transport.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Extract the next complete frame, if one is buffered.
    ///
    /// The returned frame excludes the delimiter and one trailing `\r`.
    /// Returns `Ok(None)` when more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, Overflow> {
        match self.buf.iter().position(|&b| b == DELIMITER) {
            Some(pos) if pos < self.capacity => {
                let mut line = self.buf.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(pos - 1);
                }
                Ok(Some(line.freeze()))
            }
            Some(pos) => {
                // Oversized line: drop it together with its delimiter.
                self.buf.advance(pos + 1);
                Err(Overflow { discarded: pos + 1 })
            }
            None if self.buf.len() >= self.capacity => {
                let discarded = self.buf.len();
                self.buf.clear();
                Err(Overflow { discarded })
            }
            None => Ok(None),
        }
    }

    /// Move the pending partial line to the front of the allocation.
    ///
    /// Extraction already advances past consumed bytes; this only reclaims
    /// the space they occupied so long sessions do not keep reallocating.
    pub fn compact(&mut self) {
        self.buf.reserve(self.capacity);
    }

    /// Bytes currently buffered (a partial line, or lines not yet extracted).
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
