//! Bounded, replayable peeking over a byte stream.
//!
//! Validation needs to look at the head of an upload without stealing the
//! bytes that installation later streams to the host. [`BoundedPeek`]
//! buffers at most `limit` bytes from the wrapped reader on first peek,
//! then replays that buffer ahead of the untouched remainder.
//!
//! The wrapper never closes anything: it owns `R`, so callers that need to
//! keep their stream pass `&mut reader`.

use std::io::{self, Read};

/// Default number of bytes buffered for manifest inspection (2 MiB).
pub const DEFAULT_PEEK_LIMIT: usize = 2 * 1024 * 1024;

/// A reader whose first `limit` bytes can be inspected and rewound.
#[derive(Debug)]
pub struct BoundedPeek<R> {
    inner: R,
    buffer: Vec<u8>,
    limit: usize,
    position: usize,
    filled: bool,
    drained: bool,
}

impl<R: Read> BoundedPeek<R> {
    /// Wraps `inner`, allowing up to `limit` bytes to be peeked.
    pub fn new(inner: R, limit: usize) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            limit,
            position: 0,
            filled: false,
            drained: false,
        }
    }

    /// Returns the buffered prefix, filling it from the inner reader on the
    /// first call.
    ///
    /// The prefix is shorter than the limit only when the stream ended
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the inner stream fails, or if bytes
    /// past the prefix have already been handed out.
    pub fn peek(&mut self) -> io::Result<&[u8]> {
        if self.drained {
            return Err(past_prefix());
        }
        if !self.filled {
            let limit = u64::try_from(self.limit).unwrap_or(u64::MAX);
            (&mut self.inner).take(limit).read_to_end(&mut self.buffer)?;
            self.filled = true;
        }
        Ok(&self.buffer)
    }

    /// Repositions the stream at its first byte.
    ///
    /// # Errors
    ///
    /// Fails once reading has moved past the buffered prefix, since those
    /// bytes were never retained.
    pub fn rewind(&mut self) -> io::Result<()> {
        if self.drained {
            return Err(past_prefix());
        }
        self.position = 0;
        Ok(())
    }

    /// Returns the configured peek limit.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl<R: Read> Read for BoundedPeek<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if let Some(available) = self.buffer.get(self.position..).filter(|b| !b.is_empty()) {
            let count = available.len().min(out.len());
            out[..count].copy_from_slice(&available[..count]);
            self.position += count;
            return Ok(count);
        }
        if out.is_empty() {
            return Ok(0);
        }
        self.filled = true;
        self.drained = true;
        self.inner.read(out)
    }
}

fn past_prefix() -> io::Error {
    io::Error::other("stream has been read past its buffered prefix")
}
