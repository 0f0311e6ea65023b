//! Byte I/O layer: fixed-capacity refill-on-demand reading, buffered
//! writing with the mark/patch pair the writer uses to back-patch an
//! element's lead byte (`spec.md` §4.4's "deferred content-flag" trick).

use crate::error::Result;
use std::io::{Read, Write};

const READ_BUF_CAPACITY: usize = 8 * 1024;

/// Reads XBIS bytes from an underlying [`Read`], refilling a fixed-capacity
/// window on demand.
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
}

impl<R: Read> ByteReader<R> {
    /// Wraps `inner` for byte-at-a-time XBIS decoding.
    pub fn new(inner: R) -> Self {
        ByteReader {
            inner,
            buf: vec![0u8; READ_BUF_CAPACITY],
            pos: 0,
            filled: 0,
        }
    }

    /// Refills the window if it is exhausted. Returns `false` at true EOF.
    fn fill(&mut self) -> Result<bool> {
        if self.pos < self.filled {
            return Ok(true);
        }
        self.filled = self.inner.read(&mut self.buf)?;
        self.pos = 0;
        Ok(self.filled > 0)
    }

    /// Reads and consumes one byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        if !self.fill()? {
            return Err(crate::error::Error::Malformed(
                "unexpected end of stream".into(),
            ));
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Looks at the next byte without consuming it. `None` at true EOF.
    pub fn peek(&mut self) -> Result<Option<u8>> {
        if !self.fill()? {
            return Ok(None);
        }
        Ok(Some(self.buf[self.pos]))
    }

    /// Reads exactly `len` bytes into a freshly allocated `Vec`.
    pub fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len);
        let mut remaining = len;
        while remaining > 0 {
            if !self.fill()? {
                return Err(crate::error::Error::Malformed(
                    "unexpected end of stream while reading a length-prefixed payload".into(),
                ));
            }
            let available = self.filled - self.pos;
            let take = available.min(remaining);
            out.extend_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
            remaining -= take;
        }
        Ok(out)
    }
}

/// Writes XBIS bytes to an underlying [`Write`]. Buffers everything
/// in-memory until [`ByteWriter::flush`] so that a mark taken by
/// [`ByteWriter::write_marked_byte`] stays valid (and patchable) for the
/// entire time the caller needs it — the writer never flushes on its own
/// initiative, which is how the buffer-mark invariant (`spec.md` §5) is
/// upheld: nothing calls `flush` between an element's `start_tag_open` and
/// its first child or `close_empty_tag`.
pub struct ByteWriter<W> {
    inner: W,
    buf: Vec<u8>,
}

impl<W: Write> ByteWriter<W> {
    /// Wraps `inner` for byte-at-a-time XBIS encoding.
    pub fn new(inner: W) -> Self {
        ByteWriter {
            inner,
            buf: Vec::new(),
        }
    }

    /// Appends one byte.
    pub fn write_byte(&mut self, b: u8) -> Result<()> {
        self.buf.push(b);
        Ok(())
    }

    /// Appends a byte slice.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Appends one byte and returns a mark that can later be passed to
    /// [`ByteWriter::patch`] to rewrite it.
    pub fn write_marked_byte(&mut self, b: u8) -> Result<usize> {
        let mark = self.buf.len();
        self.buf.push(b);
        Ok(mark)
    }

    /// Rewrites the byte at `mark` (as returned by
    /// [`ByteWriter::write_marked_byte`]) by applying `f` to its current
    /// value.
    pub fn patch(&mut self, mark: usize, f: impl FnOnce(u8) -> u8) {
        let current = self.buf[mark];
        self.buf[mark] = f(current);
    }

    /// Drains the internal buffer to the underlying writer and flushes it.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.write_all(&self.buf)?;
        self.buf.clear();
        self.inner.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.inner)
    }

    /// Borrows the underlying writer without flushing.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}
