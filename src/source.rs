//! Refillable buffered source.
//!
//! [`Source`] owns a rolling byte window over an upstream reader (file,
//! subprocess stdout, decompressor, in-memory buffer). The driver asks it to
//! buffer up to the last complete record terminator, tokenizes the window,
//! then advances past what it consumed. The window only ever grows when a
//! single record (or an ambiguous CR at the window seam) does not fit.
//!
//! All suspension happens inside [`Source::refill`]: reads block, and a
//! closed upstream simply reports EOF, after which buffered data drains and
//! the read terminates cleanly.

use std::io::{ErrorKind, Read};

use crate::error::Result;

/// Upper bound on a single `read` call while topping up the window.
const READ_QUANTUM: usize = 64 * 1024;

pub(crate) struct Source {
    inner: Box<dyn Read>,
    buf: Vec<u8>,
    start: usize,
    /// Window fill target in bytes; grows when records outsize the window.
    target: usize,
    eof: bool,
}

/// Outcome of a forward newline scan over a window.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum NewlineScan {
    /// Index just past the terminator (CR+LF counts as one terminator).
    Found(usize),
    /// A CR sits on the last byte of the window; whether it is a bare CR or
    /// the head of a CR+LF cannot be decided without more bytes.
    SeamCr(usize),
    NotFound,
}

/// Forward scan for the first record terminator at or after `from`.
pub(crate) fn find_first_newline(mem: &[u8], mut from: usize) -> NewlineScan {
    while from < mem.len() {
        match mem[from] {
            b'\n' => return NewlineScan::Found(from + 1),
            b'\r' => {
                if from + 1 < mem.len() {
                    let end = if mem[from + 1] == b'\n' { from + 2 } else { from + 1 };
                    return NewlineScan::Found(end);
                }
                return NewlineScan::SeamCr(from);
            }
            _ => from += 1,
        }
    }
    NewlineScan::NotFound
}

impl Source {
    /// `chunksize == 0` disables chunking: the first refill slurps the whole
    /// stream into a single window.
    pub(crate) fn new(inner: Box<dyn Read>, chunksize: usize) -> Source {
        Source {
            inner,
            buf: Vec::new(),
            start: 0,
            target: if chunksize == 0 { usize::MAX } else { chunksize },
            eof: false,
        }
    }

    /// The live, unconsumed window.
    #[inline]
    pub(crate) fn mem(&self) -> &[u8] {
        &self.buf[self.start..]
    }

    /// Consumes `n` bytes off the front of the window.
    pub(crate) fn advance(&mut self, n: usize) {
        debug_assert!(self.start + n <= self.buf.len());
        self.start += n;
    }

    /// True once the upstream reported EOF and the window is drained.
    pub(crate) fn exhausted(&self) -> bool {
        self.eof && self.start == self.buf.len()
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.eof
    }

    /// Doubles the window target. Used when a single record, or an ambiguous
    /// trailing CR, does not fit in the current window.
    pub(crate) fn grow(&mut self) {
        self.target = self.target.saturating_mul(2);
        log::debug!("growing buffer window target to {} bytes", self.target);
    }

    /// Compacts the window to the front of the allocation and tops it up to
    /// the current target (or EOF, whichever comes first).
    pub(crate) fn refill(&mut self) -> Result<()> {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.start = 0;
        }
        while !self.eof && self.buf.len() < self.target {
            let old = self.buf.len();
            let want = (self.target - old).min(READ_QUANTUM);
            self.buf.resize(old + want, 0);
            match self.inner.read(&mut self.buf[old..]) {
                Ok(0) => {
                    self.buf.truncate(old);
                    self.eof = true;
                }
                Ok(n) => self.buf.truncate(old + n),
                Err(e) if e.kind() == ErrorKind::Interrupted => self.buf.truncate(old),
                Err(e) => {
                    self.buf.truncate(old);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Advances past `n` record terminators (LF, CR, or CR+LF). Bytes of the
    /// skipped lines are discarded as they stream through. Stops early at
    /// EOF; returns the number of lines actually skipped.
    pub(crate) fn skip_lines(&mut self, n: u64) -> Result<u64> {
        let mut skipped = 0;
        'refill: while skipped < n {
            self.refill()?;
            if self.mem().is_empty() {
                break;
            }
            let mut at = 0;
            while skipped < n {
                match find_first_newline(self.mem(), at) {
                    NewlineScan::Found(next) => {
                        at = next;
                        skipped += 1;
                    }
                    NewlineScan::SeamCr(cr) if self.eof => {
                        at = cr + 1;
                        skipped += 1;
                    }
                    NewlineScan::SeamCr(cr) => {
                        // Keep the CR so the next window can classify it.
                        self.advance(cr);
                        continue 'refill;
                    }
                    NewlineScan::NotFound => {
                        let len = self.mem().len();
                        self.advance(len);
                        if self.eof {
                            break 'refill;
                        }
                        continue 'refill;
                    }
                }
            }
            self.advance(at);
        }
        Ok(skipped)
    }

    /// Refills, then locates the last complete record terminator in the
    /// window, growing the window until one is visible. A CR on the final
    /// byte of a non-EOF window is ambiguous (it may be the head of a CR+LF)
    /// and forces a grow. A stream that ends without a final newline gets an
    /// LF appended so downstream parsing sees a terminated record.
    ///
    /// Returns the terminator index (`mem()[i]` is LF or CR), or `None` once
    /// the stream is fully consumed.
    pub(crate) fn buffer_lines(&mut self) -> Result<Option<usize>> {
        loop {
            self.refill()?;
            let mem = self.mem();
            if mem.is_empty() {
                return Ok(None);
            }
            match mem.iter().rposition(|&b| b == b'\n' || b == b'\r') {
                Some(i) if mem[i] == b'\r' && i + 1 == mem.len() && !self.eof => self.grow(),
                Some(i) => return Ok(Some(i)),
                None if self.eof => {
                    self.buf.push(b'\n');
                    return Ok(Some(self.mem().len() - 1));
                }
                None => self.grow(),
            }
        }
    }
}
