//! Buffered, line-oriented socket reader (spec.md §4.1).
//!
//! A direct port of `read_t`/`buf_read`/`buf_read_line` in
//! `original_source/proxy/proxy.c`: an 8 KiB refill buffer, transparent
//! retry on `Interrupted`, and a `read_line` that returns the terminator
//! in the output and truncates (rather than erroring) on overlong lines.
//! This is hand-rolled rather than built on `httparse` or `BufRead`
//! because its truncate-and-carry-the-remainder contract is a semantic
//! spec.md pins down exactly (see the boundary behaviors in spec.md §8),
//! not something a general-purpose buffered reader or HTTP parser exposes.

use std::io::{self, Read};

pub const REFILL_BUF_LEN: usize = 8192;

pub struct LineReader<R> {
    inner: R,
    buf: [u8; REFILL_BUF_LEN],
    pos: usize,
    filled: usize,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: [0u8; REFILL_BUF_LEN],
            pos: 0,
            filled: 0,
        }
    }

    /// Reads exactly one byte from the refill buffer, retrying transparently
    /// on interrupted system calls and refilling from the socket when the
    /// buffer is exhausted. Returns `Ok(0)` on clean EOF, `Ok(1)` on success.
    fn read_one(&mut self, byte: &mut u8) -> io::Result<usize> {
        while self.pos >= self.filled {
            match self.inner.read(&mut self.buf) {
                Ok(0) => return Ok(0),
                Ok(n) => {
                    self.filled = n;
                    self.pos = 0;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        *byte = self.buf[self.pos];
        self.pos += 1;
        Ok(1)
    }

    /// Reads one `\n`-terminated line (CR retained if present) into `out`.
    ///
    /// - `Ok(0)`: clean EOF before any byte was read.
    /// - `Ok(n)` with `n < out.len()`: a complete line, `n` bytes written,
    ///   terminator included.
    /// - `Ok(out.len())`: the line was longer than `out.len()`; it has been
    ///   truncated to `out.len() - 1` bytes of data plus a trailing NUL at
    ///   `out[out.len() - 1]`, and the remainder of the line is left
    ///   buffered for the next call.
    pub fn read_line(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let max = out.len();
        if max == 0 {
            return Ok(0);
        }
        let mut i = 0usize;
        let mut byte = 0u8;
        while i + 1 < max {
            match self.read_one(&mut byte)? {
                1 => {
                    out[i] = byte;
                    i += 1;
                    if byte == b'\n' {
                        return Ok(i);
                    }
                }
                _ => {
                    if i == 0 {
                        return Ok(0);
                    }
                    return Ok(i);
                }
            }
        }
        out[max - 1] = 0;
        Ok(max)
    }
}
