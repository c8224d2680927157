//! Reader side of the stream log.

use std::io;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use super::multiplexer::{Shared, StreamError, StreamLog};

/// Position of a reader inside the chunked log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    chunk: usize,
    offset: usize,
}

impl Cursor {
    /// Copy as many bytes as are available into `out`, advancing the cursor.
    fn copy_from(&mut self, log: &StreamLog, out: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < out.len() {
            let Some(chunk) = log.chunks.get(self.chunk) else {
                break;
            };
            let available = &chunk[self.offset..];
            let n = available.len().min(out.len() - copied);
            out[copied..copied + n].copy_from_slice(&available[..n]);
            copied += n;
            self.offset += n;
            if self.offset == chunk.len() {
                self.chunk += 1;
                self.offset = 0;
            }
        }
        copied
    }
}

/// An independent cursor over a stream log.
///
/// Each handle starts at byte 0 and holds one registry slot until dropped.
pub struct ReaderHandle {
    shared: Arc<Shared>,
    id: u64,
    cursor: Cursor,
    position: u64,
}

impl ReaderHandle {
    pub(crate) fn new(shared: Arc<Shared>, id: u64) -> Self {
        Self {
            shared,
            id,
            cursor: Cursor::default(),
            position: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// `true` once the log is finished and every byte has been consumed.
    pub fn is_exhausted(&self) -> bool {
        let log = self.shared.lock();
        log.finished && self.position == log.len as u64
    }

    /// Fill `buf` from the cursor, blocking while the log is still open and
    /// the cursor has caught up with the writer.
    ///
    /// Returns the number of bytes copied: `buf.len()` normally, fewer only
    /// when the log finished first, `0` once the log is finished and drained.
    ///
    /// # Errors
    ///
    /// [`StreamError::Timeout`] when no new data or finish arrives within the
    /// configured read timeout.  Bytes copied before the wait stay in `buf`
    /// and are reported as `received`.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        if buf.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();
        let deadline = started.checked_add(self.shared.options.read_timeout);
        let shared = Arc::clone(&self.shared);
        let mut log = shared.lock();
        let mut filled = 0;

        loop {
            let copied = self.cursor.copy_from(&log, &mut buf[filled..]);
            filled += copied;
            self.position += copied as u64;

            if filled == buf.len() || log.finished {
                return Ok(filled);
            }

            log = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    let remaining = deadline.saturating_duration_since(now);
                    if remaining == Duration::ZERO {
                        log::debug!(
                            "stream: reader {} timed out with {filled}/{} bytes",
                            self.id,
                            buf.len()
                        );
                        return Err(StreamError::Timeout {
                            received: filled,
                            waited: now.duration_since(started),
                        });
                    }
                    shared
                        .data_ready
                        .wait_timeout(log, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => shared
                    .data_ready
                    .wait(log)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }
}

impl io::Read for ReaderHandle {
    /// A timeout that copied some bytes counts as a short read; one that
    /// copied nothing surfaces as [`io::ErrorKind::TimedOut`].
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match ReaderHandle::read(self, buf) {
            Ok(n) => Ok(n),
            Err(StreamError::Timeout { received, .. }) if received > 0 => Ok(received),
            Err(e @ StreamError::Timeout { .. }) => Err(io::Error::new(io::ErrorKind::TimedOut, e)),
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
        }
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.shared.retire(self.id);
    }
}

impl std::fmt::Debug for ReaderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderHandle")
            .field("id", &self.id)
            .field("position", &self.position)
            .finish()
    }
}
