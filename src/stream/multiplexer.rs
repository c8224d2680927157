//! Writer side of the stream log and the bounded reader registry.
//!
//! [`StreamMultiplexer`] is the single writer: it is not `Clone`, so only its
//! owner can append or finish.  Readers are registered either directly on the
//! multiplexer or from other threads through a cloneable [`ReaderRegistrar`].
//!
//! All log state sits behind one `Mutex`; a chunk and the new total length
//! become visible to readers in the same critical section, so a reader never
//! observes a partially appended chunk.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;

use super::reader::ReaderHandle;
use crate::config::StreamConfig;

// ---------------------------------------------------------------------------
// StreamError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Registration was refused because every reader slot is taken.
    #[error("reader capacity of {max} exceeded")]
    CapacityExceeded { max: usize },

    /// The log was already finished when a write was attempted.
    #[error("stream is finished; write rejected")]
    Finished,

    /// A read waited for the full timeout without new data or a finish.
    ///
    /// The first `received` bytes of the caller's buffer were filled and the
    /// cursor has moved past them.
    #[error("no data within {waited:?} ({received} bytes received before the wait)")]
    Timeout { received: usize, waited: Duration },
}

// ---------------------------------------------------------------------------
// StreamOptions
// ---------------------------------------------------------------------------

/// Limits applied by a [`StreamMultiplexer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Maximum number of readers registered at the same time.
    pub max_readers: usize,
    /// Longest time a single `read` call waits for data.
    pub read_timeout: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            max_readers: 16,
            read_timeout: Duration::from_secs(30),
        }
    }
}

impl StreamOptions {
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            max_readers: config.max_readers,
            read_timeout: Duration::from_millis(config.read_timeout_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared log state
// ---------------------------------------------------------------------------

pub(crate) struct StreamLog {
    pub(crate) chunks: Vec<Box<[u8]>>,
    pub(crate) len: usize,
    pub(crate) finished: bool,
    /// Ids of the live readers; its length is checked against `max_readers`.
    readers: Vec<u64>,
    next_reader_id: u64,
}

pub(crate) struct Shared {
    log: Mutex<StreamLog>,
    pub(crate) data_ready: Condvar,
    pub(crate) options: StreamOptions,
}

impl Shared {
    /// The log is only ever mutated by whole pushes and flag stores, so a
    /// panic elsewhere cannot leave it half-written.
    pub(crate) fn lock(&self) -> MutexGuard<'_, StreamLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(self: &Arc<Self>) -> Result<ReaderHandle, StreamError> {
        let mut log = self.lock();
        let max = self.options.max_readers;

        if log.readers.len() >= max {
            log::warn!("stream: reader registration refused ({max} readers active)");
            return Err(StreamError::CapacityExceeded { max });
        }

        let id = log.next_reader_id;
        log.next_reader_id += 1;
        log.readers.push(id);
        log::debug!(
            "stream: registered reader {id} ({}/{max} slots used)",
            log.readers.len()
        );
        drop(log);

        Ok(ReaderHandle::new(Arc::clone(self), id))
    }

    pub(crate) fn retire(&self, id: u64) {
        let mut log = self.lock();
        log.readers.retain(|&r| r != id);
        log::debug!("stream: reader {id} retired ({} active)", log.readers.len());
    }
}

// ---------------------------------------------------------------------------
// StreamMultiplexer
// ---------------------------------------------------------------------------

/// The writer handle of a stream log.
///
/// Dropping the multiplexer finishes the log so blocked readers wake up and
/// drain what is left.
pub struct StreamMultiplexer {
    shared: Arc<Shared>,
}

impl StreamMultiplexer {
    pub fn new(options: StreamOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                log: Mutex::new(StreamLog {
                    chunks: Vec::new(),
                    len: 0,
                    finished: false,
                    readers: Vec::new(),
                    next_reader_id: 0,
                }),
                data_ready: Condvar::new(),
                options,
            }),
        }
    }

    /// Append a copy of `bytes` as one chunk and wake every waiting reader.
    ///
    /// Empty writes append nothing.
    ///
    /// # Errors
    ///
    /// [`StreamError::Finished`] after [`finish`](Self::finish).
    pub fn write(&self, bytes: &[u8]) -> Result<(), StreamError> {
        let chunk: Box<[u8]> = bytes.into();

        let mut log = self.shared.lock();
        if log.finished {
            return Err(StreamError::Finished);
        }
        if chunk.is_empty() {
            return Ok(());
        }
        log.len += chunk.len();
        log.chunks.push(chunk);
        drop(log);

        self.shared.data_ready.notify_all();
        Ok(())
    }

    /// Close the log and wake every waiting reader.  Later calls are no-ops.
    pub fn finish(&self) {
        let mut log = self.shared.lock();
        if log.finished {
            return;
        }
        log.finished = true;
        log::debug!(
            "stream: finished after {} bytes in {} chunks",
            log.len,
            log.chunks.len()
        );
        drop(log);

        self.shared.data_ready.notify_all();
    }

    /// Register a reader positioned at the start of the log.
    ///
    /// # Errors
    ///
    /// [`StreamError::CapacityExceeded`] when `max_readers` readers are live.
    pub fn register_reader(&self) -> Result<ReaderHandle, StreamError> {
        self.shared.register()
    }

    /// A cloneable handle that can register readers from other threads.
    pub fn registrar(&self) -> ReaderRegistrar {
        ReaderRegistrar {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Total bytes appended so far.
    pub fn len(&self) -> usize {
        self.shared.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.shared.lock().chunks.len()
    }

    pub fn reader_count(&self) -> usize {
        self.shared.lock().readers.len()
    }

    pub fn is_finished(&self) -> bool {
        self.shared.lock().finished
    }

    pub fn options(&self) -> StreamOptions {
        self.shared.options
    }
}

impl Drop for StreamMultiplexer {
    fn drop(&mut self) {
        self.finish();
    }
}

// ---------------------------------------------------------------------------
// ReaderRegistrar
// ---------------------------------------------------------------------------

/// Registers readers on a [`StreamMultiplexer`] without granting write access.
#[derive(Clone)]
pub struct ReaderRegistrar {
    shared: Arc<Shared>,
}

impl ReaderRegistrar {
    /// See [`StreamMultiplexer::register_reader`].
    pub fn register(&self) -> Result<ReaderHandle, StreamError> {
        self.shared.register()
    }

    pub fn reader_count(&self) -> usize {
        self.shared.lock().readers.len()
    }

    pub fn is_finished(&self) -> bool {
        self.shared.lock().finished
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
