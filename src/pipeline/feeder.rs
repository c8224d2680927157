//! Consumer side: stream log → playback device.
//!
//! ```text
//! read(full buffer) → PcmSink::write → PcmSink::start
//! loop
//!   ├─ cancelled?                  → stop
//!   ├─ wait_refill(timeout)        → half the buffer is free
//!   ├─ read(half buffer)           → short read means end of stream
//!   └─ PcmSink::write
//! end of stream: PcmSink::drain
//! ```
//!
//! A read timeout is not fatal: bytes received before it are kept and the
//! read is retried.  Only a run of consecutive empty timeouts longer than the
//! retry budget ends the feeder with [`PipelineError::Stalled`].

use std::time::Duration;

use crate::audio::PcmSink;
use crate::config::AppConfig;
use crate::stream::{ReaderHandle, StreamError};

use super::{CancelToken, PipelineError};

/// Tuning for [`PlaybackFeeder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeederOptions {
    /// Consecutive empty read timeouts tolerated before giving up.
    pub max_read_retries: u32,
    /// Longest wait for a half-buffer notification before re-checking
    /// cancellation.
    pub refill_timeout: Duration,
    /// Longest wait for queued audio to play out at end of stream.
    pub drain_timeout: Duration,
}

impl Default for FeederOptions {
    fn default() -> Self {
        Self {
            max_read_retries: 3,
            refill_timeout: Duration::from_secs(2),
            drain_timeout: Duration::from_secs(2),
        }
    }
}

impl FeederOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        let refill_timeout = Duration::from_millis(config.playback.refill_timeout_ms);
        Self {
            max_read_retries: config.stream.max_read_retries,
            refill_timeout,
            drain_timeout: refill_timeout,
        }
    }
}

/// Counters returned when the feeder ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeederReport {
    pub bytes: u64,
    /// Half-buffer refills after the initial prime.
    pub refills: u64,
    /// Read timeouts survived along the way.
    pub timeouts: u64,
    pub cancelled: bool,
}

/// Moves bytes from one [`ReaderHandle`] into a [`PcmSink`].
///
/// The reader is released when the feeder is dropped, whichever way
/// [`run`](Self::run) ends.
pub struct PlaybackFeeder<K: PcmSink> {
    sink: K,
    reader: ReaderHandle,
    cancel: CancelToken,
    options: FeederOptions,
}

impl<K: PcmSink> PlaybackFeeder<K> {
    pub fn new(sink: K, reader: ReaderHandle, cancel: CancelToken, options: FeederOptions) -> Self {
        Self {
            sink,
            reader,
            cancel,
            options,
        }
    }

    pub fn run(mut self) -> Result<FeederReport, PipelineError> {
        let result = self.pump();
        match &result {
            Ok(report) => log::info!(
                "feeder: finished after {} bytes ({} refills, {} read timeouts)",
                report.bytes,
                report.refills,
                report.timeouts
            ),
            Err(e) => log::error!("feeder: aborted: {e}"),
        }
        result
    }

    fn pump(&mut self) -> Result<FeederReport, PipelineError> {
        let mut report = FeederReport::default();
        let buffer_bytes = self.sink.buffer_bytes().max(2);
        let half = buffer_bytes / 2;
        let mut buf = vec![0u8; buffer_bytes];

        let primed = self.fill(&mut buf, &mut report)?;
        if primed > 0 {
            self.sink.write(&buf[..primed])?;
            report.bytes += primed as u64;
        }
        self.sink.start()?;
        log::debug!("feeder: primed {primed} bytes, playback started");

        let mut at_end = primed < buffer_bytes;
        while !at_end {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }
            if !self.sink.wait_refill(self.options.refill_timeout)? {
                continue;
            }

            let n = self.fill(&mut buf[..half], &mut report)?;
            if n > 0 {
                self.sink.write(&buf[..n])?;
                report.bytes += n as u64;
                report.refills += 1;
            }
            at_end = n < half;
        }

        if self.cancel.is_cancelled() {
            report.cancelled = true;
        } else {
            self.sink.drain(self.options.drain_timeout)?;
        }
        Ok(report)
    }

    /// Fill `buf` from the reader.  Fewer bytes than requested means the log
    /// ended or the session was cancelled during a timeout.
    fn fill(&mut self, buf: &mut [u8], report: &mut FeederReport) -> Result<usize, PipelineError> {
        let mut filled = 0;
        let mut empty_timeouts = 0;

        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(n) => return Ok(filled + n),
                Err(StreamError::Timeout { received, waited }) => {
                    filled += received;
                    report.timeouts += 1;
                    if received > 0 {
                        empty_timeouts = 0;
                    } else {
                        empty_timeouts += 1;
                    }

                    if self.cancel.is_cancelled() {
                        return Ok(filled);
                    }
                    if empty_timeouts > self.options.max_read_retries {
                        return Err(PipelineError::Stalled {
                            timeouts: empty_timeouts,
                        });
                    }
                    log::warn!(
                        "feeder: no data for {waited:?}, retrying ({empty_timeouts}/{})",
                        self.options.max_read_retries
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
