//! Producer side: capture → effect → stream log.
//!
//! ```text
//! loop
//!   ├─ cancelled?            → stop
//!   ├─ next_frame(poll)      → Frame / Pending / Closed
//!   ├─ EffectProcessor::process(frame)
//!   └─ StreamMultiplexer::write(le bytes)
//! on every exit: FrameSource::stop, StreamMultiplexer::finish
//! ```

use std::time::{Duration, Instant};

use crate::audio::{CaptureEvent, FrameSource};
use crate::dsp::EffectProcessor;
use crate::stream::StreamMultiplexer;

use super::{CancelToken, PipelineError};

/// Counters returned when the capture loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureReport {
    pub frames: u64,
    pub bytes: u64,
    /// Polls that timed out without a frame.
    pub idle_polls: u64,
    pub cancelled: bool,
}

/// Drives one [`FrameSource`] into the stream log until the source closes,
/// the token is cancelled, or an error occurs.
pub struct CaptureLoop<S: FrameSource> {
    source: S,
    processor: EffectProcessor,
    stream: StreamMultiplexer,
    cancel: CancelToken,
    poll_timeout: Duration,
}

impl<S: FrameSource> CaptureLoop<S> {
    pub fn new(
        source: S,
        processor: EffectProcessor,
        stream: StreamMultiplexer,
        cancel: CancelToken,
    ) -> Self {
        Self {
            source,
            processor,
            stream,
            cancel,
            poll_timeout: Duration::from_millis(250),
        }
    }

    /// How long each poll waits for a frame before re-checking cancellation.
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Run to completion.  The source is stopped and the log finished on
    /// every exit path.
    pub fn run(mut self) -> Result<CaptureReport, PipelineError> {
        let result = self.pump();
        self.source.stop();
        self.stream.finish();

        match &result {
            Ok(report) => log::info!(
                "capture: finished after {} frames ({} bytes)",
                report.frames,
                report.bytes
            ),
            Err(e) => log::error!("capture: aborted: {e}"),
        }
        result
    }

    fn pump(&mut self) -> Result<CaptureReport, PipelineError> {
        let mut report = CaptureReport::default();
        let mut previous: Option<Instant> = None;

        loop {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }

            let frame = match self.source.next_frame(self.poll_timeout)? {
                CaptureEvent::Frame(frame) => frame,
                CaptureEvent::Pending => {
                    report.idle_polls += 1;
                    continue;
                }
                CaptureEvent::Closed => {
                    log::debug!("capture: source closed");
                    return Ok(report);
                }
            };

            let arrived = Instant::now();
            let processed = self.processor.process(&frame)?;
            let bytes = processed.to_le_bytes();
            self.stream.write(&bytes)?;

            log::trace!(
                "capture: frame {} interval {:?} effect {:?}",
                report.frames,
                previous.map(|p| arrived - p).unwrap_or_default(),
                arrived.elapsed()
            );
            previous = Some(arrived);
            report.frames += 1;
            report.bytes += bytes.len() as u64;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    use crate::audio::{DeviceError, PcmFrame};
    use crate::dsp::PassThrough;
    use crate::stream::StreamOptions;

    /// Replays a script of events, then reports `Closed`.
    struct Scripted {
        events: VecDeque<Result<CaptureEvent, DeviceError>>,
        stops: usize,
    }

    impl Scripted {
        fn new(events: Vec<Result<CaptureEvent, DeviceError>>) -> Self {
            Self {
                events: events.into(),
                stops: 0,
            }
        }
    }

    impl FrameSource for &mut Scripted {
        fn frame_len(&self) -> usize {
            8
        }

        fn next_frame(&mut self, _timeout: Duration) -> Result<CaptureEvent, DeviceError> {
            self.events.pop_front().unwrap_or(Ok(CaptureEvent::Closed))
        }

        fn stop(&mut self) {
            self.stops += 1;
        }
    }

    fn processor() -> EffectProcessor {
        EffectProcessor::new(8, 16, 16, Arc::new(PassThrough)).unwrap()
    }

    fn frame(seed: i16) -> PcmFrame {
        PcmFrame::new((0..8).map(|i| seed.wrapping_mul(100) + i * 37).collect())
    }

    #[test]
    fn frames_are_processed_in_order_and_log_is_finished() {
        let mut source = Scripted::new(vec![
            Ok(CaptureEvent::Frame(frame(1))),
            Ok(CaptureEvent::Pending),
            Ok(CaptureEvent::Frame(frame(2))),
        ]);
        let stream = StreamMultiplexer::new(StreamOptions::default());
        let mut reader = stream.register_reader().unwrap();

        let report = CaptureLoop::new(&mut source, processor(), stream, CancelToken::new())
            .run()
            .unwrap();

        assert_eq!(report.frames, 2);
        assert_eq!(report.idle_polls, 1);
        assert_eq!(report.bytes, 32);
        assert!(!report.cancelled);
        assert_eq!(source.stops, 1);

        let mut reference = processor();
        let mut expected = reference.process(&frame(1)).unwrap().to_le_bytes();
        expected.extend(reference.process(&frame(2)).unwrap().to_le_bytes());

        let mut got = vec![0u8; 64];
        let n = reader.read(&mut got).unwrap();
        assert_eq!(&got[..n], expected.as_slice());
        assert!(reader.is_exhausted());
    }

    #[test]
    fn device_error_stops_source_and_finishes_log() {
        let mut source = Scripted::new(vec![
            Ok(CaptureEvent::Frame(frame(3))),
            Err(DeviceError::Disconnected),
        ]);
        let stream = StreamMultiplexer::new(StreamOptions::default());
        let registrar = stream.registrar();

        let err = CaptureLoop::new(&mut source, processor(), stream, CancelToken::new())
            .run()
            .unwrap_err();

        assert!(matches!(err, PipelineError::Device(DeviceError::Disconnected)));
        assert_eq!(source.stops, 1);
        assert!(registrar.is_finished());
    }

    #[test]
    fn cancellation_is_checked_before_each_poll() {
        let mut source = Scripted::new(vec![Ok(CaptureEvent::Frame(frame(4)))]);
        let stream = StreamMultiplexer::new(StreamOptions::default());
        let registrar = stream.registrar();
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = CaptureLoop::new(&mut source, processor(), stream, cancel)
            .run()
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.frames, 0);
        assert!(registrar.is_finished());
        assert_eq!(source.events.len(), 1);
    }

    #[test]
    fn oversized_frame_is_an_effect_error() {
        let mut source = Scripted::new(vec![Ok(CaptureEvent::Frame(PcmFrame::silence(9)))]);
        let stream = StreamMultiplexer::new(StreamOptions::default());
        let registrar = stream.registrar();

        let err = CaptureLoop::new(&mut source, processor(), stream, CancelToken::new())
            .run()
            .unwrap_err();

        assert!(matches!(err, PipelineError::Effect(_)));
        assert!(registrar.is_finished());
    }
}
