//! Session wiring: config → effect → stream log → capture and playback threads.
//!
//! # Lifecycle
//!
//! ```text
//! Session::new(config)            validate config
//!   └─ .with_mask(mask)            optional caller-supplied mask
//! Session::run(source, open_sink)
//!   ├─ EffectProcessor             (caller mask, else config.spectral.mask)
//!   ├─ StreamMultiplexer::new + register_reader
//!   ├─ spawn "playback-feeder": open_sink() → PlaybackFeeder::run
//!   ├─ CaptureLoop::run            (current thread, until close/cancel/error)
//!   └─ join feeder                 → SessionReport
//! ```
//!
//! The playback sink is opened on the feeder thread itself, so sinks that
//! wrap thread-affine device handles never cross threads.  A feeder failure
//! trips the session's [`CancelToken`] so the capture side winds down too.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::audio::{DeviceError, FrameSource, PcmSink};
use crate::config::{AppConfig, ConfigError};
use crate::dsp::{EffectError, EffectProcessor, SpectralMask};
use crate::pipeline::{
    CancelToken, CaptureLoop, CaptureReport, FeederOptions, FeederReport, PipelineError,
    PlaybackFeeder,
};
use crate::stream::{StreamError, StreamMultiplexer, StreamOptions};

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot build effect: {0}")]
    Effect(#[from] EffectError),

    #[error("cannot register playback reader: {0}")]
    Stream(#[from] StreamError),

    #[error("failed to spawn playback thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("capture failed: {0}")]
    Capture(#[source] PipelineError),

    #[error("playback failed: {0}")]
    Playback(#[source] PipelineError),

    #[error("playback thread panicked")]
    FeederPanicked,
}

// ---------------------------------------------------------------------------
// SessionReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub capture: CaptureReport,
    pub playback: FeederReport,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One capture → effect → playback run.
pub struct Session {
    config: AppConfig,
    cancel: CancelToken,
    mask: Option<Arc<dyn SpectralMask>>,
}

impl Session {
    /// # Errors
    ///
    /// [`SessionError::Config`] when `config` fails validation.
    pub fn new(config: AppConfig) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelToken::new(),
            mask: None,
        })
    }

    /// Use `mask` instead of the one described by `spectral.mask`.
    pub fn with_mask(mut self, mask: Arc<dyn SpectralMask>) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Token that stops the session when cancelled, e.g. from a stop key.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run until the source closes or the session is cancelled.
    ///
    /// `open_sink` runs on the feeder thread.  Both sides are always joined
    /// before this returns; a capture error takes precedence over a playback
    /// error in the result.
    pub fn run<S, K, F>(self, source: S, open_sink: F) -> Result<SessionReport, SessionError>
    where
        S: FrameSource,
        K: PcmSink,
        F: FnOnce() -> Result<K, DeviceError> + Send + 'static,
    {
        let processor = match self.mask {
            Some(mask) => EffectProcessor::new(
                self.config.audio.frame_size,
                self.config.spectral.analysis_size,
                self.config.spectral.synthesis_size,
                mask,
            )?,
            None => EffectProcessor::from_config(&self.config)?,
        };
        log::info!(
            "session: {} Hz, frame {} samples, FFT {} → {}",
            self.config.audio.sample_rate,
            processor.frame_len(),
            processor.analysis_size(),
            processor.synthesis_size()
        );

        let stream = StreamMultiplexer::new(StreamOptions::from_config(&self.config.stream));
        let reader = stream.register_reader()?;

        let options = FeederOptions::from_config(&self.config);
        let cancel = self.cancel.clone();
        let feeder = thread::Builder::new()
            .name("playback-feeder".into())
            .spawn(move || {
                let result = open_sink()
                    .map_err(PipelineError::from)
                    .and_then(|sink| PlaybackFeeder::new(sink, reader, cancel.clone(), options).run());
                if result.is_err() {
                    cancel.cancel();
                }
                result
            })?;

        let capture = CaptureLoop::new(source, processor, stream, self.cancel.clone())
            .with_poll_timeout(Duration::from_millis(self.config.audio.capture_poll_ms))
            .run();

        let playback = feeder.join().map_err(|_| SessionError::FeederPanicked)?;
        Ok(SessionReport {
            capture: capture.map_err(SessionError::Capture)?,
            playback: playback.map_err(SessionError::Playback)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use crate::audio::{CaptureEvent, PcmFrame};
    use crate::dsp::MaskSpec;

    /// Emits `count` frames, then closes.
    struct Burst {
        remaining: usize,
        frame_len: usize,
    }

    impl FrameSource for Burst {
        fn frame_len(&self) -> usize {
            self.frame_len
        }

        fn next_frame(&mut self, _timeout: Duration) -> Result<CaptureEvent, DeviceError> {
            if self.remaining == 0 {
                return Ok(CaptureEvent::Closed);
            }
            self.remaining -= 1;
            Ok(CaptureEvent::Frame(PcmFrame::silence(self.frame_len)))
        }

        fn stop(&mut self) {}
    }

    /// Never produces a frame until cancelled.
    struct Idle;

    impl FrameSource for Idle {
        fn frame_len(&self) -> usize {
            64
        }

        fn next_frame(&mut self, timeout: Duration) -> Result<CaptureEvent, DeviceError> {
            thread::sleep(timeout);
            Ok(CaptureEvent::Pending)
        }

        fn stop(&mut self) {}
    }

    /// Forwards everything it receives to the test thread.
    struct Forward {
        buffer_bytes: usize,
        tx: mpsc::Sender<Vec<u8>>,
    }

    impl PcmSink for Forward {
        fn buffer_bytes(&self) -> usize {
            self.buffer_bytes
        }

        fn write(&mut self, bytes: &[u8]) -> Result<(), DeviceError> {
            let _ = self.tx.send(bytes.to_vec());
            Ok(())
        }

        fn start(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }

        fn wait_refill(&mut self, _timeout: Duration) -> Result<bool, DeviceError> {
            Ok(true)
        }
    }

    fn small_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.audio.frame_size = 64;
        config.audio.capture_poll_ms = 10;
        config.spectral.analysis_size = 128;
        config.spectral.synthesis_size = 128;
        config.spectral.mask = MaskSpec::PassThrough;
        config.playback.buffer_bytes = 96;
        config
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = small_config();
        config.spectral.synthesis_size = 100;
        assert!(matches!(Session::new(config), Err(SessionError::Config(_))));
    }

    #[test]
    fn every_captured_byte_reaches_the_sink() {
        let (tx, rx) = mpsc::channel();
        let session = Session::new(small_config()).unwrap();
        let report = session
            .run(Burst { remaining: 5, frame_len: 64 }, move || {
                Ok(Forward { buffer_bytes: 96, tx })
            })
            .unwrap();

        assert_eq!(report.capture.frames, 5);
        assert_eq!(report.capture.bytes, 5 * 64 * 2);
        assert_eq!(report.playback.bytes, report.capture.bytes);
        let played: usize = rx.try_iter().map(|w| w.len()).sum();
        assert_eq!(played as u64, report.capture.bytes);
    }

    #[test]
    fn sink_open_failure_cancels_capture() {
        let session = Session::new(small_config()).unwrap();
        let cancel = session.cancel_token();
        let err = session
            .run(Idle, || Err::<Forward, _>(DeviceError::NoDevice("output")))
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Playback(PipelineError::Device(DeviceError::NoDevice(_)))
        ));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn cancel_token_stops_an_idle_session() {
        let (tx, _rx) = mpsc::channel();
        let session = Session::new(small_config()).unwrap();
        let timer = session
            .cancel_token()
            .cancel_after(Duration::from_millis(50))
            .unwrap();

        let report = session
            .run(Idle, move || Ok(Forward { buffer_bytes: 96, tx }))
            .unwrap();
        timer.join().unwrap();

        assert!(report.capture.cancelled);
        assert_eq!(report.capture.frames, 0);
    }
}
