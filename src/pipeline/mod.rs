//! Capture and playback loops joined by the stream log.
//!
//! # Architecture
//!
//! ```text
//!            session thread                          "playback-feeder" thread
//! FrameSource ─▶ CaptureLoop ─▶ StreamMultiplexer ─▶ ReaderHandle ─▶ PlaybackFeeder ─▶ PcmSink
//!                    │                                                    │
//!                    └──────────────── CancelToken ───────────────────────┘
//! ```
//!
//! The capture loop is the only writer.  It finishes the log on every exit
//! path, which is what ends the feeder in the normal case; the cancel token
//! ends both early.

pub mod cancel;
pub mod capture_loop;
pub mod feeder;

use thiserror::Error;

use crate::audio::DeviceError;
use crate::dsp::EffectError;
use crate::stream::StreamError;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use cancel::CancelToken;
pub use capture_loop::{CaptureLoop, CaptureReport};
pub use feeder::{FeederOptions, FeederReport, PlaybackFeeder};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors that end a capture loop or a feeder.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("audio device: {0}")]
    Device(#[from] DeviceError),

    #[error("stream: {0}")]
    Stream(#[from] StreamError),

    #[error("effect: {0}")]
    Effect(#[from] EffectError),

    #[error("playback stalled after {timeouts} consecutive read timeouts")]
    Stalled { timeouts: u32 },
}
