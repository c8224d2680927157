//! Audio I/O: microphone capture → mono PCM frames, PCM bytes → speaker.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → downmix_to_mono → StreamResampler
//!           → quantize → FrameAssembler → PcmFrame (mpsc) → CpalCapture::next_frame
//!
//! PcmSink::write(le bytes) → PlaybackRing → cpal callback
//!           → PullResampler → upmix_from_mono → Speaker
//! ```
//!
//! The pipeline side always sees mono 16-bit PCM at the configured rate; the
//! device side runs at whatever rate and channel count the hardware offers.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use voice_fx::audio::{CaptureEvent, CpalCapture, FrameSource};
//! use voice_fx::config::AudioConfig;
//!
//! let mut capture = CpalCapture::open(&AudioConfig::default()).unwrap();
//! while let Ok(CaptureEvent::Frame(frame)) = capture.next_frame(Duration::from_millis(250)) {
//!     println!("frame of {} samples, peak {}", frame.len(), frame.peak());
//! }
//! capture.stop();
//! ```

pub mod buffer;
pub mod capture;
pub mod device;
pub mod pcm;
pub mod playback;
pub mod resample;

pub use buffer::PlaybackRing;
pub use capture::{CaptureEvent, CpalCapture, FrameAssembler, FrameSource};
pub use device::{input_device, list_devices, output_device, DeviceError, StreamHandle};
pub use pcm::{normalize, quantize, PcmFrame, BYTES_PER_SAMPLE, FULL_SCALE};
pub use playback::{CpalPlayback, PcmSink};
pub use resample::{downmix_to_mono, upmix_from_mono, PullResampler, StreamResampler};
