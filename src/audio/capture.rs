//! Microphone capture via `cpal`.
//!
//! [`CpalCapture`] opens an input device at its native configuration and
//! converts each hardware buffer on the audio thread:
//!
//! ```text
//! cpal callback (T, n ch, device rate)
//!   → f32 → downmix_to_mono → StreamResampler → quantize → FrameAssembler
//!   → PcmFrame (mpsc) → FrameSource::next_frame
//! ```
//!
//! Frames are delivered when a full frame has accumulated, so the consumer is
//! woken once per frame rather than polling the device position.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};

use super::device::{self, DeviceError, StreamHandle};
use super::pcm::{quantize_f32, PcmFrame};
use super::resample::{downmix_to_mono, StreamResampler};
use crate::config::AudioConfig;

// ---------------------------------------------------------------------------
// FrameSource
// ---------------------------------------------------------------------------

/// Outcome of one [`FrameSource::next_frame`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A complete frame of `frame_len` samples.
    Frame(PcmFrame),
    /// No frame became ready within the timeout.
    Pending,
    /// The source is stopped and drained; no further frames will arrive.
    Closed,
}

/// A producer of fixed-length mono PCM frames.
pub trait FrameSource {
    /// Samples per delivered frame.
    fn frame_len(&self) -> usize;

    /// Wait up to `timeout` for the next frame.
    fn next_frame(&mut self, timeout: Duration) -> Result<CaptureEvent, DeviceError>;

    /// Stop producing.  Frames already captured may still be returned before
    /// [`CaptureEvent::Closed`].  Calling `stop` twice is harmless.
    fn stop(&mut self);
}

// ---------------------------------------------------------------------------
// FrameAssembler
// ---------------------------------------------------------------------------

/// Cuts an arbitrary-length sample stream into fixed-length frames.
#[derive(Debug)]
pub struct FrameAssembler {
    frame_len: usize,
    pending: Vec<i16>,
}

impl FrameAssembler {
    pub fn new(frame_len: usize) -> Self {
        let frame_len = frame_len.max(1);
        Self {
            frame_len,
            pending: Vec::with_capacity(frame_len),
        }
    }

    /// Append `samples`, calling `emit` once for every frame completed.
    pub fn push(&mut self, mut samples: &[i16], mut emit: impl FnMut(PcmFrame)) {
        while !samples.is_empty() {
            let take = (self.frame_len - self.pending.len()).min(samples.len());
            self.pending.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if self.pending.len() == self.frame_len {
                let full = std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_len));
                emit(PcmFrame::new(full));
            }
        }
    }

    /// Samples waiting for the current frame to complete.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

// ---------------------------------------------------------------------------
// Callback state
// ---------------------------------------------------------------------------

/// Everything the audio thread owns between callbacks.
struct CaptureCallback {
    channels: u16,
    resampler: StreamResampler,
    assembler: FrameAssembler,
    interleaved: Vec<f32>,
    resampled: Vec<f32>,
    pcm: Vec<i16>,
    tx: mpsc::Sender<PcmFrame>,
}

impl CaptureCallback {
    fn new(
        channels: u16,
        device_rate: u32,
        target_rate: u32,
        frame_len: usize,
        tx: mpsc::Sender<PcmFrame>,
    ) -> Self {
        Self {
            channels,
            resampler: StreamResampler::new(device_rate, target_rate),
            assembler: FrameAssembler::new(frame_len),
            interleaved: Vec::new(),
            resampled: Vec::new(),
            pcm: Vec::new(),
            tx,
        }
    }

    fn on_samples(&mut self, samples: impl Iterator<Item = f32>) {
        self.interleaved.clear();
        self.interleaved.extend(samples);
        let mono = downmix_to_mono(&self.interleaved, self.channels);

        self.resampled.clear();
        self.resampler.process(&mono, &mut self.resampled);

        self.pcm.clear();
        self.pcm.extend(self.resampled.iter().map(|&s| quantize_f32(s)));

        let tx = &self.tx;
        self.assembler.push(&self.pcm, |frame| {
            // The receiver is gone once capture is stopped.
            let _ = tx.send(frame);
        });
    }
}

// ---------------------------------------------------------------------------
// CpalCapture
// ---------------------------------------------------------------------------

/// [`FrameSource`] backed by a cpal input stream.
pub struct CpalCapture {
    frames: mpsc::Receiver<PcmFrame>,
    error: Arc<Mutex<Option<String>>>,
    stream: Option<StreamHandle>,
    frame_len: usize,
    device_rate: u32,
    device_channels: u16,
}

impl CpalCapture {
    /// Open the configured (or default) input device and start recording.
    ///
    /// # Errors
    ///
    /// Any [`DeviceError`] raised while locating, configuring or starting the
    /// device.
    pub fn open(config: &AudioConfig) -> Result<Self, DeviceError> {
        let device = device::input_device(config.input_device.as_deref())?;
        let supported = device.default_input_config()?;

        let device_channels = supported.channels();
        let device_rate = supported.sample_rate().0;
        let format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();

        log::info!(
            "capture: opening {:?} ({device_rate} Hz, {device_channels} ch, {format:?}) → {} Hz mono",
            device.name().unwrap_or_default(),
            config.sample_rate
        );

        let (tx, frames) = mpsc::channel();
        let error = Arc::new(Mutex::new(None));
        let callback = CaptureCallback::new(
            device_channels,
            device_rate,
            config.sample_rate,
            config.frame_size,
            tx,
        );

        let stream = match format {
            SampleFormat::F32 => build_input::<f32>(&device, &stream_config, callback, &error),
            SampleFormat::I16 => build_input::<i16>(&device, &stream_config, callback, &error),
            SampleFormat::U16 => build_input::<u16>(&device, &stream_config, callback, &error),
            other => return Err(DeviceError::UnsupportedFormat(other)),
        }?;
        stream.play()?;

        Ok(Self {
            frames,
            error,
            stream: Some(StreamHandle::new(stream)),
            frame_len: config.frame_size,
            device_rate,
            device_channels,
        })
    }

    /// Native sample rate of the input device in Hz.
    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }

    pub fn device_channels(&self) -> u16 {
        self.device_channels
    }
}

fn build_input<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut callback: CaptureCallback,
    error: &Arc<Mutex<Option<String>>>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let error = Arc::clone(error);
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            callback.on_samples(data.iter().map(|&s| s.to_sample::<f32>()));
        },
        move |err: cpal::StreamError| {
            log::error!("capture: cpal stream error: {err}");
            *error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
        },
        None,
    )?;
    Ok(stream)
}

impl FrameSource for CpalCapture {
    fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<CaptureEvent, DeviceError> {
        if let Some(message) = self.error.lock().unwrap_or_else(PoisonError::into_inner).take() {
            return Err(DeviceError::Stream(message));
        }

        match self.frames.recv_timeout(timeout) {
            Ok(frame) => Ok(CaptureEvent::Frame(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(CaptureEvent::Pending),
            Err(RecvTimeoutError::Disconnected) if self.stream.is_none() => Ok(CaptureEvent::Closed),
            Err(RecvTimeoutError::Disconnected) => Err(DeviceError::Disconnected),
        }
    }

    fn stop(&mut self) {
        if self.stream.take().is_some() {
            log::info!("capture: input stream stopped");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
